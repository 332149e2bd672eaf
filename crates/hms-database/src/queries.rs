//! 数据库查询操作

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hms_core::models::*;
use hms_core::{HmsError, Result, StoreTx};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::connection::DatabasePool;
use crate::models::*;

/// 表结构管理
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    /// 创建数据库表
    pub async fn create_tables(&self) -> Result<()> {
        let pool = self.pool.pool();

        let tables = [
            r#"
            CREATE TABLE IF NOT EXISTS patients (
                id UUID PRIMARY KEY,
                uhid VARCHAR(64) UNIQUE NOT NULL,
                name VARCHAR(255) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS services (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                base_price NUMERIC(12, 2) NOT NULL
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES patients(id),
                status VARCHAR(20) NOT NULL DEFAULT 'ACTIVE',
                started_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                completed_at TIMESTAMP WITH TIME ZONE
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS service_orders (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES patients(id),
                visit_id UUID REFERENCES visits(id),
                service_id UUID NOT NULL REFERENCES services(id),
                is_paid BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS medicines (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                unit_price NUMERIC(12, 2) NOT NULL
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS prescriptions (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES patients(id),
                visit_id UUID REFERENCES visits(id),
                is_paid BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS prescription_items (
                id UUID PRIMARY KEY,
                prescription_id UUID NOT NULL REFERENCES prescriptions(id),
                medicine_id UUID NOT NULL REFERENCES medicines(id),
                dosage VARCHAR(64),
                frequency VARCHAR(64),
                duration_days INTEGER,
                quantity INTEGER
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS departments (
                id UUID PRIMARY KEY,
                name VARCHAR(255) NOT NULL
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS wards (
                id UUID PRIMARY KEY,
                department_id UUID NOT NULL REFERENCES departments(id),
                name VARCHAR(255) NOT NULL
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS beds (
                id UUID PRIMARY KEY,
                ward_id UUID NOT NULL REFERENCES wards(id),
                label VARCHAR(64) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'AVAILABLE'
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS admissions (
                id UUID PRIMARY KEY,
                patient_id UUID NOT NULL REFERENCES patients(id),
                visit_id UUID REFERENCES visits(id),
                status VARCHAR(20) NOT NULL DEFAULT 'ADMITTED',
                current_bed_id UUID REFERENCES beds(id),
                admitted_at TIMESTAMP WITH TIME ZONE NOT NULL,
                discharged_at TIMESTAMP WITH TIME ZONE
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS bed_transfers (
                id UUID PRIMARY KEY,
                admission_id UUID NOT NULL REFERENCES admissions(id),
                from_bed_id UUID REFERENCES beds(id),
                to_bed_id UUID NOT NULL REFERENCES beds(id),
                start_date TIMESTAMP WITH TIME ZONE NOT NULL,
                end_date TIMESTAMP WITH TIME ZONE
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS invoices (
                id UUID PRIMARY KEY,
                invoice_number VARCHAR(32) UNIQUE NOT NULL,
                patient_id UUID NOT NULL REFERENCES patients(id),
                visit_id UUID REFERENCES visits(id),
                admission_id UUID REFERENCES admissions(id),
                status VARCHAR(20) NOT NULL DEFAULT 'DRAFT',
                total_amount NUMERIC(12, 2) NOT NULL,
                tax_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
                discount_amount NUMERIC(12, 2) NOT NULL DEFAULT 0,
                net_amount NUMERIC(12, 2) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )"#,
            r#"
            CREATE TABLE IF NOT EXISTS invoice_items (
                id UUID PRIMARY KEY,
                invoice_id UUID NOT NULL REFERENCES invoices(id),
                name VARCHAR(255) NOT NULL,
                quantity INTEGER NOT NULL,
                unit_price NUMERIC(12, 2) NOT NULL,
                line_total NUMERIC(12, 2) NOT NULL,
                service_id UUID NOT NULL REFERENCES services(id),
                service_order_id UUID REFERENCES service_orders(id),
                prescription_id UUID REFERENCES prescriptions(id),
                medicine_id UUID REFERENCES medicines(id)
            )"#,
        ];

        for table_sql in tables {
            sqlx::query(table_sql)
                .execute(pool)
                .await
                .map_err(|e| HmsError::Database(e.to_string()))?;
        }

        // 创建索引以优化查询性能
        self.create_indexes().await?;

        tracing::info!("Database tables created successfully");
        Ok(())
    }

    /// 创建数据库索引
    async fn create_indexes(&self) -> Result<()> {
        let pool = self.pool.pool();

        let indexes = vec![
            "CREATE INDEX IF NOT EXISTS idx_visits_status ON visits(status)",
            "CREATE INDEX IF NOT EXISTS idx_invoices_visit_id ON invoices(visit_id)",
            "CREATE INDEX IF NOT EXISTS idx_invoices_patient_id ON invoices(patient_id)",
            "CREATE INDEX IF NOT EXISTS idx_invoice_items_invoice_id ON invoice_items(invoice_id)",
            "CREATE INDEX IF NOT EXISTS idx_prescription_items_prescription_id ON prescription_items(prescription_id)",
            "CREATE INDEX IF NOT EXISTS idx_beds_ward_id ON beds(ward_id)",
            "CREATE INDEX IF NOT EXISTS idx_bed_transfers_admission_id ON bed_transfers(admission_id, start_date)",
        ];

        for index_sql in indexes {
            sqlx::query(index_sql)
                .execute(pool)
                .await
                .map_err(|e| HmsError::Database(e.to_string()))?;
        }

        tracing::info!("Database indexes created successfully");
        Ok(())
    }
}

/// PostgreSQL事务
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

impl PgStoreTx {
    pub(crate) fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }

    async fn load_invoice_items(&mut self, invoice_ids: &[Uuid]) -> Result<Vec<InvoiceItem>> {
        let rows = sqlx::query_as::<_, DbInvoiceItem>(
            "SELECT * FROM invoice_items WHERE invoice_id = ANY($1)",
        )
        .bind(invoice_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows.into_iter().map(InvoiceItem::from).collect())
    }

    async fn assemble_invoices(&mut self, rows: Vec<DbInvoice>) -> Result<Vec<Invoice>> {
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let items = self.load_invoice_items(&ids).await?;

        let mut invoices = Vec::with_capacity(rows.len());
        for row in rows {
            let own = items
                .iter()
                .filter(|item| item.invoice_id == row.id)
                .cloned()
                .collect();
            invoices.push(row.into_invoice(own)?);
        }
        Ok(invoices)
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    // ========== 就诊相关操作 ==========

    async fn get_visit(&mut self, id: Uuid) -> Result<Option<Visit>> {
        sqlx::query_as::<_, DbVisit>("SELECT * FROM visits WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Visit::try_from)
            .transpose()
    }

    async fn list_visits_by_status(&mut self, status: VisitStatus) -> Result<Vec<Visit>> {
        sqlx::query_as::<_, DbVisit>(
            "SELECT * FROM visits WHERE status = $1 ORDER BY started_at ASC",
        )
        .bind(status.as_db_str())
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(Visit::try_from)
        .collect()
    }

    async fn update_visit_status(
        &mut self,
        id: Uuid,
        status: VisitStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE visits SET status = $1, completed_at = $2 WHERE id = $3")
            .bind(status.as_db_str())
            .bind(completed_at)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    // ========== 发票相关操作 ==========

    async fn find_draft_invoice_for_visit(&mut self, visit_id: Uuid) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, DbInvoice>(
            "SELECT * FROM invoices WHERE visit_id = $1 AND status = $2 ORDER BY created_at LIMIT 1 FOR UPDATE",
        )
        .bind(visit_id)
        .bind(InvoiceStatus::Draft.as_db_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(self.assemble_invoices(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, DbInvoice>("SELECT * FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(row) => Ok(self.assemble_invoices(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_invoices_for_patient(&mut self, patient_id: Uuid) -> Result<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, DbInvoice>(
            "SELECT * FROM invoices WHERE patient_id = $1 ORDER BY created_at DESC",
        )
        .bind(patient_id)
        .fetch_all(&mut *self.tx)
        .await?;

        self.assemble_invoices(rows).await
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        sqlx::query(r#"
            INSERT INTO invoices (id, invoice_number, patient_id, visit_id, admission_id, status,
                total_amount, tax_amount, discount_amount, net_amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#)
        .bind(invoice.id)
        .bind(&invoice.invoice_number)
        .bind(invoice.patient_id)
        .bind(invoice.visit_id)
        .bind(invoice.admission_id)
        .bind(invoice.status.as_db_str())
        .bind(invoice.total_amount)
        .bind(invoice.tax_amount)
        .bind(invoice.discount_amount)
        .bind(invoice.net_amount)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *self.tx)
        .await?;

        for item in &invoice.items {
            sqlx::query(r#"
                INSERT INTO invoice_items (id, invoice_id, name, quantity, unit_price, line_total,
                    service_id, service_order_id, prescription_id, medicine_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#)
            .bind(item.id)
            .bind(item.invoice_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .bind(item.service_id)
            .bind(item.service_order_id)
            .bind(item.prescription_id)
            .bind(item.medicine_id)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn update_invoice_status(
        &mut self,
        id: Uuid,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE invoices SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_db_str())
            .bind(updated_at)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    // ========== 收费项目与开单 ==========

    async fn get_service(&mut self, id: Uuid) -> Result<Option<Service>> {
        let row = sqlx::query_as::<_, DbService>("SELECT * FROM services WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Service::from))
    }

    async fn first_service(&mut self) -> Result<Option<Service>> {
        let row = sqlx::query_as::<_, DbService>("SELECT * FROM services ORDER BY name LIMIT 1")
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Service::from))
    }

    async fn get_service_order(&mut self, id: Uuid) -> Result<Option<ServiceOrder>> {
        let row = sqlx::query_as::<_, DbServiceOrder>("SELECT * FROM service_orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(ServiceOrder::from))
    }

    async fn mark_service_order_paid(&mut self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE service_orders SET is_paid = TRUE WHERE id = $1 AND is_paid = FALSE",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ========== 处方相关操作 ==========

    async fn get_prescription(&mut self, id: Uuid) -> Result<Option<Prescription>> {
        let row = sqlx::query_as::<_, DbPrescription>("SELECT * FROM prescriptions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, DbPrescriptionItem>(
            "SELECT * FROM prescription_items WHERE prescription_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Some(row.into_prescription(
            items.into_iter().map(PrescriptionItem::from).collect(),
        )))
    }

    async fn get_patient(&mut self, id: Uuid) -> Result<Option<Patient>> {
        let row = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Patient::from))
    }

    async fn get_medicine(&mut self, id: Uuid) -> Result<Option<Medicine>> {
        let row = sqlx::query_as::<_, DbMedicine>("SELECT * FROM medicines WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Medicine::from))
    }

    async fn mark_prescription_paid(&mut self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE prescriptions SET is_paid = TRUE WHERE id = $1 AND is_paid = FALSE",
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ========== 床位相关操作 ==========

    async fn list_departments(&mut self) -> Result<Vec<Department>> {
        let rows = sqlx::query_as::<_, DbDepartment>("SELECT * FROM departments ORDER BY name")
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Department::from).collect())
    }

    async fn list_wards(&mut self) -> Result<Vec<Ward>> {
        let rows = sqlx::query_as::<_, DbWard>("SELECT * FROM wards ORDER BY name")
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Ward::from).collect())
    }

    async fn list_beds(&mut self) -> Result<Vec<Bed>> {
        sqlx::query_as::<_, DbBed>("SELECT * FROM beds ORDER BY label")
            .fetch_all(&mut *self.tx)
            .await?
            .into_iter()
            .map(Bed::try_from)
            .collect()
    }

    async fn get_bed(&mut self, id: Uuid) -> Result<Option<Bed>> {
        sqlx::query_as::<_, DbBed>("SELECT * FROM beds WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Bed::try_from)
            .transpose()
    }

    async fn transition_bed_status(
        &mut self,
        id: Uuid,
        expected: BedStatus,
        next: BedStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE beds SET status = $1 WHERE id = $2 AND status = $3")
            .bind(next.as_db_str())
            .bind(id)
            .bind(expected.as_db_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    // ========== 住院相关操作 ==========

    async fn insert_admission(&mut self, admission: &Admission) -> Result<()> {
        sqlx::query(r#"
            INSERT INTO admissions (id, patient_id, visit_id, status, current_bed_id, admitted_at, discharged_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#)
        .bind(admission.id)
        .bind(admission.patient_id)
        .bind(admission.visit_id)
        .bind(admission.status.as_db_str())
        .bind(admission.current_bed_id)
        .bind(admission.admitted_at)
        .bind(admission.discharged_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_admission(&mut self, id: Uuid) -> Result<Option<Admission>> {
        sqlx::query_as::<_, DbAdmission>("SELECT * FROM admissions WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(Admission::try_from)
            .transpose()
    }

    async fn find_admitted_for_patient(&mut self, patient_id: Uuid) -> Result<Option<Admission>> {
        sqlx::query_as::<_, DbAdmission>(
            "SELECT * FROM admissions WHERE patient_id = $1 AND status = $2 LIMIT 1 FOR UPDATE",
        )
        .bind(patient_id)
        .bind(AdmissionStatus::Admitted.as_db_str())
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Admission::try_from)
        .transpose()
    }

    async fn update_admission(&mut self, admission: &Admission) -> Result<()> {
        sqlx::query(
            "UPDATE admissions SET status = $1, current_bed_id = $2, discharged_at = $3 WHERE id = $4",
        )
        .bind(admission.status.as_db_str())
        .bind(admission.current_bed_id)
        .bind(admission.discharged_at)
        .bind(admission.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_bed_transfer(&mut self, transfer: &BedTransfer) -> Result<()> {
        sqlx::query(r#"
            INSERT INTO bed_transfers (id, admission_id, from_bed_id, to_bed_id, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#)
        .bind(transfer.id)
        .bind(transfer.admission_id)
        .bind(transfer.from_bed_id)
        .bind(transfer.to_bed_id)
        .bind(transfer.start_date)
        .bind(transfer.end_date)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn close_bed_transfer(&mut self, id: Uuid, end_date: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE bed_transfers SET end_date = $1 WHERE id = $2 AND end_date IS NULL")
            .bind(end_date)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_bed_transfers(&mut self, admission_id: Uuid) -> Result<Vec<BedTransfer>> {
        let rows = sqlx::query_as::<_, DbBedTransfer>(
            "SELECT * FROM bed_transfers WHERE admission_id = $1 ORDER BY start_date ASC, end_date ASC NULLS LAST",
        )
        .bind(admission_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(BedTransfer::from).collect())
    }

    // ========== 事务控制 ==========

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
