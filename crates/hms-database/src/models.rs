//! 数据库模型

use chrono::{DateTime, Utc};
use hms_core::models::*;
use hms_core::{HmsError, Result};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

// 数据库表模型 - 使用FromRow trait用于SQL查询，状态字段存储为字符串

fn parse_status<T: DbEnum>(value: &str, column: &str) -> Result<T> {
    T::from_db_str(value)
        .ok_or_else(|| HmsError::Database(format!("未知的{}取值: {}", column, value)))
}

/// 数据库就诊表
#[derive(Debug, FromRow)]
pub struct DbVisit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbVisit> for Visit {
    type Error = HmsError;

    fn try_from(db_visit: DbVisit) -> Result<Self> {
        Ok(Visit {
            id: db_visit.id,
            patient_id: db_visit.patient_id,
            status: parse_status(&db_visit.status, "visits.status")?,
            started_at: db_visit.started_at,
            completed_at: db_visit.completed_at,
        })
    }
}

/// 数据库发票表（不含明细）
#[derive(Debug, FromRow)]
pub struct DbInvoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub admission_id: Option<Uuid>,
    pub status: String,
    pub total_amount: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub net_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbInvoice {
    /// 与明细组装成领域对象
    pub fn into_invoice(self, items: Vec<InvoiceItem>) -> Result<Invoice> {
        Ok(Invoice {
            id: self.id,
            invoice_number: self.invoice_number,
            patient_id: self.patient_id,
            visit_id: self.visit_id,
            admission_id: self.admission_id,
            status: parse_status(&self.status, "invoices.status")?,
            total_amount: self.total_amount,
            tax_amount: self.tax_amount,
            discount_amount: self.discount_amount,
            net_amount: self.net_amount,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// 数据库发票明细表
#[derive(Debug, FromRow)]
pub struct DbInvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub service_id: Uuid,
    pub service_order_id: Option<Uuid>,
    pub prescription_id: Option<Uuid>,
    pub medicine_id: Option<Uuid>,
}

impl From<DbInvoiceItem> for InvoiceItem {
    fn from(row: DbInvoiceItem) -> Self {
        InvoiceItem {
            id: row.id,
            invoice_id: row.invoice_id,
            name: row.name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total: row.line_total,
            service_id: row.service_id,
            service_order_id: row.service_order_id,
            prescription_id: row.prescription_id,
            medicine_id: row.medicine_id,
        }
    }
}

/// 数据库收费项目表
#[derive(Debug, FromRow)]
pub struct DbService {
    pub id: Uuid,
    pub name: String,
    pub base_price: Decimal,
}

impl From<DbService> for Service {
    fn from(row: DbService) -> Self {
        Service {
            id: row.id,
            name: row.name,
            base_price: row.base_price,
        }
    }
}

/// 数据库开单表
#[derive(Debug, FromRow)]
pub struct DbServiceOrder {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub service_id: Uuid,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbServiceOrder> for ServiceOrder {
    fn from(row: DbServiceOrder) -> Self {
        ServiceOrder {
            id: row.id,
            patient_id: row.patient_id,
            visit_id: row.visit_id,
            service_id: row.service_id,
            is_paid: row.is_paid,
            created_at: row.created_at,
        }
    }
}

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: Uuid,
    pub uhid: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbPatient> for Patient {
    fn from(row: DbPatient) -> Self {
        Patient {
            id: row.id,
            uhid: row.uhid,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

/// 数据库药品表
#[derive(Debug, FromRow)]
pub struct DbMedicine {
    pub id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
}

impl From<DbMedicine> for Medicine {
    fn from(row: DbMedicine) -> Self {
        Medicine {
            id: row.id,
            name: row.name,
            unit_price: row.unit_price,
        }
    }
}

/// 数据库处方表（不含明细）
#[derive(Debug, FromRow)]
pub struct DbPrescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

impl DbPrescription {
    pub fn into_prescription(self, items: Vec<PrescriptionItem>) -> Prescription {
        Prescription {
            id: self.id,
            patient_id: self.patient_id,
            visit_id: self.visit_id,
            is_paid: self.is_paid,
            items,
            created_at: self.created_at,
        }
    }
}

/// 数据库处方明细表
#[derive(Debug, FromRow)]
pub struct DbPrescriptionItem {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub medicine_id: Uuid,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration_days: Option<i32>,
    pub quantity: Option<i32>,
}

impl From<DbPrescriptionItem> for PrescriptionItem {
    fn from(row: DbPrescriptionItem) -> Self {
        PrescriptionItem {
            id: row.id,
            prescription_id: row.prescription_id,
            medicine_id: row.medicine_id,
            dosage: row.dosage,
            frequency: row.frequency,
            duration_days: row.duration_days,
            quantity: row.quantity,
        }
    }
}

/// 数据库科室表
#[derive(Debug, FromRow)]
pub struct DbDepartment {
    pub id: Uuid,
    pub name: String,
}

impl From<DbDepartment> for Department {
    fn from(row: DbDepartment) -> Self {
        Department {
            id: row.id,
            name: row.name,
        }
    }
}

/// 数据库病区表
#[derive(Debug, FromRow)]
pub struct DbWard {
    pub id: Uuid,
    pub department_id: Uuid,
    pub name: String,
}

impl From<DbWard> for Ward {
    fn from(row: DbWard) -> Self {
        Ward {
            id: row.id,
            department_id: row.department_id,
            name: row.name,
        }
    }
}

/// 数据库床位表
#[derive(Debug, FromRow)]
pub struct DbBed {
    pub id: Uuid,
    pub ward_id: Uuid,
    pub label: String,
    pub status: String,
}

impl TryFrom<DbBed> for Bed {
    type Error = HmsError;

    fn try_from(row: DbBed) -> Result<Self> {
        Ok(Bed {
            id: row.id,
            ward_id: row.ward_id,
            label: row.label,
            status: parse_status(&row.status, "beds.status")?,
        })
    }
}

/// 数据库住院表
#[derive(Debug, FromRow)]
pub struct DbAdmission {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub status: String,
    pub current_bed_id: Option<Uuid>,
    pub admitted_at: DateTime<Utc>,
    pub discharged_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbAdmission> for Admission {
    type Error = HmsError;

    fn try_from(row: DbAdmission) -> Result<Self> {
        Ok(Admission {
            id: row.id,
            patient_id: row.patient_id,
            visit_id: row.visit_id,
            status: parse_status(&row.status, "admissions.status")?,
            current_bed_id: row.current_bed_id,
            admitted_at: row.admitted_at,
            discharged_at: row.discharged_at,
        })
    }
}

/// 数据库转床记录表
#[derive(Debug, FromRow)]
pub struct DbBedTransfer {
    pub id: Uuid,
    pub admission_id: Uuid,
    pub from_bed_id: Option<Uuid>,
    pub to_bed_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl From<DbBedTransfer> for BedTransfer {
    fn from(row: DbBedTransfer) -> Self {
        BedTransfer {
            id: row.id,
            admission_id: row.admission_id,
            from_bed_id: row.from_bed_id,
            to_bed_id: row.to_bed_id,
            start_date: row.start_date,
            end_date: row.end_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_is_rejected() {
        let row = DbBed {
            id: Uuid::new_v4(),
            ward_id: Uuid::new_v4(),
            label: "A-01".to_string(),
            status: "BROKEN".to_string(),
        };

        let result = Bed::try_from(row);
        assert!(matches!(result, Err(HmsError::Database(_))));
    }

    #[test]
    fn test_visit_conversion() {
        let row = DbVisit {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            status: "ACTIVE".to_string(),
            started_at: Utc::now(),
            completed_at: None,
        };

        let visit = Visit::try_from(row).unwrap();
        assert_eq!(visit.status, VisitStatus::Active);
    }
}
