//! 内存存储
//!
//! 与PostgreSQL存储具有相同的事务语义：同一时刻只有一个事务持有状态锁，
//! 事务在工作副本上读写，提交时整体写回，未提交即丢弃。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hms_core::models::*;
use hms_core::utils::generate_invoice_number;
use hms_core::{Result, Store, StoreTx};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// 内存中的全部数据
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub patients: HashMap<Uuid, Patient>,
    pub services: HashMap<Uuid, Service>,
    pub service_orders: HashMap<Uuid, ServiceOrder>,
    pub medicines: HashMap<Uuid, Medicine>,
    pub prescriptions: HashMap<Uuid, Prescription>,
    pub visits: HashMap<Uuid, Visit>,
    pub invoices: HashMap<Uuid, Invoice>,
    pub departments: HashMap<Uuid, Department>,
    pub wards: HashMap<Uuid, Ward>,
    pub beds: HashMap<Uuid, Bed>,
    pub admissions: HashMap<Uuid, Admission>,
    /// 按写入顺序保存
    pub bed_transfers: Vec<BedTransfer>,
}

impl MemoryState {
    pub fn add_patient(&mut self, uhid: &str, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.patients.insert(
            id,
            Patient {
                id,
                uhid: uhid.to_string(),
                name: name.to_string(),
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn add_service(&mut self, name: &str, base_price: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        self.services.insert(
            id,
            Service {
                id,
                name: name.to_string(),
                base_price,
            },
        );
        id
    }

    pub fn add_visit(&mut self, patient_id: Uuid, started_at: DateTime<Utc>) -> Uuid {
        let id = Uuid::new_v4();
        self.visits.insert(
            id,
            Visit {
                id,
                patient_id,
                status: VisitStatus::Active,
                started_at,
                completed_at: None,
            },
        );
        id
    }

    pub fn add_service_order(
        &mut self,
        patient_id: Uuid,
        visit_id: Option<Uuid>,
        service_id: Uuid,
        is_paid: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.service_orders.insert(
            id,
            ServiceOrder {
                id,
                patient_id,
                visit_id,
                service_id,
                is_paid,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn add_medicine(&mut self, name: &str, unit_price: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        self.medicines.insert(
            id,
            Medicine {
                id,
                name: name.to_string(),
                unit_price,
            },
        );
        id
    }

    /// `items` 为 (药品ID, 明确的数量)
    pub fn add_prescription(
        &mut self,
        patient_id: Uuid,
        visit_id: Option<Uuid>,
        items: &[(Uuid, Option<i32>)],
        is_paid: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let items = items
            .iter()
            .map(|(medicine_id, quantity)| PrescriptionItem {
                id: Uuid::new_v4(),
                prescription_id: id,
                medicine_id: *medicine_id,
                dosage: None,
                frequency: None,
                duration_days: None,
                quantity: *quantity,
            })
            .collect();

        self.prescriptions.insert(
            id,
            Prescription {
                id,
                patient_id,
                visit_id,
                is_paid,
                items,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// 为就诊挂一张草稿发票（门诊累计费用）
    pub fn add_draft_invoice(&mut self, patient_id: Uuid, visit_id: Uuid, amount: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.invoices.insert(
            id,
            Invoice {
                id,
                invoice_number: generate_invoice_number(now),
                patient_id,
                visit_id: Some(visit_id),
                admission_id: None,
                status: InvoiceStatus::Draft,
                total_amount: amount,
                tax_amount: Decimal::ZERO,
                discount_amount: Decimal::ZERO,
                net_amount: amount,
                items: vec![],
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub fn add_department(&mut self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.departments.insert(
            id,
            Department {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn add_ward(&mut self, department_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.wards.insert(
            id,
            Ward {
                id,
                department_id,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn add_bed(&mut self, ward_id: Uuid, label: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.beds.insert(
            id,
            Bed {
                id,
                ward_id,
                label: label.to_string(),
                status: BedStatus::Available,
            },
        );
        id
    }

    /// 演示数据：两个科室、三个病区、若干床位与收费数据
    pub fn demo() -> Self {
        let mut state = Self::default();
        let now = Utc::now();

        let consultation = state.add_service("Consultation", Decimal::new(500, 0));
        state.add_service("Complete Blood Count", Decimal::new(350, 0));
        state.add_service("Chest X-Ray", Decimal::new(1200, 0));
        let paracetamol = state.add_medicine("Paracetamol 500mg", Decimal::new(250, 2));
        let amoxicillin = state.add_medicine("Amoxicillin 250mg", Decimal::new(1200, 2));

        let patient = state.add_patient("UHID-000001", "Demo Patient");
        let visit = state.add_visit(patient, now - Duration::hours(2));
        state.add_service_order(patient, Some(visit), consultation, false);
        state.add_prescription(
            patient,
            Some(visit),
            &[(paracetamol, Some(10)), (amoxicillin, None)],
            false,
        );
        state.add_draft_invoice(patient, visit, Decimal::new(1200, 0));

        let medicine = state.add_department("General Medicine");
        let surgery = state.add_department("Surgery");
        for (department, ward_name, prefix, beds) in [
            (medicine, "Ward A", "A", 6),
            (medicine, "Ward B", "B", 4),
            (surgery, "Post-Op", "S", 4),
        ] {
            let ward = state.add_ward(department, ward_name);
            for n in 1..=beds {
                state.add_bed(ward, &format!("{}-{:02}", prefix, n));
            }
        }

        state
    }
}

/// 内存存储
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// 直接修改状态（用于初始化数据）
    pub async fn seed<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut MemoryState) -> T,
    {
        let mut state = self.state.lock().await;
        f(&mut state)
    }

    /// 当前已提交状态的副本
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { guard, working })
    }
}

/// 内存事务
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn get_patient(&mut self, id: Uuid) -> Result<Option<Patient>> {
        Ok(self.working.patients.get(&id).cloned())
    }

    async fn get_visit(&mut self, id: Uuid) -> Result<Option<Visit>> {
        Ok(self.working.visits.get(&id).cloned())
    }

    async fn list_visits_by_status(&mut self, status: VisitStatus) -> Result<Vec<Visit>> {
        let mut visits: Vec<Visit> = self
            .working
            .visits
            .values()
            .filter(|visit| visit.status == status)
            .cloned()
            .collect();
        visits.sort_by_key(|visit| visit.started_at);
        Ok(visits)
    }

    async fn update_visit_status(
        &mut self,
        id: Uuid,
        status: VisitStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let Some(visit) = self.working.visits.get_mut(&id) {
            visit.status = status;
            visit.completed_at = completed_at;
        }
        Ok(())
    }

    async fn find_draft_invoice_for_visit(&mut self, visit_id: Uuid) -> Result<Option<Invoice>> {
        Ok(self
            .working
            .invoices
            .values()
            .filter(|invoice| {
                invoice.visit_id == Some(visit_id) && invoice.status == InvoiceStatus::Draft
            })
            .min_by_key(|invoice| invoice.created_at)
            .cloned())
    }

    async fn get_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>> {
        Ok(self.working.invoices.get(&id).cloned())
    }

    async fn list_invoices_for_patient(&mut self, patient_id: Uuid) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .working
            .invoices
            .values()
            .filter(|invoice| invoice.patient_id == patient_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invoices)
    }

    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()> {
        self.working.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn update_invoice_status(
        &mut self,
        id: Uuid,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        if let Some(invoice) = self.working.invoices.get_mut(&id) {
            invoice.status = status;
            invoice.updated_at = updated_at;
        }
        Ok(())
    }

    async fn get_service(&mut self, id: Uuid) -> Result<Option<Service>> {
        Ok(self.working.services.get(&id).cloned())
    }

    async fn first_service(&mut self) -> Result<Option<Service>> {
        Ok(self
            .working
            .services
            .values()
            .min_by(|a, b| a.name.cmp(&b.name))
            .cloned())
    }

    async fn get_service_order(&mut self, id: Uuid) -> Result<Option<ServiceOrder>> {
        Ok(self.working.service_orders.get(&id).cloned())
    }

    async fn mark_service_order_paid(&mut self, id: Uuid) -> Result<bool> {
        match self.working.service_orders.get_mut(&id) {
            Some(order) if !order.is_paid => {
                order.is_paid = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_prescription(&mut self, id: Uuid) -> Result<Option<Prescription>> {
        Ok(self.working.prescriptions.get(&id).cloned())
    }

    async fn get_medicine(&mut self, id: Uuid) -> Result<Option<Medicine>> {
        Ok(self.working.medicines.get(&id).cloned())
    }

    async fn mark_prescription_paid(&mut self, id: Uuid) -> Result<bool> {
        match self.working.prescriptions.get_mut(&id) {
            Some(prescription) if !prescription.is_paid => {
                prescription.is_paid = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_departments(&mut self) -> Result<Vec<Department>> {
        let mut departments: Vec<Department> =
            self.working.departments.values().cloned().collect();
        departments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(departments)
    }

    async fn list_wards(&mut self) -> Result<Vec<Ward>> {
        let mut wards: Vec<Ward> = self.working.wards.values().cloned().collect();
        wards.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(wards)
    }

    async fn list_beds(&mut self) -> Result<Vec<Bed>> {
        let mut beds: Vec<Bed> = self.working.beds.values().cloned().collect();
        beds.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(beds)
    }

    async fn get_bed(&mut self, id: Uuid) -> Result<Option<Bed>> {
        Ok(self.working.beds.get(&id).cloned())
    }

    async fn transition_bed_status(
        &mut self,
        id: Uuid,
        expected: BedStatus,
        next: BedStatus,
    ) -> Result<bool> {
        match self.working.beds.get_mut(&id) {
            Some(bed) if bed.status == expected => {
                bed.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_admission(&mut self, admission: &Admission) -> Result<()> {
        self.working.admissions.insert(admission.id, admission.clone());
        Ok(())
    }

    async fn get_admission(&mut self, id: Uuid) -> Result<Option<Admission>> {
        Ok(self.working.admissions.get(&id).cloned())
    }

    async fn find_admitted_for_patient(&mut self, patient_id: Uuid) -> Result<Option<Admission>> {
        Ok(self
            .working
            .admissions
            .values()
            .find(|a| a.patient_id == patient_id && a.status == AdmissionStatus::Admitted)
            .cloned())
    }

    async fn update_admission(&mut self, admission: &Admission) -> Result<()> {
        if let Some(existing) = self.working.admissions.get_mut(&admission.id) {
            *existing = admission.clone();
        }
        Ok(())
    }

    async fn insert_bed_transfer(&mut self, transfer: &BedTransfer) -> Result<()> {
        self.working.bed_transfers.push(transfer.clone());
        Ok(())
    }

    async fn close_bed_transfer(&mut self, id: Uuid, end_date: DateTime<Utc>) -> Result<()> {
        if let Some(transfer) = self
            .working
            .bed_transfers
            .iter_mut()
            .find(|transfer| transfer.id == id && transfer.end_date.is_none())
        {
            transfer.end_date = Some(end_date);
        }
        Ok(())
    }

    async fn list_bed_transfers(&mut self, admission_id: Uuid) -> Result<Vec<BedTransfer>> {
        let mut transfers: Vec<BedTransfer> = self
            .working
            .bed_transfers
            .iter()
            .filter(|transfer| transfer.admission_id == admission_id)
            .cloned()
            .collect();
        transfers.sort_by_key(|transfer| transfer.start_date);
        Ok(transfers)
    }

    async fn commit(self) -> Result<()> {
        let MemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
