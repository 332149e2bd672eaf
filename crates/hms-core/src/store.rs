//! 存储接口
//!
//! 业务服务只依赖这里的trait，具体实现（PostgreSQL、内存）在 `hms-database` 中。
//! 所有读写都发生在一个事务内：`commit` 之前的修改对其他事务不可见，
//! 事务对象被丢弃而未提交时全部回滚。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

/// 存储后端
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: StoreTx;

    /// 开启一个事务
    async fn begin(&self) -> Result<Self::Tx>;
}

/// 事务内可用的全部操作
#[async_trait]
pub trait StoreTx: Send {
    // ========== 患者 ==========

    async fn get_patient(&mut self, id: Uuid) -> Result<Option<Patient>>;

    // ========== 就诊 ==========

    async fn get_visit(&mut self, id: Uuid) -> Result<Option<Visit>>;

    async fn list_visits_by_status(&mut self, status: VisitStatus) -> Result<Vec<Visit>>;

    async fn update_visit_status(
        &mut self,
        id: Uuid,
        status: VisitStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    // ========== 发票 ==========

    async fn find_draft_invoice_for_visit(&mut self, visit_id: Uuid) -> Result<Option<Invoice>>;

    async fn get_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>>;

    async fn list_invoices_for_patient(&mut self, patient_id: Uuid) -> Result<Vec<Invoice>>;

    /// 写入发票及其全部明细
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<()>;

    async fn update_invoice_status(
        &mut self,
        id: Uuid,
        status: InvoiceStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    // ========== 收费项目与开单 ==========

    async fn get_service(&mut self, id: Uuid) -> Result<Option<Service>>;

    /// 按名称排序的第一个收费项目
    async fn first_service(&mut self) -> Result<Option<Service>>;

    async fn get_service_order(&mut self, id: Uuid) -> Result<Option<ServiceOrder>>;

    /// 条件更新 is_paid: false -> true，返回是否由本事务完成了标记
    async fn mark_service_order_paid(&mut self, id: Uuid) -> Result<bool>;

    // ========== 处方 ==========

    /// 读取处方及明细
    async fn get_prescription(&mut self, id: Uuid) -> Result<Option<Prescription>>;

    async fn get_medicine(&mut self, id: Uuid) -> Result<Option<Medicine>>;

    /// 条件更新 is_paid: false -> true，返回是否由本事务完成了标记
    async fn mark_prescription_paid(&mut self, id: Uuid) -> Result<bool>;

    // ========== 床位 ==========

    async fn list_departments(&mut self) -> Result<Vec<Department>>;

    async fn list_wards(&mut self) -> Result<Vec<Ward>>;

    async fn list_beds(&mut self) -> Result<Vec<Bed>>;

    async fn get_bed(&mut self, id: Uuid) -> Result<Option<Bed>>;

    /// 条件更新床位状态，仅当当前状态为 `expected` 时生效
    async fn transition_bed_status(
        &mut self,
        id: Uuid,
        expected: BedStatus,
        next: BedStatus,
    ) -> Result<bool>;

    // ========== 住院 ==========

    async fn insert_admission(&mut self, admission: &Admission) -> Result<()>;

    async fn get_admission(&mut self, id: Uuid) -> Result<Option<Admission>>;

    /// 患者当前在院的住院记录
    async fn find_admitted_for_patient(&mut self, patient_id: Uuid) -> Result<Option<Admission>>;

    async fn update_admission(&mut self, admission: &Admission) -> Result<()>;

    /// 追加一条转床记录
    async fn insert_bed_transfer(&mut self, transfer: &BedTransfer) -> Result<()>;

    /// 结束一条转床记录
    async fn close_bed_transfer(&mut self, id: Uuid, end_date: DateTime<Utc>) -> Result<()>;

    /// 按开始时间升序返回住院的全部转床记录
    async fn list_bed_transfers(&mut self, admission_id: Uuid) -> Result<Vec<BedTransfer>>;

    // ========== 事务控制 ==========

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
