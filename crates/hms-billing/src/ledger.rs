//! 收费台账服务
//!
//! 每个写操作都在一个存储事务中完成，出错时事务被丢弃，不会留下半张发票或孤立的已支付标记。

use chrono::Utc;
use hms_core::models::*;
use hms_core::{HmsError, Result, Store, StoreTx};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pricing::{LineItem, PricingPolicy};

/// 就诊结账结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitFinalization {
    pub visit: Visit,
    pub invoice: Option<Invoice>,
}

/// 收费服务
pub struct BillingService<S: Store> {
    store: S,
    pricing: PricingPolicy,
}

impl<S: Store> BillingService<S> {
    pub fn new(store: S, pricing: PricingPolicy) -> Self {
        Self { store, pricing }
    }

    /// 就诊结账：草稿发票转为已结账，就诊转为已完成
    pub async fn finalize_visit(&self, visit_id: Uuid) -> Result<VisitFinalization> {
        let mut tx = self.store.begin().await?;

        let mut visit = tx
            .get_visit(visit_id)
            .await?
            .ok_or_else(|| HmsError::not_found("Visit", visit_id))?;

        let now = Utc::now();
        let invoice = match tx.find_draft_invoice_for_visit(visit_id).await? {
            Some(mut invoice) => {
                tx.update_invoice_status(invoice.id, InvoiceStatus::Finalized, now)
                    .await?;
                invoice.status = InvoiceStatus::Finalized;
                invoice.updated_at = now;
                Some(invoice)
            }
            None => None,
        };

        let completed_at = visit.completed_at.unwrap_or(now);
        tx.update_visit_status(visit_id, VisitStatus::Completed, Some(completed_at))
            .await?;
        tx.commit().await?;

        visit.status = VisitStatus::Completed;
        visit.completed_at = Some(completed_at);

        info!(
            "Visit {} finalized (invoice: {:?})",
            visit_id,
            invoice.as_ref().map(|i| i.id)
        );
        Ok(VisitFinalization { visit, invoice })
    }

    /// 为检验/检查开单收费
    pub async fn invoice_service_order(&self, order_id: Uuid) -> Result<Invoice> {
        let mut tx = self.store.begin().await?;

        let order = tx
            .get_service_order(order_id)
            .await?
            .ok_or_else(|| HmsError::not_found("ServiceOrder", order_id))?;

        if order.is_paid {
            tx.rollback().await?;
            warn!("Service order {} is already paid", order_id);
            return Err(HmsError::already_paid("ServiceOrder", order_id));
        }

        let service = tx
            .get_service(order.service_id)
            .await?
            .ok_or_else(|| HmsError::not_found("Service", order.service_id))?;

        // 并发收费时只有一个事务能完成标记
        if !tx.mark_service_order_paid(order_id).await? {
            tx.rollback().await?;
            warn!("Service order {} was paid concurrently", order_id);
            return Err(HmsError::already_paid("ServiceOrder", order_id));
        }

        let invoice = self.pricing.build_invoice(
            order.patient_id,
            order.visit_id,
            vec![LineItem::for_service_order(&service, &order)],
            InvoiceStatus::Paid,
            Utc::now(),
        );
        tx.insert_invoice(&invoice).await?;
        tx.commit().await?;

        info!(
            "Invoice {} created for service order {} (net {})",
            invoice.invoice_number, order_id, invoice.net_amount
        );
        Ok(invoice)
    }

    /// 处方收费，每个药品一行
    pub async fn invoice_prescription(&self, prescription_id: Uuid) -> Result<Invoice> {
        let mut tx = self.store.begin().await?;

        let prescription = tx
            .get_prescription(prescription_id)
            .await?
            .ok_or_else(|| HmsError::not_found("Prescription", prescription_id))?;

        if prescription.is_paid {
            tx.rollback().await?;
            warn!("Prescription {} is already paid", prescription_id);
            return Err(HmsError::already_paid("Prescription", prescription_id));
        }

        if prescription.items.is_empty() {
            tx.rollback().await?;
            return Err(HmsError::Validation(format!(
                "处方 {} 没有药品明细",
                prescription_id
            )));
        }

        // 发票明细必须关联一个收费项目
        let linked_service = tx.first_service().await?.ok_or_else(|| {
            HmsError::System("收费项目字典为空，无法为处方开票".to_string())
        })?;

        let mut lines = Vec::with_capacity(prescription.items.len());
        for item in &prescription.items {
            let medicine = tx
                .get_medicine(item.medicine_id)
                .await?
                .ok_or_else(|| HmsError::not_found("Medicine", item.medicine_id))?;
            lines.push(LineItem::for_prescription_item(item, &medicine, &linked_service));
        }

        if !tx.mark_prescription_paid(prescription_id).await? {
            tx.rollback().await?;
            warn!("Prescription {} was paid concurrently", prescription_id);
            return Err(HmsError::already_paid("Prescription", prescription_id));
        }

        let invoice = self.pricing.build_invoice(
            prescription.patient_id,
            prescription.visit_id,
            lines,
            InvoiceStatus::Paid,
            Utc::now(),
        );
        tx.insert_invoice(&invoice).await?;
        tx.commit().await?;

        info!(
            "Invoice {} created for prescription {} ({} items, net {})",
            invoice.invoice_number,
            prescription_id,
            invoice.items.len(),
            invoice.net_amount
        );
        Ok(invoice)
    }

    /// 进行中的就诊，按开始时间升序
    pub async fn list_active_visits(&self) -> Result<Vec<Visit>> {
        let mut tx = self.store.begin().await?;
        tx.list_visits_by_status(VisitStatus::Active).await
    }

    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Invoice> {
        let mut tx = self.store.begin().await?;
        tx.get_invoice(invoice_id)
            .await?
            .ok_or_else(|| HmsError::not_found("Invoice", invoice_id))
    }

    /// 患者全部发票，最新的在前
    pub async fn list_patient_invoices(&self, patient_id: Uuid) -> Result<Vec<Invoice>> {
        let mut tx = self.store.begin().await?;
        tx.list_invoices_for_patient(patient_id).await
    }
}
