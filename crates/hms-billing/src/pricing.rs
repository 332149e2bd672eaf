//! 计价规则
//!
//! 由收费项目或处方明细生成发票行，并计算合计、税额、优惠与应收。

use chrono::{DateTime, Utc};
use hms_core::models::*;
use hms_core::utils::{generate_invoice_number, round_money};
use hms_core::{HmsError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 待开票的一行
#[derive(Debug, Clone)]
pub struct LineItem {
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub service_id: Uuid,
    pub service_order_id: Option<Uuid>,
    pub prescription_id: Option<Uuid>,
    pub medicine_id: Option<Uuid>,
}

impl LineItem {
    /// 开单项目按基础价格计一次
    pub fn for_service_order(service: &Service, order: &ServiceOrder) -> Self {
        Self {
            name: service.name.clone(),
            quantity: 1,
            unit_price: service.base_price,
            service_id: service.id,
            service_order_id: Some(order.id),
            prescription_id: None,
            medicine_id: None,
        }
    }

    /// 处方明细；`linked_service` 仅用于满足发票明细对收费项目的外键
    pub fn for_prescription_item(
        item: &PrescriptionItem,
        medicine: &Medicine,
        linked_service: &Service,
    ) -> Self {
        Self {
            name: medicine.name.clone(),
            quantity: dispensed_quantity(item),
            unit_price: medicine.unit_price,
            service_id: linked_service.id,
            service_order_id: None,
            prescription_id: Some(item.prescription_id),
            medicine_id: Some(medicine.id),
        }
    }

    pub fn line_total(&self) -> Decimal {
        round_money(self.unit_price * Decimal::from(self.quantity))
    }
}

/// 处方明细的计费数量：有明确数量时取之，否则按1计
pub fn dispensed_quantity(item: &PrescriptionItem) -> i32 {
    match item.quantity {
        Some(quantity) if quantity > 0 => quantity,
        _ => 1,
    }
}

/// 发票金额汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub total_amount: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub net_amount: Decimal,
}

/// 计价策略
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    tax_rate: Decimal,
}

impl PricingPolicy {
    pub fn new(tax_rate: Decimal) -> Result<Self> {
        if tax_rate < Decimal::ZERO || tax_rate >= Decimal::ONE {
            return Err(HmsError::Validation(format!(
                "税率必须在[0, 1)区间内: {}",
                tax_rate
            )));
        }
        Ok(Self { tax_rate })
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn totals(&self, lines: &[LineItem], discount: Decimal) -> InvoiceTotals {
        let total_amount: Decimal = lines.iter().map(LineItem::line_total).sum();
        let tax_amount = round_money(total_amount * self.tax_rate);
        let discount_amount = round_money(discount.min(total_amount + tax_amount));

        InvoiceTotals {
            total_amount,
            tax_amount,
            discount_amount,
            net_amount: total_amount + tax_amount - discount_amount,
        }
    }

    /// 组装一张新发票
    pub fn build_invoice(
        &self,
        patient_id: Uuid,
        visit_id: Option<Uuid>,
        lines: Vec<LineItem>,
        status: InvoiceStatus,
        now: DateTime<Utc>,
    ) -> Invoice {
        let totals = self.totals(&lines, Decimal::ZERO);
        let invoice_id = Uuid::new_v4();

        let items = lines
            .into_iter()
            .map(|line| InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id,
                line_total: line.line_total(),
                name: line.name,
                quantity: line.quantity,
                unit_price: line.unit_price,
                service_id: line.service_id,
                service_order_id: line.service_order_id,
                prescription_id: line.prescription_id,
                medicine_id: line.medicine_id,
            })
            .collect();

        Invoice {
            id: invoice_id,
            invoice_number: generate_invoice_number(now),
            patient_id,
            visit_id,
            admission_id: None,
            status,
            total_amount: totals.total_amount,
            tax_amount: totals.tax_amount,
            discount_amount: totals.discount_amount,
            net_amount: totals.net_amount,
            items,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::ZERO,
        }
    }
}
