//! 核心数据模型定义

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 以字符串形式落库的状态枚举
pub trait DbEnum: Sized {
    fn as_db_str(&self) -> &'static str;
    fn from_db_str(value: &str) -> Option<Self>;
}

macro_rules! db_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl DbEnum for $name {
            fn as_db_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            fn from_db_str(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub uhid: String, // 院内唯一患者标识
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// ========== 收费相关 ==========

/// 收费项目（挂号、检验、检查等）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub base_price: Decimal,
}

/// 检验/检查开单
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrder {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub service_id: Uuid,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

/// 药品字典
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
}

/// 处方
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub is_paid: bool,
    pub items: Vec<PrescriptionItem>,
    pub created_at: DateTime<Utc>,
}

/// 处方明细
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionItem {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub medicine_id: Uuid,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration_days: Option<i32>,
    /// 明确的发药数量；为空时按1计
    pub quantity: Option<i32>,
}

/// 就诊记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub status: VisitStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// 就诊状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VisitStatus {
    Active,
    Completed,
}

db_enum!(VisitStatus {
    Active => "ACTIVE",
    Completed => "COMPLETED",
});

/// 发票
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub admission_id: Option<Uuid>,
    pub status: InvoiceStatus,
    pub total_amount: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub net_amount: Decimal,
    pub items: Vec<InvoiceItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 发票状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InvoiceStatus {
    Draft,     // 草稿
    Paid,      // 已收费
    Finalized, // 已结账，不可再修改
}

db_enum!(InvoiceStatus {
    Draft => "DRAFT",
    Paid => "PAID",
    Finalized => "FINALIZED",
});

/// 发票明细
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceItem {
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

// ========== 住院与床位 ==========

/// 科室
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Uuid,
    pub name: String,
}

/// 病区
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ward {
    pub id: Uuid,
    pub department_id: Uuid,
    pub name: String,
}

/// 床位
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bed {
    pub id: Uuid,
    pub ward_id: Uuid,
    pub label: String,
    pub status: BedStatus,
}

/// 床位状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BedStatus {
    Available,   // 空闲
    Occupied,    // 占用
    Maintenance, // 维护中
}

db_enum!(BedStatus {
    Available => "AVAILABLE",
    Occupied => "OCCUPIED",
    Maintenance => "MAINTENANCE",
});

/// 住院记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admission {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub visit_id: Option<Uuid>,
    pub status: AdmissionStatus,
    pub current_bed_id: Option<Uuid>,
    pub admitted_at: DateTime<Utc>,
    pub discharged_at: Option<DateTime<Utc>>,
}

/// 住院状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AdmissionStatus {
    Admitted,
    Discharged,
}

db_enum!(AdmissionStatus {
    Admitted => "ADMITTED",
    Discharged => "DISCHARGED",
});

/// 转床记录，入院时的首次分床也记为一条（from_bed_id为空）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BedTransfer {
    pub id: Uuid,
    pub admission_id: Uuid,
    pub from_bed_id: Option<Uuid>,
    pub to_bed_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_enum_round_trip_and_unknown() {
        assert_eq!(InvoiceStatus::Finalized.as_db_str(), "FINALIZED");
        assert_eq!(BedStatus::from_db_str("MAINTENANCE"), Some(BedStatus::Maintenance));
        assert_eq!(VisitStatus::from_db_str("unknown"), None);
    }

    #[test]
    fn test_invoice_serializes_camel_case() {
        let invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: "INV-1".to_string(),
            patient_id: Uuid::new_v4(),
            visit_id: None,
            admission_id: None,
            status: InvoiceStatus::Paid,
            total_amount: Decimal::new(500, 0),
            tax_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            net_amount: Decimal::new(500, 0),
            items: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&invoice).unwrap();
        assert_eq!(value["status"], "Paid");
        assert!(value.get("netAmount").is_some());
        assert!(value.get("invoiceNumber").is_some());
    }
}
