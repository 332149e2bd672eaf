//! # HMS收费模块
//!
//! 提供门诊与住院收费功能，包括：
//! - 就诊结账：草稿发票定稿，就诊关闭
//! - 开单收费：检验/检查开单按收费项目基础价格开票
//! - 处方收费：按药品单价与数量逐行开票
//!
//! 已支付的开单和处方不能重复开票，支付标记采用条件更新完成。

pub mod ledger;
pub mod pricing;

// 重新导出主要类型
pub use ledger::{BillingService, VisitFinalization};
pub use pricing::{dispensed_quantity, InvoiceTotals, LineItem, PricingPolicy};
