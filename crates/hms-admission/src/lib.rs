//! # HMS住院模块
//!
//! 提供住院床位管理功能，包括：
//! - 床位状态机：管理床位空闲、占用、维护之间的转换
//! - 住院登记：入院、转床、出院，转床历史只追加不覆盖
//! - 床位布局：科室、病区、床位的层级视图与占用统计

pub mod layout;
pub mod registry;
pub mod state_machine;

// 重新导出主要类型
pub use layout::{DepartmentLayout, HospitalLayout, OccupancyStats, WardLayout};
pub use registry::{AdmissionDetail, AdmissionRegistry, AdmitRequest};
pub use state_machine::{BedEvent, BedStateMachine};
