//! # HMS Web 服务
//!
//! 对外提供 HTTP API 与 WebSocket 事件通道：
//! - 收费：结账、开单收费、处方收费与发票查询
//! - 住院：入院、转床、出院、床位维护与床位布局
//! - 事件：急诊与手术室分配的 HTTP 入口和 WebSocket 实时推送
//!
//! 成功响应统一为 `{statusCode, data, message}`，错误响应为 `{statusCode, message}`。

pub mod extract;
pub mod handlers;
pub mod response;
pub mod server;
pub mod ws;

pub use extract::{ApiJson, ApiPath};
pub use response::{ApiError, ApiResponse, ApiResult};
pub use server::{create_app, AppState, WebServer};
