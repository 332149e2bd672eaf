//! # HMS数据库模块
//!
//! 提供存储接口的两种实现：基于PostgreSQL连接池的事务存储，以及用于测试和演示的内存存储。

pub mod connection;
pub mod memory;
pub mod models;
pub mod queries;

// 重新导出主要类型
pub use connection::{DatabasePool, PgStore, PoolSettings};
pub use memory::{MemoryState, MemoryStore, MemoryTx};
pub use models::*;
pub use queries::{DatabaseQueries, PgStoreTx};
