// ==========================================
// 药品仓储机械臂 - API 层
// ==========================================
// 职责: 外部仓储服务（库存查询 / 订单处理 / 订单列表）的消费契约
// ==========================================

pub mod error;
pub mod memory_api;
pub mod warehouse_api;

pub use error::{ApiError, ApiResult};
pub use memory_api::{InMemoryWarehouseApi, OrderItemSpec};
pub use warehouse_api::{parse_medicines, parse_order_records, parse_processed_order, WarehouseApi};
