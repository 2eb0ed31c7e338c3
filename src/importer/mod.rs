// ==========================================
// 药品仓储机械臂 - 导入层
// ==========================================
// 职责: 从本地文件构建库存快照（离线/演示模式）
// ==========================================

pub mod error;
pub mod inventory_csv;

pub use error::{ImportError, ImportResult};
pub use inventory_csv::InventoryCsvParser;
