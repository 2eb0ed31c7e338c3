// ==========================================
// 药品仓储机械臂 - 领域层
// ==========================================
// 职责: 定义核心实体与类型，不含 I/O
// ==========================================

pub mod ledger;
pub mod medicine;
pub mod order;
pub mod types;

// 重导出核心类型
pub use ledger::{LedgerEntry, Ledgers};
pub use medicine::{Container, Medicine, MedicineStock};
pub use order::{OrderItem, OrderLine, OrderQueue, OrderRecord, OrderRecordItem, ProcessedOrder};
pub use types::{AckPolicy, Axis, Outcome, Phase, Vec3};
