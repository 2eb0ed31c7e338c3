// ==========================================
// 药品仓储机械臂拣选仿真 - 核心库
// ==========================================
// 系统定位: 单机械臂、单订单在途的拣选 → 校验 → 投放 → 回程仿真
// 外部协作方: 仓储 REST 服务（库存/订单）、机器人实时通道
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 配置层 - 系统配置
pub mod config;

// API 层 - 仓储服务契约
pub mod api;

// 导入层 - 库存快照文件
pub mod importer;

// 实时通道 - 机器人控制端契约
pub mod realtime;

// 引擎层 - 状态机与运动插值
pub mod engine;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AckPolicy, Outcome, Phase, Vec3};

// 领域实体
pub use domain::{
    Container, LedgerEntry, Ledgers, Medicine, MedicineStock, OrderLine, OrderQueue,
    ProcessedOrder,
};

// 引擎
pub use engine::{
    ArmMotionInterpolator, ArmSimulation, ContainerMap, FulfillmentMachine, SimulationError,
    SimulationSnapshot,
};

// API
pub use api::{ApiError, InMemoryWarehouseApi, WarehouseApi};

// 配置
pub use config::{ConfigManager, SimulationConfig, WarehouseLayout};

// 实时通道
pub use realtime::{CommandSink, LoopbackRobot, MovementCommand, NoOpCommandSink, RealtimeEvent};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "药品仓储机械臂拣选仿真";
