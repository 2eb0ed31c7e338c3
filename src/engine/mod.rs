// ==========================================
// 药品仓储机械臂 - 引擎层
// ==========================================
// 职责: 货箱库存表、运动插值、订单履约状态机、仿真驱动
// 红线: 状态机只通过事件推进，副作用统一由驱动层执行
// ==========================================

pub mod error;
pub mod fulfillment;
pub mod inventory;
pub mod motion;
pub mod simulation;

// 重导出核心引擎
pub use error::{SimulationError, SimulationResult};
pub use fulfillment::{
    Effect, FulfillmentMachine, MachineEvent, MachineSnapshot, OrderTally, SkippedLine,
    SyncSettings, Waiting,
};
pub use inventory::{ContainerMap, PickIssue};
pub use motion::{
    plan_route, ticks_to_converge, ArmMotionInterpolator, MotionEvent, MotionPlan, Segment,
    SegmentKind, CLAW_CLOSED, CLAW_OPEN,
};
pub use simulation::{ArmSimulation, SimulationSnapshot};
