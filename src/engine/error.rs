// ==========================================
// 药品仓储机械臂 - 仿真驱动错误类型
// ==========================================

use crate::api::ApiError;
use crate::domain::types::Phase;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("机械臂忙碌（当前阶段: {phase}），请等待当前订单完成")]
    Busy { phase: Phase },

    #[error("订单号无效: {0:?}")]
    InvalidOrderId(String),

    #[error("运行超过帧数上限 {frames}，仍未回到空闲")]
    FrameLimit { frames: u64 },

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub type SimulationResult<T> = Result<T, SimulationError>;
