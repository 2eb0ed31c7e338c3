// ==========================================
// 药品仓储机械臂 - API层错误类型
// ==========================================
// 职责: 外部仓储服务（REST）调用失败的分类
// 说明: 所有错误最终在仿真驱动层转为界面状态文本
// ==========================================

use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 传输错误
    // ==========================================
    #[error("仓储服务请求失败: {0}")]
    Transport(String),

    // ==========================================
    // 业务错误
    // ==========================================
    #[error("订单不存在: {0}")]
    NotFound(String),

    #[error("订单已处理: {0}")]
    AlreadyProcessed(String),

    // ==========================================
    // 响应结构错误
    // ==========================================
    #[error("响应结构异常: {0}")]
    Malformed(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 是否为网络/传输类故障
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Malformed(err.to_string())
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
