// ==========================================
// 药品仓储机械臂 - 配置层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 配置层错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读写失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("配置文件解析失败: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("配置值无效 (key={key}, value={value}): {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
