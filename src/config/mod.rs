// ==========================================
// 药品仓储机械臂 - 配置层
// ==========================================
// 职责: 配置加载与校验，仓库布局
// 存储: JSON 配置文件（可选，缺省全部走默认值）
// ==========================================

pub mod config_manager;
pub mod error;
pub mod layout;
pub mod sim_config;

// 重导出核心配置类型
pub use config_manager::{config_keys, get_default_config_path, ConfigManager};
pub use error::{ConfigError, ConfigResult};
pub use layout::WarehouseLayout;
pub use sim_config::{MotionTuning, SimulationConfig};
