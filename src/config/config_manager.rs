// ==========================================
// 药品仓储机械臂 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: JSON 文件 (key-value，支持嵌套对象按 "." 展平)
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    values: BTreeMap<String, String>,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建空配置（全部使用默认值）
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// 从 JSON 配置文件加载
    ///
    /// # 参数
    /// - path: 配置文件路径
    ///
    /// # 说明
    /// 顶层必须是对象；嵌套对象展平为 `a.b` 形式的键，标量统一转为字符串
    pub fn new(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut manager = Self::from_json_str(&raw)?;
        manager.source = Some(path.to_path_buf());

        tracing::info!(
            path = %path.display(),
            keys = manager.values.len(),
            "配置文件加载完成"
        );
        Ok(manager)
    }

    /// 从 JSON 文本构建
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let object = match value {
            Value::Object(map) => map,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "<root>".to_string(),
                    value: other.to_string(),
                    reason: "配置文件顶层必须是 JSON 对象".to_string(),
                })
            }
        };

        let mut values = BTreeMap::new();
        flatten_into(&mut values, None, &object);

        Ok(Self {
            values,
            source: None,
        })
    }

    /// 从键值对构建（测试与嵌入场景）
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            source: None,
        }
    }

    /// 读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.as_str())
    }

    /// 读取配置值，带默认值
    pub fn get_config_or_default(&self, key: &str, default: &str) -> String {
        self.get_config_value(key)
            .map(|v| v.to_string())
            .unwrap_or_else(|| default.to_string())
    }

    /// 读取并解析配置值；缺失时使用默认值，解析失败返回 InvalidValue
    pub fn get_parsed<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_config_value(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// 写入配置值
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// 按前缀列出配置（键已去掉前缀）
    pub fn entries_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.values
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(move |(k, v)| (&k[prefix.len()..], v.as_str()))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 启动时记录生效配置
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string(&json!(self.values))?)
    }

    /// 保存到文件（展平形式）
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let body = serde_json::to_string_pretty(&json!(self.values))?;
        std::fs::write(path, body).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// 配置来源文件
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: Option<&str>, object: &Map<String, Value>) {
    for (key, value) in object {
        let full_key = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key.clone(),
        };

        match value {
            Value::Object(nested) => flatten_into(out, Some(&full_key), nested),
            Value::String(s) => {
                out.insert(full_key, s.clone());
            }
            Value::Null => {}
            other => {
                out.insert(full_key, other.to_string());
            }
        }
    }
}

/// 默认配置文件路径
///
/// 优先使用用户配置目录，取不到时回退到当前目录
pub fn get_default_config_path() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join("warehouse-arm").join("config.json"),
        None => PathBuf::from("./warehouse-arm.json"),
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 运动插值
    pub const BLEND_FACTOR: &str = "motion.blend_factor";
    pub const TOLERANCE: &str = "motion.tolerance";

    // 仓库布局
    pub const TRAVEL_HEIGHT: &str = "layout.travel_height";
    pub const PICK_HEIGHT: &str = "layout.pick_height";
    pub const DROP_HEIGHT: &str = "layout.drop_height";
    pub const HOME: &str = "layout.home";
    pub const ORDER_TRAY: &str = "layout.order_tray";
    pub const DUMP_TRAY: &str = "layout.dump_tray";
    pub const CONTAINER_ORIGIN: &str = "layout.container_origin";
    pub const CONTAINER_SPACING: &str = "layout.container_spacing";
    pub const CONTAINER_OVERRIDE_PREFIX: &str = "layout.container."; // + 货箱标签

    // 实时同步
    pub const SYNC_ENABLED: &str = "sync.enabled";
    pub const ACK_POLICY: &str = "sync.ack_policy";
    pub const SETTLE_DELAY_MS: &str = "sync.settle_delay_ms";

    // 运行循环
    pub const FRAME_INTERVAL_MS: &str = "sim.frame_interval_ms";
    pub const MAX_FRAMES: &str = "sim.max_frames";
}
