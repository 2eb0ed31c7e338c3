// ==========================================
// 药品仓储机械臂 - 仿真配置
// ==========================================
// 职责: 从 ConfigManager 解析并校验强类型配置
// ==========================================

use crate::config::config_manager::{config_keys, ConfigManager};
use crate::config::error::{ConfigError, ConfigResult};
use crate::config::layout::WarehouseLayout;
use crate::domain::types::{AckPolicy, Vec3};
use std::time::Duration;

pub const DEFAULT_BLEND_FACTOR: f64 = 0.1;
pub const DEFAULT_TOLERANCE: f64 = 0.01;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1500;
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;
pub const DEFAULT_MAX_FRAMES: u64 = 100_000;

// ==========================================
// MotionTuning - 插值参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionTuning {
    /// 每帧向目标靠拢的比例 (0,1)
    pub blend_factor: f64,
    /// 单轴完成容差
    pub tolerance: f64,
}

impl Default for MotionTuning {
    fn default() -> Self {
        Self {
            blend_factor: DEFAULT_BLEND_FACTOR,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

// ==========================================
// SimulationConfig - 仿真总配置
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub tuning: MotionTuning,
    pub layout: WarehouseLayout,
    /// 同步模式初始值（等待机器人确认）
    pub sync_enabled: bool,
    pub ack_policy: AckPolicy,
    /// 跳过订单行后的固定等待
    pub settle_delay: Duration,
    pub frame_interval: Duration,
    pub max_frames: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tuning: MotionTuning::default(),
            layout: WarehouseLayout::default(),
            sync_enabled: true,
            ack_policy: AckPolicy::default(),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            frame_interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

impl SimulationConfig {
    /// 从配置管理器解析
    ///
    /// # 校验
    /// - blend_factor ∈ (0,1)
    /// - tolerance > 0
    /// - travel_height 高于 pick_height / drop_height
    /// - container_spacing > 0，frame_interval > 0
    pub fn from_manager(manager: &ConfigManager) -> ConfigResult<Self> {
        let defaults = Self::default();
        let base = &defaults.layout;

        let tuning = MotionTuning {
            blend_factor: manager.get_parsed(config_keys::BLEND_FACTOR, DEFAULT_BLEND_FACTOR)?,
            tolerance: manager.get_parsed(config_keys::TOLERANCE, DEFAULT_TOLERANCE)?,
        };

        let mut layout = WarehouseLayout {
            home: manager.get_parsed(config_keys::HOME, base.home)?,
            order_tray: manager.get_parsed(config_keys::ORDER_TRAY, base.order_tray)?,
            dump_tray: manager.get_parsed(config_keys::DUMP_TRAY, base.dump_tray)?,
            container_origin: manager
                .get_parsed(config_keys::CONTAINER_ORIGIN, base.container_origin)?,
            container_spacing: manager
                .get_parsed(config_keys::CONTAINER_SPACING, base.container_spacing)?,
            travel_height: manager.get_parsed(config_keys::TRAVEL_HEIGHT, base.travel_height)?,
            pick_height: manager.get_parsed(config_keys::PICK_HEIGHT, base.pick_height)?,
            drop_height: manager.get_parsed(config_keys::DROP_HEIGHT, base.drop_height)?,
            overrides: Default::default(),
        };

        for (label, raw) in manager.entries_with_prefix(config_keys::CONTAINER_OVERRIDE_PREFIX) {
            let position: Vec3 = raw.parse().map_err(|reason| ConfigError::InvalidValue {
                key: format!("{}{}", config_keys::CONTAINER_OVERRIDE_PREFIX, label),
                value: raw.to_string(),
                reason,
            })?;
            layout.overrides.insert(label.to_string(), position);
        }

        let config = Self {
            tuning,
            layout,
            sync_enabled: manager.get_parsed(config_keys::SYNC_ENABLED, defaults.sync_enabled)?,
            ack_policy: manager.get_parsed(config_keys::ACK_POLICY, defaults.ack_policy)?,
            settle_delay: Duration::from_millis(
                manager.get_parsed(config_keys::SETTLE_DELAY_MS, DEFAULT_SETTLE_DELAY_MS)?,
            ),
            frame_interval: Duration::from_millis(
                manager.get_parsed(config_keys::FRAME_INTERVAL_MS, DEFAULT_FRAME_INTERVAL_MS)?,
            ),
            max_frames: manager.get_parsed(config_keys::MAX_FRAMES, DEFAULT_MAX_FRAMES)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// 配置一致性校验
    pub fn validate(&self) -> ConfigResult<()> {
        let b = self.tuning.blend_factor;
        if !(b > 0.0 && b < 1.0) {
            return Err(invalid(config_keys::BLEND_FACTOR, b, "必须在 (0, 1) 区间内"));
        }

        let tol = self.tuning.tolerance;
        if !(tol > 0.0 && tol.is_finite()) {
            return Err(invalid(config_keys::TOLERANCE, tol, "必须为正数"));
        }

        let layout = &self.layout;
        if layout.travel_height <= layout.pick_height {
            return Err(invalid(
                config_keys::TRAVEL_HEIGHT,
                layout.travel_height,
                "行进高度必须高于取货高度",
            ));
        }
        if layout.travel_height <= layout.drop_height {
            return Err(invalid(
                config_keys::TRAVEL_HEIGHT,
                layout.travel_height,
                "行进高度必须高于释放高度",
            ));
        }
        if !(layout.container_spacing > 0.0) {
            return Err(invalid(
                config_keys::CONTAINER_SPACING,
                layout.container_spacing,
                "货箱间距必须为正数",
            ));
        }
        if self.frame_interval.is_zero() {
            return Err(invalid(config_keys::FRAME_INTERVAL_MS, 0, "帧间隔不能为 0"));
        }

        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_manager() {
        let config = SimulationConfig::from_manager(&ConfigManager::in_memory()).unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let manager = ConfigManager::from_pairs([
            (config_keys::BLEND_FACTOR, "0.25"),
            (config_keys::ACK_POLICY, "any_phase"),
            (config_keys::SYNC_ENABLED, "false"),
            (config_keys::SETTLE_DELAY_MS, "10"),
            ("layout.container.Z9", "1,0,1"),
        ]);

        let config = SimulationConfig::from_manager(&manager).unwrap();
        assert_eq!(config.tuning.blend_factor, 0.25);
        assert_eq!(config.ack_policy, AckPolicy::AnyPhase);
        assert!(!config.sync_enabled);
        assert_eq!(config.settle_delay, Duration::from_millis(10));
        assert_eq!(
            config.layout.container_position("Z9"),
            Some(Vec3::new(1.0, 0.0, 1.0))
        );
    }

    #[test]
    fn test_invalid_blend_factor_rejected() {
        let manager = ConfigManager::from_pairs([(config_keys::BLEND_FACTOR, "1.0")]);
        let err = SimulationConfig::from_manager(&manager).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == config_keys::BLEND_FACTOR));
    }

    #[test]
    fn test_travel_height_must_clear_pick_height() {
        let manager = ConfigManager::from_pairs([
            (config_keys::TRAVEL_HEIGHT, "0.5"),
            (config_keys::PICK_HEIGHT, "0.6"),
        ]);
        assert!(SimulationConfig::from_manager(&manager).is_err());
    }
}
