// ==========================================
// 药品仓储机械臂 - 领域类型定义
// ==========================================
// 职责: 阶段枚举、三维坐标、确认策略等基础类型
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 机械臂阶段 (Phase)
// ==========================================
// 红线: 同一时刻只有一个活动阶段（单臂、单订单行在途）
// 序列化格式: camelCase (与实时通道载荷一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,       // 空闲
    MoveToPick, // 移动到取货点
    Lift,       // 抓取并提升（扫码校验）
    MoveToDrop, // 移动到投放托盘上方
    Drop,       // 下降并释放
    Return,     // 回程（派发下一行或归位）
}

impl Phase {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::MoveToPick => "moveToPick",
            Phase::Lift => "lift",
            Phase::MoveToDrop => "moveToDrop",
            Phase::Drop => "drop",
            Phase::Return => "return",
        }
    }

    /// 是否为归位类阶段
    pub fn is_homing(&self) -> bool {
        matches!(self, Phase::Idle | Phase::Return)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 坐标轴 (Axis)
// ==========================================
// y 为竖直方向，x/z 为水平面
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

// ==========================================
// 三维坐标 (Vec3)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 读取指定轴分量
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// 写入指定轴分量
    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
    }

    /// 替换高度分量
    pub fn with_y(self, y: f64) -> Self {
        Self { y, ..self }
    }

    pub fn distance_to(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

impl FromStr for Vec3 {
    type Err = String;

    /// 解析 "x,y,z" 格式
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
        if parts.len() != 3 {
            return Err(format!("坐标需要 3 个分量，实际 {} 个", parts.len()));
        }

        let mut values = [0.0_f64; 3];
        for (slot, raw) in values.iter_mut().zip(parts.iter()) {
            *slot = raw
                .parse::<f64>()
                .map_err(|e| format!("坐标分量 '{}' 无法解析: {}", raw, e))?;
            if !slot.is_finite() {
                return Err(format!("坐标分量 '{}' 不是有限值", raw));
            }
        }

        Ok(Vec3::new(values[0], values[1], values[2]))
    }
}

// ==========================================
// 完成确认策略 (Ack Policy)
// ==========================================
// 实时通道回传 movement_complete 时是否核对回显阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckPolicy {
    AnyPhase, // 任意回显阶段均视为确认
    #[default]
    MatchingPhase, // 回显阶段必须等于当前阶段
}

impl fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckPolicy::AnyPhase => write!(f, "ANY_PHASE"),
            AckPolicy::MatchingPhase => write!(f, "MATCHING_PHASE"),
        }
    }
}

impl FromStr for AckPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ANY_PHASE" => Ok(AckPolicy::AnyPhase),
            "MATCHING_PHASE" => Ok(AckPolicy::MatchingPhase),
            other => Err(format!("未知的确认策略: {}", other)),
        }
    }
}

// ==========================================
// 投放结果 (Outcome)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Delivered, // 校验通过，投放订单托盘
    Dumped,    // 校验失败，投放废弃托盘
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Delivered => write!(f, "DELIVERED"),
            Outcome::Dumped => write!(f, "DUMPED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_serializes_camel_case() {
        let json = serde_json::to_string(&Phase::MoveToPick).unwrap();
        assert_eq!(json, "\"moveToPick\"");

        let parsed: Phase = serde_json::from_str("\"return\"").unwrap();
        assert_eq!(parsed, Phase::Return);
        assert_eq!(Phase::MoveToDrop.to_string(), "moveToDrop");
    }

    #[test]
    fn test_vec3_from_str() {
        let v: Vec3 = " 1.5, -2 ,3".parse().unwrap();
        assert_eq!(v, Vec3::new(1.5, -2.0, 3.0));

        assert!("1,2".parse::<Vec3>().is_err());
        assert!("1,x,3".parse::<Vec3>().is_err());
        assert!("1,NaN,3".parse::<Vec3>().is_err());
    }

    #[test]
    fn test_vec3_axis_access() {
        let mut v = Vec3::ZERO;
        v.set(Axis::Z, 4.0);
        assert_eq!(v.get(Axis::Z), 4.0);
        assert_eq!(v.with_y(2.0), Vec3::new(0.0, 2.0, 4.0));
        assert_eq!(Vec3::new(3.0, 0.0, 4.0).distance_to(&Vec3::ZERO), 5.0);
    }

    #[test]
    fn test_ack_policy_parse() {
        assert_eq!("any_phase".parse::<AckPolicy>().unwrap(), AckPolicy::AnyPhase);
        assert_eq!(
            "MATCHING_PHASE".parse::<AckPolicy>().unwrap(),
            AckPolicy::MatchingPhase
        );
        assert!("sometimes".parse::<AckPolicy>().is_err());
    }
}
