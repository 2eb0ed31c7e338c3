// ==========================================
// 药品仓储机械臂 - 仓库布局
// ==========================================
// 职责: 货箱标签 → 坐标映射，托盘/归位点/高度常量
// 规则: 标签 = 行字母 + 列序号（"A1" 为网格原点，字母沿 z 轴，数字沿 x 轴）
// ==========================================

use crate::domain::types::{Outcome, Vec3};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct WarehouseLayout {
    pub home: Vec3,
    pub order_tray: Vec3,
    pub dump_tray: Vec3,
    pub container_origin: Vec3,
    pub container_spacing: f64,
    pub travel_height: f64,
    pub pick_height: f64,
    pub drop_height: f64,
    /// 单个货箱的显式坐标（优先于网格计算）
    pub overrides: HashMap<String, Vec3>,
}

impl Default for WarehouseLayout {
    fn default() -> Self {
        Self {
            home: Vec3::new(0.0, 3.0, 0.0),
            order_tray: Vec3::new(5.0, 0.0, 0.0),
            dump_tray: Vec3::new(5.0, 0.0, 3.0),
            container_origin: Vec3::new(-3.0, 0.0, -3.0),
            container_spacing: 1.5,
            travel_height: 3.0,
            pick_height: 0.6,
            drop_height: 0.8,
            overrides: HashMap::new(),
        }
    }
}

impl WarehouseLayout {
    /// 货箱所在位置（水平面坐标，y 取原点高度）
    ///
    /// # 返回
    /// - None: 标签无法解析且没有显式坐标
    pub fn container_position(&self, label: &str) -> Option<Vec3> {
        let label = label.trim();
        if let Some(pos) = self.overrides.get(label) {
            return Some(*pos);
        }
        if let Some(pos) = self.overrides.get(&label.to_ascii_uppercase()) {
            return Some(*pos);
        }

        let (row, col) = parse_grid_label(label)?;
        Some(Vec3::new(
            self.container_origin.x + f64::from(col) * self.container_spacing,
            self.container_origin.y,
            self.container_origin.z + f64::from(row) * self.container_spacing,
        ))
    }

    /// 取货点（货箱上方取货高度）
    pub fn pick_point(&self, label: &str) -> Option<Vec3> {
        self.container_position(label)
            .map(|p| p.with_y(self.pick_height))
    }

    /// 按投放结果选择托盘
    pub fn tray(&self, outcome: Outcome) -> Vec3 {
        match outcome {
            Outcome::Delivered => self.order_tray,
            Outcome::Dumped => self.dump_tray,
        }
    }

    /// 释放点（托盘上方释放高度）
    pub fn drop_point(&self, outcome: Outcome) -> Vec3 {
        self.tray(outcome).with_y(self.drop_height)
    }

    /// 同一水平位置的行进高度点
    pub fn above(&self, point: Vec3) -> Vec3 {
        point.with_y(self.travel_height)
    }
}

/// 解析网格标签，返回 (行, 列)，均从 0 开始
///
/// "A1" → (0, 0)，"B3" → (1, 2)，"AA2" → (26, 1)
pub fn parse_grid_label(label: &str) -> Option<(u32, u32)> {
    let label = label.trim().to_ascii_uppercase();
    let split = label.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = label.split_at(split);

    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut row: u32 = 0;
    for c in letters.chars() {
        row = row.checked_mul(26)?.checked_add(c as u32 - 'A' as u32 + 1)?;
    }
    let col: u32 = digits.parse().ok()?;
    if col == 0 {
        return None;
    }

    Some((row - 1, col - 1))
}
