// ==========================================
// 药品仓储机械臂 - 送达/丢弃台账
// ==========================================
// 红线: 只追加，不修改；仅用于界面统计
// ==========================================

use crate::domain::order::OrderLine;
use crate::domain::types::Outcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 台账条目：一个已释放的物理单位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub order_id: String,
    pub order_item_id: String,
    pub scan_code: String,
    pub container_label: String,
    pub medicine_id: String,
    pub name: String,  // 实际抓取的药品名称
    pub brand: String, // 实际抓取的药品品牌
    pub outcome: Outcome,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        line: &OrderLine,
        medicine_id: &str,
        name: &str,
        brand: &str,
        outcome: Outcome,
    ) -> Self {
        Self {
            order_id: line.order_id.clone(),
            order_item_id: line.order_item_id.clone(),
            scan_code: line.scan_code.clone(),
            container_label: line.container_label.clone(),
            medicine_id: medicine_id.to_string(),
            name: name.to_string(),
            brand: brand.to_string(),
            outcome,
            recorded_at: Utc::now(),
        }
    }
}

/// 送达台账 + 丢弃台账
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ledgers {
    delivered: Vec<LedgerEntry>,
    dumped: Vec<LedgerEntry>,
}

impl Ledgers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按结果追加
    pub fn record(&mut self, entry: LedgerEntry) {
        match entry.outcome {
            Outcome::Delivered => self.delivered.push(entry),
            Outcome::Dumped => self.dumped.push(entry),
        }
    }

    pub fn delivered(&self) -> &[LedgerEntry] {
        &self.delivered
    }

    pub fn dumped(&self) -> &[LedgerEntry] {
        &self.dumped
    }

    pub fn total(&self) -> usize {
        self.delivered.len() + self.dumped.len()
    }

    /// 指定药品（实际抓取的名称+品牌）已出库的单位数
    pub fn units_taken(&self, name: &str, brand: &str) -> usize {
        self.delivered
            .iter()
            .chain(self.dumped.iter())
            .filter(|e| e.name == name && e.brand == brand)
            .count()
    }

    pub fn clear(&mut self) {
        self.delivered.clear();
        self.dumped.clear();
    }
}
