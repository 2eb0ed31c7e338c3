// ==========================================
// 药品仓储机械臂 - 订单领域模型
// ==========================================
// 用途: 订单处理响应、订单行队列、历史订单列表
// 红线: 每个订单行只代表一个物理单位（入队时按数量展开）
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// ==========================================
// OrderItem - 订单明细（处理响应中的一项）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub medicine_name: String,
    pub brand: String,
    pub container_label: String,
    pub order_item_id: String,
    pub quantity: u32,
    pub scan_codes: Vec<String>, // 长度 == quantity
}

// ==========================================
// ProcessedOrder - 已标记处理的订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedOrder {
    pub order_id: String,
    pub processed_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl ProcessedOrder {
    /// 按数量展开为订单行（每个扫码一行，保持明细顺序）
    pub fn fan_out(&self) -> Vec<OrderLine> {
        self.items
            .iter()
            .flat_map(|item| {
                item.scan_codes.iter().map(move |code| OrderLine {
                    order_id: self.order_id.clone(),
                    container_label: item.container_label.clone(),
                    medicine_name: item.medicine_name.clone(),
                    brand: item.brand.clone(),
                    order_item_id: item.order_item_id.clone(),
                    scan_code: code.clone(),
                })
            })
            .collect()
    }

    pub fn total_units(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// ==========================================
// OrderLine - 订单行（一个物理单位）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub order_id: String,
    pub container_label: String,
    pub medicine_name: String,
    pub brand: String,
    pub order_item_id: String,
    pub scan_code: String,
}

// ==========================================
// OrderQueue - 待处理订单行队列 (FIFO)
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct OrderQueue {
    lines: VecDeque<OrderLine>,
}

impl OrderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, line: OrderLine) {
        self.lines.push_back(line);
    }

    pub fn extend(&mut self, lines: impl IntoIterator<Item = OrderLine>) {
        self.lines.extend(lines);
    }

    /// 弹出队首（派发给机械臂时调用）
    pub fn pop_front(&mut self) -> Option<OrderLine> {
        self.lines.pop_front()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

// ==========================================
// OrderRecord - 历史订单（仅用于展示）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: String,
    pub user_email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderRecordItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecordItem {
    pub medicine_name: String,
    pub brand: String,
    pub container_label: String,
    pub quantity: u32,
}
