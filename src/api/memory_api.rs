// ==========================================
// 药品仓储机械臂 - 内存版仓储服务
// ==========================================
// 用途: 演示程序与测试中替代外部 REST 服务
// 说明: 内部保存原始 JSON 载荷，经与真实响应相同的归一化路径返回
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::warehouse_api::{
    id_to_string, parse_medicines, parse_order_records, parse_processed_order, WarehouseApi,
};
use crate::domain::medicine::Medicine;
use crate::domain::order::{OrderRecord, ProcessedOrder};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// 新建订单时的明细描述
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemSpec {
    pub medicine_name: String,
    pub brand: String,
    pub container_label: String,
    pub quantity: u32,
}

impl OrderItemSpec {
    pub fn new(medicine_name: &str, brand: &str, container_label: &str, quantity: u32) -> Self {
        Self {
            medicine_name: medicine_name.to_string(),
            brand: brand.to_string(),
            container_label: container_label.to_string(),
            quantity,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredOrder {
    payload: Value,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    inventory: Value,
    orders: BTreeMap<String, StoredOrder>,
    offline: bool,
}

// ==========================================
// InMemoryWarehouseApi
// ==========================================
#[derive(Debug)]
pub struct InMemoryWarehouseApi {
    inner: Mutex<Inner>,
    latency: Duration,
}

impl Default for InMemoryWarehouseApi {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWarehouseApi {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                inventory: Value::Array(Vec::new()),
                ..Default::default()
            }),
            latency: Duration::ZERO,
        }
    }

    /// 以药品列表作为库存快照
    pub fn with_medicines(medicines: &[Medicine]) -> ApiResult<Self> {
        let api = Self::new();
        api.set_inventory_payload(serde_json::to_value(medicines)?)?;
        Ok(api)
    }

    /// 模拟响应延迟
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 直接替换库存原始载荷（用于模拟异常响应）
    pub fn set_inventory_payload(&self, payload: Value) -> ApiResult<()> {
        self.lock()?.inventory = payload;
        Ok(())
    }

    /// 模拟服务不可达
    pub fn set_offline(&self, offline: bool) -> ApiResult<()> {
        self.lock()?.offline = offline;
        Ok(())
    }

    /// 新建待处理订单
    pub fn add_order(
        &self,
        order_id: &str,
        user_email: Option<&str>,
        items: &[OrderItemSpec],
    ) -> ApiResult<()> {
        let payload = json!({
            "orderId": order_id,
            "userEmail": user_email,
            "items": items,
        });
        self.insert_raw_order(order_id, payload)
    }

    /// 以原始载荷登记订单（字段可不完整）
    pub fn insert_raw_order(&self, order_id: &str, payload: Value) -> ApiResult<()> {
        let mut inner = self.lock()?;
        inner.orders.insert(
            order_id.trim().to_string(),
            StoredOrder {
                payload,
                created_at: Utc::now(),
                processed_at: None,
            },
        );
        Ok(())
    }

    /// 从 JSON 文件登记订单
    ///
    /// 文件为数组，每项至少包含 orderId（或 id）与 items
    pub fn load_orders_json(&self, path: impl AsRef<Path>) -> ApiResult<usize> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("读取订单文件失败: {}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)?;
        let list = value
            .as_array()
            .ok_or_else(|| ApiError::Malformed("订单文件顶层必须是数组".to_string()))?;

        for (idx, order) in list.iter().enumerate() {
            let order_id = order
                .get("orderId")
                .or_else(|| order.get("id"))
                .and_then(id_to_string)
                .ok_or_else(|| ApiError::Malformed(format!("订单文件第 {} 项缺少 orderId", idx)))?;
            self.insert_raw_order(&order_id, order.clone())?;
        }

        tracing::info!(path = %path.display(), orders = list.len(), "订单文件加载完成");
        Ok(list.len())
    }

    pub fn is_processed(&self, order_id: &str) -> bool {
        self.lock()
            .map(|inner| {
                inner
                    .orders
                    .get(order_id)
                    .map(|o| o.processed_at.is_some())
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn lock(&self) -> ApiResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| ApiError::Other(anyhow::anyhow!("锁获取失败: {}", e)))
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

/// 补全缺失的 orderItemId 与 scanCodes（真实服务在标记处理时生成）
fn complete_items(order_id: &str, payload: &mut Value) {
    let Some(items) = payload.get_mut("items").and_then(Value::as_array_mut) else {
        return;
    };

    for (idx, item) in items.iter_mut().enumerate() {
        let Some(obj) = item.as_object_mut() else {
            continue;
        };

        if !obj.contains_key("orderItemId") && !obj.contains_key("id") {
            obj.insert(
                "orderItemId".to_string(),
                Value::String(format!("{}-{}", order_id, idx + 1)),
            );
        }

        if !obj.contains_key("scanCodes") {
            if let Some(quantity) = obj.get("quantity").and_then(Value::as_u64) {
                let codes: Vec<Value> = (0..quantity)
                    .map(|_| Value::String(Uuid::new_v4().to_string()))
                    .collect();
                obj.insert("scanCodes".to_string(), Value::Array(codes));
            }
        }
    }
}

#[async_trait]
impl WarehouseApi for InMemoryWarehouseApi {
    async fn fetch_medicines(&self) -> ApiResult<Vec<Medicine>> {
        self.simulate_latency().await;

        let payload = {
            let inner = self.lock()?;
            if inner.offline {
                return Err(ApiError::Transport("仓储服务不可达".to_string()));
            }
            inner.inventory.clone()
        };

        parse_medicines(&payload)
    }

    async fn process_order(&self, order_id: &str) -> ApiResult<ProcessedOrder> {
        self.simulate_latency().await;

        let order_id = order_id.trim();
        let payload = {
            let mut inner = self.lock()?;
            if inner.offline {
                return Err(ApiError::Transport("仓储服务不可达".to_string()));
            }

            let stored = inner
                .orders
                .get_mut(order_id)
                .ok_or_else(|| ApiError::NotFound(order_id.to_string()))?;
            if stored.processed_at.is_some() {
                return Err(ApiError::AlreadyProcessed(order_id.to_string()));
            }

            let processed_at = Utc::now();
            stored.processed_at = Some(processed_at);

            let mut payload = stored.payload.clone();
            complete_items(order_id, &mut payload);
            if let Some(obj) = payload.as_object_mut() {
                obj.remove("id");
                obj.insert("orderId".to_string(), Value::String(order_id.to_string()));
                obj.insert("processedAt".to_string(), json!(processed_at));
            }
            payload
        };

        parse_processed_order(&payload)
    }

    async fn list_orders(&self) -> ApiResult<Vec<OrderRecord>> {
        self.simulate_latency().await;

        let payload = {
            let inner = self.lock()?;
            if inner.offline {
                return Err(ApiError::Transport("仓储服务不可达".to_string()));
            }

            let records: Vec<Value> = inner
                .orders
                .iter()
                .map(|(order_id, stored)| {
                    json!({
                        "orderId": order_id,
                        "userEmail": stored.payload.get("userEmail").cloned().unwrap_or(Value::Null),
                        "user": stored.payload.get("user").cloned().unwrap_or(Value::Null),
                        "createdAt": stored.created_at,
                        "processedAt": stored.processed_at,
                        "items": stored.payload.get("items").cloned().unwrap_or_else(|| json!([])),
                    })
                })
                .collect();
            Value::Array(records)
        };

        parse_order_records(&payload)
    }
}
