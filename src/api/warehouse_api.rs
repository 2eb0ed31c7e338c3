// ==========================================
// 药品仓储机械臂 - 仓储服务接口
// ==========================================
// 职责: 定义外部 REST 仓储服务的消费契约，并在边界处校验/归一化响应
// 说明: 传输实现不在本 crate 范围内，实现者只需返回原始 JSON 对应的结构
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::medicine::Medicine;
use crate::domain::order::{OrderItem, OrderRecord, OrderRecordItem, ProcessedOrder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

// ==========================================
// WarehouseApi Trait
// ==========================================
// 实现者: InMemoryWarehouseApi（演示/测试），或外部 HTTP 客户端
#[async_trait]
pub trait WarehouseApi: Send + Sync {
    /// 查询全部药品库存
    async fn fetch_medicines(&self) -> ApiResult<Vec<Medicine>>;

    /// 将订单标记为已处理，并返回按单位展开所需的明细
    async fn process_order(&self, order_id: &str) -> ApiResult<ProcessedOrder>;

    /// 历史订单列表（仅展示）
    async fn list_orders(&self) -> ApiResult<Vec<OrderRecord>>;
}

// ==========================================
// 原始响应结构（字段均可缺失，校验后转为领域类型）
// ==========================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMedicine {
    #[serde(alias = "_id", alias = "medicineId")]
    id: Option<Value>,
    name: Option<String>,
    brand: Option<String>,
    #[serde(alias = "box", alias = "boxLabel", alias = "container")]
    container_label: Option<String>,
    total_units: Option<i64>,
    available_quantity: Option<i64>,
    used_quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrderItem {
    #[serde(alias = "name")]
    medicine_name: Option<String>,
    brand: Option<String>,
    #[serde(alias = "box", alias = "boxLabel", alias = "container")]
    container_label: Option<String>,
    #[serde(alias = "id")]
    order_item_id: Option<Value>,
    quantity: Option<i64>,
    scan_codes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProcessedOrder {
    #[serde(alias = "id")]
    order_id: Option<Value>,
    processed_at: Option<DateTime<Utc>>,
    items: Option<Vec<RawOrderItem>>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrderRecord {
    #[serde(alias = "id")]
    order_id: Option<Value>,
    user_email: Option<String>,
    user: Option<RawUser>,
    created_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    items: Vec<RawOrderItem>,
}

// ==========================================
// 归一化函数
// ==========================================

/// 解析库存查询响应
///
/// # 接受的形状
/// - `[ {...}, ... ]`
/// - `{ "medicines": [...] }` 或 `{ "data": [...] }`
///
/// # 规则
/// - id 可为字符串或数字，统一为字符串
/// - availableQuantity 缺失时按 totalUnits - usedQuantity 推导
/// - 名称、货箱标签缺失或数量为负 → Malformed
pub fn parse_medicines(payload: &Value) -> ApiResult<Vec<Medicine>> {
    let list = unwrap_list(payload, &["medicines", "data"])
        .ok_or_else(|| ApiError::Malformed("库存响应不是数组".to_string()))?;

    list.iter()
        .enumerate()
        .map(|(idx, raw)| {
            let raw: RawMedicine = serde_json::from_value(raw.clone())
                .map_err(|e| ApiError::Malformed(format!("库存记录 #{}: {}", idx, e)))?;
            normalize_medicine(idx, raw)
        })
        .collect()
}

fn normalize_medicine(idx: usize, raw: RawMedicine) -> ApiResult<Medicine> {
    let id = raw
        .id
        .as_ref()
        .and_then(id_to_string)
        .ok_or_else(|| ApiError::Malformed(format!("库存记录 #{}: 缺少 id", idx)))?;
    let name = required_text(raw.name, || format!("库存记录 {}: 缺少 name", id))?;
    let container_label =
        required_text(raw.container_label, || format!("库存记录 {}: 缺少货箱标签", id))?;

    let total_units = non_negative(raw.total_units.unwrap_or(0), "totalUnits", &id)?;
    let used_quantity = non_negative(raw.used_quantity.unwrap_or(0), "usedQuantity", &id)?;
    let available_quantity = match raw.available_quantity {
        Some(v) => non_negative(v, "availableQuantity", &id)?,
        None => total_units.saturating_sub(used_quantity),
    };

    Ok(Medicine {
        id,
        name,
        brand: raw.brand.map(|b| b.trim().to_string()).unwrap_or_default(),
        container_label,
        total_units,
        available_quantity,
        used_quantity,
    })
}

/// 解析订单处理响应
///
/// # 接受的形状
/// - `{ "orderId": ..., "processedAt": ..., "items": [...] }`
/// - `{ "order": { ... } }`
///
/// # 规则
/// - items 缺失 → Malformed（不得部分入队）
/// - scanCodes 长度必须等于 quantity
pub fn parse_processed_order(payload: &Value) -> ApiResult<ProcessedOrder> {
    let body = payload.get("order").unwrap_or(payload);
    let raw: RawProcessedOrder = serde_json::from_value(body.clone())?;

    let order_id = raw
        .order_id
        .as_ref()
        .and_then(id_to_string)
        .ok_or_else(|| ApiError::Malformed("订单响应缺少 orderId".to_string()))?;
    let raw_items = raw
        .items
        .ok_or_else(|| ApiError::Malformed(format!("订单 {} 响应缺少 items", order_id)))?;

    let items = raw_items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| normalize_order_item(&order_id, idx, item))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(ProcessedOrder {
        order_id,
        processed_at: raw.processed_at.unwrap_or_else(Utc::now),
        items,
    })
}

fn normalize_order_item(order_id: &str, idx: usize, raw: RawOrderItem) -> ApiResult<OrderItem> {
    let context = format!("订单 {} 明细 #{}", order_id, idx);

    let medicine_name = required_text(raw.medicine_name, || format!("{}: 缺少 medicineName", context))?;
    let container_label =
        required_text(raw.container_label, || format!("{}: 缺少货箱标签", context))?;
    let order_item_id = raw
        .order_item_id
        .as_ref()
        .and_then(id_to_string)
        .ok_or_else(|| ApiError::Malformed(format!("{}: 缺少 orderItemId", context)))?;
    let quantity = non_negative(raw.quantity.unwrap_or(0), "quantity", &context)?;
    let scan_codes = raw.scan_codes.unwrap_or_default();

    if scan_codes.len() != quantity as usize {
        return Err(ApiError::Malformed(format!(
            "{}: scanCodes 数量 {} 与 quantity {} 不一致",
            context,
            scan_codes.len(),
            quantity
        )));
    }

    Ok(OrderItem {
        medicine_name,
        brand: raw.brand.map(|b| b.trim().to_string()).unwrap_or_default(),
        container_label,
        order_item_id,
        quantity,
        scan_codes,
    })
}

/// 解析历史订单列表（展示用，校验从宽：明细缺字段时跳过该明细）
pub fn parse_order_records(payload: &Value) -> ApiResult<Vec<OrderRecord>> {
    let list = unwrap_list(payload, &["orders", "data"])
        .ok_or_else(|| ApiError::Malformed("订单列表响应不是数组".to_string()))?;

    let mut records = Vec::with_capacity(list.len());
    for (idx, raw) in list.iter().enumerate() {
        let raw: RawOrderRecord = serde_json::from_value(raw.clone())
            .map_err(|e| ApiError::Malformed(format!("订单记录 #{}: {}", idx, e)))?;
        let order_id = raw
            .order_id
            .as_ref()
            .and_then(id_to_string)
            .ok_or_else(|| ApiError::Malformed(format!("订单记录 #{}: 缺少 orderId", idx)))?;

        let items = raw
            .items
            .into_iter()
            .filter_map(|item| {
                Some(OrderRecordItem {
                    medicine_name: item.medicine_name?,
                    brand: item.brand.unwrap_or_default(),
                    container_label: item.container_label.unwrap_or_default(),
                    quantity: u32::try_from(item.quantity.unwrap_or(0)).ok()?,
                })
            })
            .collect();

        records.push(OrderRecord {
            order_id,
            user_email: raw.user_email.or(raw.user.and_then(|u| u.email)),
            created_at: raw.created_at,
            processed_at: raw.processed_at,
            items,
        });
    }

    Ok(records)
}

// ==========================================
// 辅助函数
// ==========================================

fn unwrap_list<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    if let Some(list) = payload.as_array() {
        return Some(list);
    }
    keys.iter().find_map(|k| payload.get(*k).and_then(Value::as_array))
}

/// 字符串或数字 id → 字符串
pub(crate) fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_text(value: Option<String>, message: impl FnOnce() -> String) -> ApiResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::Malformed(message())),
    }
}

fn non_negative(value: i64, field: &str, context: &str) -> ApiResult<u32> {
    u32::try_from(value).map_err(|_| {
        ApiError::Malformed(format!("{}: 字段 {} 取值 {} 超出范围", context, field, value))
    })
}
