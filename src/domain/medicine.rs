// ==========================================
// 药品仓储机械臂 - 药品与货箱领域模型
// ==========================================
// 用途: 库存服务快照的只读缓存，按货箱分组
// 说明: 字段固定，原始响应在 api 层完成校验与归一化
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// Medicine - 药品记录
// ==========================================
// 归属: 外部库存服务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medicine {
    pub id: String,              // 药品唯一标识
    pub name: String,            // 药品名称
    pub brand: String,           // 品牌
    pub container_label: String, // 所在货箱标签（如 "A1"）
    pub total_units: u32,        // 总数量
    pub available_quantity: u32, // 可用数量
    pub used_quantity: u32,      // 已用数量
}

// ==========================================
// MedicineStock - 货箱内的一叠药品
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineStock {
    pub medicine_id: String,
    pub name: String,
    pub brand: String,
    pub quantity: u32,
}

impl MedicineStock {
    /// 名称与品牌是否完全一致
    pub fn is_same_product(&self, name: &str, brand: &str) -> bool {
        self.name == name && self.brand == brand
    }
}

impl From<&Medicine> for MedicineStock {
    fn from(medicine: &Medicine) -> Self {
        Self {
            medicine_id: medicine.id.clone(),
            name: medicine.name.clone(),
            brand: medicine.brand.clone(),
            quantity: medicine.available_quantity,
        }
    }
}

// ==========================================
// Container - 货箱
// ==========================================
// 红线: 数量归零的条目立即移除
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub label: String,
    pub stocks: Vec<MedicineStock>,
}

impl Container {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stocks: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.iter().all(|s| s.quantity == 0)
    }

    /// 按插入顺序查找第一个名称、品牌均一致且有余量的药品
    pub fn first_available(&self, name: &str, brand: &str) -> Option<&MedicineStock> {
        self.stocks
            .iter()
            .find(|s| s.is_same_product(name, brand) && s.quantity > 0)
    }

    /// 扣减一个单位，返回剩余数量
    ///
    /// # 返回
    /// - Some(remaining): 扣减成功
    /// - None: 货箱内不存在该药品
    pub fn take_one(&mut self, medicine_id: &str) -> Option<u32> {
        let index = self
            .stocks
            .iter()
            .position(|s| s.medicine_id == medicine_id && s.quantity > 0)?;

        let stock = &mut self.stocks[index];
        stock.quantity -= 1;
        let remaining = stock.quantity;

        if remaining == 0 {
            self.stocks.remove(index);
        }

        Some(remaining)
    }

    /// 指定药品（名称+品牌）在本货箱的数量
    pub fn quantity_of(&self, name: &str, brand: &str) -> u32 {
        self.stocks
            .iter()
            .filter(|s| s.is_same_product(name, brand))
            .map(|s| s.quantity)
            .sum()
    }

    pub fn total_units(&self) -> u32 {
        self.stocks.iter().map(|s| s.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(id: &str, name: &str, brand: &str, quantity: u32) -> MedicineStock {
        MedicineStock {
            medicine_id: id.to_string(),
            name: name.to_string(),
            brand: brand.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_take_one_removes_exhausted_stock() {
        let mut container = Container::new("A1");
        container.stocks.push(stock("m1", "Paracetamol", "X", 2));

        assert_eq!(container.take_one("m1"), Some(1));
        assert_eq!(container.take_one("m1"), Some(0));
        assert!(container.stocks.is_empty());
        assert!(container.is_empty());
        assert_eq!(container.take_one("m1"), None);
    }

    #[test]
    fn test_first_available_uses_insertion_order() {
        let mut container = Container::new("B2");
        container.stocks.push(stock("m1", "Ibuprofen", "Y", 0));
        container.stocks.push(stock("m2", "Ibuprofen", "Z", 3));
        container.stocks.push(stock("m3", "Ibuprofen", "Y", 5));

        let found = container.first_available("Ibuprofen", "Y").unwrap();
        assert_eq!(found.medicine_id, "m3");
        let found = container.first_available("Ibuprofen", "Z").unwrap();
        assert_eq!(found.medicine_id, "m2");
        assert_eq!(container.quantity_of("Ibuprofen", "Y"), 5);
        assert_eq!(container.total_units(), 8);
    }

    #[test]
    fn test_first_available_requires_same_brand() {
        let mut container = Container::new("A1");
        container.stocks.push(stock("m1", "Paracetamol", "X", 1));
        container.stocks.push(stock("m2", "Paracetamol", "Y", 1));

        assert_eq!(
            container.first_available("Paracetamol", "Y").map(|s| s.medicine_id.as_str()),
            Some("m2")
        );
        assert!(container.first_available("Paracetamol", "Z").is_none());
        assert!(container.first_available("paracetamol", "X").is_none());
    }
}
