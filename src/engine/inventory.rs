// ==========================================
// 药品仓储机械臂 - 货箱库存表
// ==========================================
// 职责: 由库存快照构建货箱分组；取货候选查找；出库扣减
// 红线: 同一快照无论输入顺序如何，分组结果完全一致
// 红线: 数量检查与对应扣减之间不插入其他订单行的检查（单线程串行保证）
// ==========================================

use crate::domain::medicine::{Container, Medicine, MedicineStock};
use std::collections::BTreeMap;
use std::fmt;

/// 取货失败原因（订单行将被跳过）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickIssue {
    /// 货箱不存在（标签无效或库存中无此货箱）
    UnknownContainer { label: String },
    /// 货箱已空
    EmptyContainer { label: String },
    /// 货箱内没有名称、品牌均一致且有余量的药品
    NoMatch {
        label: String,
        medicine_name: String,
        brand: String,
    },
}

impl fmt::Display for PickIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickIssue::UnknownContainer { label } => write!(f, "货箱 {} 不存在", label),
            PickIssue::EmptyContainer { label } => write!(f, "货箱 {} 已空", label),
            PickIssue::NoMatch {
                label,
                medicine_name,
                brand,
            } => write!(f, "货箱 {} 中没有可用的 {}/{}", label, medicine_name, brand),
        }
    }
}

// ==========================================
// ContainerMap - 货箱标签 → 货箱
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerMap {
    containers: BTreeMap<String, Container>,
}

impl ContainerMap {
    /// 由库存快照构建
    ///
    /// # 规则
    /// - 按货箱标签分组，货箱按标签排序
    /// - 货箱内按 (名称, 品牌, id) 排序，保证与输入顺序无关
    /// - 同一货箱内重复 id 的记录数量相加
    /// - 可用数量为 0 的记录不入表
    pub fn from_snapshot(medicines: &[Medicine]) -> Self {
        let mut grouped: BTreeMap<String, BTreeMap<(String, String, String), MedicineStock>> =
            BTreeMap::new();

        for medicine in medicines.iter().filter(|m| m.available_quantity > 0) {
            let stocks = grouped
                .entry(medicine.container_label.clone())
                .or_default();
            let key = (
                medicine.name.clone(),
                medicine.brand.clone(),
                medicine.id.clone(),
            );
            stocks
                .entry(key)
                .and_modify(|s| s.quantity = s.quantity.saturating_add(medicine.available_quantity))
                .or_insert_with(|| MedicineStock::from(medicine));
        }

        let containers = grouped
            .into_iter()
            .map(|(label, stocks)| {
                let container = Container {
                    label: label.clone(),
                    stocks: stocks.into_values().collect(),
                };
                (label, container)
            })
            .collect();

        Self { containers }
    }

    pub fn get(&self, label: &str) -> Option<&Container> {
        self.containers.get(label)
    }

    /// 查找取货候选：货箱内第一个名称、品牌均一致且有余量的药品
    pub fn find_candidate(
        &self,
        label: &str,
        medicine_name: &str,
        brand: &str,
    ) -> Result<MedicineStock, PickIssue> {
        let container = self
            .containers
            .get(label)
            .ok_or_else(|| PickIssue::UnknownContainer {
                label: label.to_string(),
            })?;

        if container.is_empty() {
            return Err(PickIssue::EmptyContainer {
                label: label.to_string(),
            });
        }

        container
            .first_available(medicine_name, brand)
            .cloned()
            .ok_or_else(|| PickIssue::NoMatch {
                label: label.to_string(),
                medicine_name: medicine_name.to_string(),
                brand: brand.to_string(),
            })
    }

    /// 扣减一个单位
    ///
    /// # 返回
    /// - Some(remaining): 剩余数量（为 0 时条目已移除）
    /// - None: 货箱或药品不存在
    pub fn decrement(&mut self, label: &str, medicine_id: &str) -> Option<u32> {
        self.containers.get_mut(label)?.take_one(medicine_id)
    }

    /// 指定药品（名称+品牌）在全部货箱的总量
    pub fn quantity_of(&self, name: &str, brand: &str) -> u32 {
        self.containers
            .values()
            .map(|c| c.quantity_of(name, brand))
            .sum()
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.containers.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn total_units(&self) -> u32 {
        self.containers.values().map(|c| c.total_units()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn medicine(id: &str, name: &str, brand: &str, label: &str, qty: u32) -> Medicine {
        Medicine {
            id: id.to_string(),
            name: name.to_string(),
            brand: brand.to_string(),
            container_label: label.to_string(),
            total_units: qty,
            available_quantity: qty,
            used_quantity: 0,
        }
    }

    #[test]
    fn test_grouping_is_order_independent() {
        let snapshot = vec![
            medicine("3", "Ibuprofen", "Z", "B2", 4),
            medicine("1", "Paracetamol", "X", "A1", 2),
            medicine("2", "Aspirin", "Y", "A1", 1),
            medicine("4", "Empty", "E", "C1", 0),
        ];
        let mut reversed = snapshot.clone();
        reversed.reverse();

        let a = ContainerMap::from_snapshot(&snapshot);
        let b = ContainerMap::from_snapshot(&reversed);
        assert_eq!(a, b);
        assert_eq!(a.labels().collect::<Vec<_>>(), vec!["A1", "B2"]);
        assert_eq!(a.get("A1").unwrap().stocks[0].name, "Aspirin");
        assert_eq!(a.total_units(), 7);
    }

    #[test]
    fn test_duplicate_ids_are_merged() {
        let map = ContainerMap::from_snapshot(&[
            medicine("1", "Paracetamol", "X", "A1", 2),
            medicine("1", "Paracetamol", "X", "A1", 3),
        ]);
        assert_eq!(map.quantity_of("Paracetamol", "X"), 5);
        assert_eq!(map.get("A1").unwrap().stocks.len(), 1);
    }

    #[test]
    fn test_find_candidate_issues() {
        let mut map = ContainerMap::from_snapshot(&[medicine("1", "Paracetamol", "X", "A1", 1)]);

        assert!(matches!(
            map.find_candidate("Q7", "Paracetamol", "X"),
            Err(PickIssue::UnknownContainer { .. })
        ));
        assert!(matches!(
            map.find_candidate("A1", "Aspirin", "X"),
            Err(PickIssue::NoMatch { .. })
        ));
        assert_eq!(
            map.find_candidate("A1", "Paracetamol", "Z"),
            Err(PickIssue::NoMatch {
                label: "A1".to_string(),
                medicine_name: "Paracetamol".to_string(),
                brand: "Z".to_string(),
            })
        );
        assert_eq!(map.quantity_of("Paracetamol", "X"), 1);

        let stock = map.find_candidate("A1", "Paracetamol", "X").unwrap();
        assert_eq!(map.decrement("A1", &stock.medicine_id), Some(0));
        assert!(matches!(
            map.find_candidate("A1", "Paracetamol", "X"),
            Err(PickIssue::EmptyContainer { .. })
        ));
        assert_eq!(map.decrement("A1", "1"), None);
    }

    #[test]
    fn test_find_candidate_picks_matching_brand_in_mixed_container() {
        let map = ContainerMap::from_snapshot(&[
            medicine("1", "Paracetamol", "X", "A1", 1),
            medicine("2", "Paracetamol", "Y", "A1", 1),
        ]);

        let stock = map.find_candidate("A1", "Paracetamol", "Y").unwrap();
        assert_eq!(stock.medicine_id, "2");
        assert_eq!(stock.brand, "Y");

        let stock = map.find_candidate("A1", "Paracetamol", "X").unwrap();
        assert_eq!(stock.medicine_id, "1");
    }
}
