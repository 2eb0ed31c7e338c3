// ==========================================
// 药品仓储机械臂 - 库存快照 CSV 解析
// ==========================================
// 用途: 离线模式下从 CSV 构建库存快照（代替库存查询接口）
// 表头: id,name,brand,container,available_quantity,total_units,used_quantity
//       （大小写/下划线不敏感，支持 box / containerLabel 等别名）
// ==========================================

use crate::domain::medicine::Medicine;
use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

// ==========================================
// 标准字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Id,
    Name,
    Brand,
    Container,
    Available,
    Total,
    Used,
}

impl Field {
    fn label(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Name => "name",
            Field::Brand => "brand",
            Field::Container => "container",
            Field::Available => "available_quantity",
            Field::Total => "total_units",
            Field::Used => "used_quantity",
        }
    }

    /// 表头归一化后匹配
    fn from_header(header: &str) -> Option<Self> {
        let key: String = header
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "id" | "medicineid" => Some(Field::Id),
            "name" | "medicinename" => Some(Field::Name),
            "brand" => Some(Field::Brand),
            "container" | "containerlabel" | "box" | "boxlabel" => Some(Field::Container),
            "available" | "availablequantity" | "quantity" => Some(Field::Available),
            "total" | "totalunits" => Some(Field::Total),
            "used" | "usedquantity" => Some(Field::Used),
            _ => None,
        }
    }
}

// ==========================================
// InventoryCsvParser
// ==========================================
pub struct InventoryCsvParser;

impl InventoryCsvParser {
    /// 解析 CSV 文件
    pub fn parse(&self, file_path: &Path) -> ImportResult<Vec<Medicine>> {
        // 检查文件存在
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        // 检查扩展名
        if let Some(ext) = file_path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let file = File::open(file_path)?;
        let medicines = self.parse_reader(file)?;

        tracing::info!(
            path = %file_path.display(),
            medicines = medicines.len(),
            "库存 CSV 解析完成"
        );
        Ok(medicines)
    }

    /// 从任意输入流解析
    pub fn parse_reader<R: Read>(&self, input: R) -> ImportResult<Vec<Medicine>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(input);

        // 读取表头，未知列忽略
        let columns: HashMap<Field, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .filter_map(|(idx, h)| Field::from_header(h).map(|f| (f, idx)))
            .collect();

        let mut medicines = Vec::new();
        for (row_idx, result) in reader.records().enumerate() {
            let record = result?;
            let row = row_idx + 2; // 第 1 行为表头

            // 跳过完全空白的行
            if record.iter().all(|v| v.trim().is_empty()) {
                continue;
            }

            let cell = |field: Field| -> Option<&str> {
                columns
                    .get(&field)
                    .and_then(|idx| record.get(*idx))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
            };

            let required = |field: Field| -> ImportResult<String> {
                cell(field)
                    .map(str::to_string)
                    .ok_or_else(|| ImportError::FieldMissing {
                        row,
                        field: field.label().to_string(),
                    })
            };

            let number = |field: Field| -> ImportResult<Option<u32>> {
                match cell(field) {
                    None => Ok(None),
                    Some(raw) => raw.parse::<u32>().map(Some).map_err(|_| {
                        ImportError::TypeConversionError {
                            row,
                            field: field.label().to_string(),
                            value: raw.to_string(),
                        }
                    }),
                }
            };

            let total_units = number(Field::Total)?;
            let used_quantity = number(Field::Used)?.unwrap_or(0);
            let available_quantity = match (number(Field::Available)?, total_units) {
                (Some(v), _) => v,
                (None, Some(total)) => total.saturating_sub(used_quantity),
                (None, None) => {
                    return Err(ImportError::FieldMissing {
                        row,
                        field: Field::Available.label().to_string(),
                    })
                }
            };

            medicines.push(Medicine {
                id: required(Field::Id)?,
                name: required(Field::Name)?,
                brand: cell(Field::Brand).unwrap_or_default().to_string(),
                container_label: required(Field::Container)?,
                total_units: total_units.unwrap_or(available_quantity + used_quantity),
                available_quantity,
                used_quantity,
            });
        }

        Ok(medicines)
    }
}
