// ==========================================
// 药品仓储机械臂 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(#[from] csv::Error),

    // ===== 数据映射错误 =====
    #[error("字段缺失 (行 {row}): {field}")]
    FieldMissing { row: usize, field: String },

    #[error("类型转换失败 (行 {row}, 字段 {field}): {value}")]
    TypeConversionError {
        row: usize,
        field: String,
        value: String,
    },
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
