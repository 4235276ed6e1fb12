// ==========================================
// 工程物资调拨审批系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
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
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 数据映射错误 =====
    #[error("字段映射失败 (行 {row}): {message}")]
    FieldMappingError { row: usize, message: String },

    #[error("类型转换失败 (行 {row}, 字段 {field}): {message}")]
    TypeConversionError {
        row: usize,
        field: String,
        message: String,
    },

    // ===== 数据质量错误 =====
    #[error("主键缺失 (行 {0}): product_id 为空")]
    PrimaryKeyMissing(usize),

    // ===== 数据库错误 =====
    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::DatabaseQueryError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<RepositoryError>
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DatabaseConnectionError(msg) | RepositoryError::LockError(msg) => {
                ImportError::DatabaseConnectionError(msg)
            }
            other => ImportError::DatabaseQueryError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
