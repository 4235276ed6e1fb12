// ==========================================
// 物资调拨审批系统 - 导入层
// ==========================================
// 职责: 外部物资目录导入,生成目录与库存数据
// 支持: CSV
// ==========================================

// 模块声明
pub mod catalog_importer;
pub mod error;
pub mod file_parser;

// 重导出核心类型
pub use catalog_importer::{CatalogImporter, ImportSummary, RowError};
pub use error::{ImportError, ImportResult};
pub use file_parser::CsvParser;
