// ==========================================
// 物资目录导入器
// ==========================================
// 职责: 从 CSV 文件导入物资目录与初始库存
// 流程: 解析文件 → 字段映射与校验 → 逐行落库 → 记录操作日志
// ==========================================

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::product::Product;
use crate::i18n::t_with_args;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::CsvParser;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::product_repo::ProductRepository;

/// 单行导入失败记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    /// 数据行号 (表头后第一行为 1)
    pub row_number: usize,
    /// 物资ID (该行解析出来时携带,否则为 None)
    pub product_id: Option<String>,
    /// 失败原因
    pub message: String,
}

/// 导入结果汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub imported: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
    pub elapsed_ms: u64,
}

/// 物资目录导入器
///
/// 逐行导入: 单行失败只记入错误清单,不中断整批。
/// 同一 product_id 重复导入时覆盖目录字段与库存水位。
pub struct CatalogImporter {
    product_repo: Arc<ProductRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl CatalogImporter {
    pub fn new(
        product_repo: Arc<ProductRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            product_repo,
            action_log_repo,
        }
    }

    /// 从 CSV 文件导入物资目录
    ///
    /// 表头: product_id,product_name,category,unit,unit_price,available_qty
    ///
    /// # 参数
    /// - file_path: CSV 文件路径
    /// - operator: 操作人 (写入操作日志)
    ///
    /// # 返回
    /// - Ok(ImportSummary): 导入汇总 (含逐行失败清单)
    /// - Err(ImportError): 文件级错误 (文件不存在/格式不支持/解析失败)
    #[instrument(skip(self, file_path))]
    pub fn import_from_csv<P: AsRef<Path>>(
        &self,
        file_path: P,
        operator: &str,
    ) -> ImportResult<ImportSummary> {
        let start_time = Instant::now();
        let file_path = file_path.as_ref();
        let file_path_str = file_path.to_str().unwrap_or("unknown");

        if !file_path.exists() {
            error!(
                "{}",
                t_with_args("import.file_not_found", &[("path", file_path_str)])
            );
            return Err(ImportError::FileNotFound(file_path_str.to_string()));
        }

        info!(file_path = %file_path_str, "开始导入物资目录");

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let parser = CsvParser;
        let raw_rows = parser.parse_to_raw_records(file_path)?;
        let total_rows = raw_rows.len();
        info!(total_rows = total_rows, "文件解析完成");

        // === 步骤 2: 字段映射与校验 ===
        debug!("步骤 2: 字段映射与校验");
        let mut mapped = Vec::new();
        let mut errors = Vec::new();
        for (idx, row) in raw_rows.iter().enumerate() {
            let row_number = idx + 1;
            match self.map_row(row, row_number) {
                Ok(record) => mapped.push(record),
                Err(e) => {
                    warn!(row_number = row_number, error = %e, "字段映射失败");
                    errors.push(RowError {
                        row_number,
                        product_id: row
                            .get("product_id")
                            .map(|s| s.trim())
                            .filter(|s| !s.is_empty())
                            .map(|s| s.to_string()),
                        message: e.to_string(),
                    });
                }
            }
        }
        info!(
            success = mapped.len(),
            failed = errors.len(),
            "字段映射完成"
        );

        // === 步骤 3: 逐行写入目录与库存 ===
        debug!("步骤 3: 逐行写入目录与库存");
        let mut imported = 0usize;
        for (row_number, product, available_qty) in mapped {
            match self.product_repo.upsert_with_stock(&product, available_qty) {
                Ok(()) => imported += 1,
                Err(e) => {
                    warn!(
                        row_number = row_number,
                        product_id = %product.product_id,
                        error = %e,
                        "写入物资失败"
                    );
                    errors.push(RowError {
                        row_number,
                        product_id: Some(product.product_id.clone()),
                        message: format!("写入物资失败: {}", e),
                    });
                }
            }
        }

        errors.sort_by_key(|e| e.row_number);
        let failed = errors.len();
        let summary = ImportSummary {
            total_rows,
            imported,
            failed,
            errors,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        };

        // === 步骤 4: 记录操作日志 ===
        debug!("步骤 4: 记录操作日志");
        let detail = t_with_args(
            "import.completed",
            &[
                ("imported", &imported.to_string()),
                ("failed", &failed.to_string()),
            ],
        );
        let action_log = ActionLog::new(
            Uuid::new_v4().to_string(),
            None,
            ActionType::ImportCatalog,
            operator.to_string(),
        )
        .with_payload(&serde_json::json!({
            "file": file_path_str,
            "total_rows": total_rows,
            "imported": imported,
            "failed": failed,
        }))
        .with_detail(detail);
        if let Err(e) = self.action_log_repo.insert(&action_log) {
            warn!(error = %e, "记录操作日志失败");
        }

        info!(
            imported = imported,
            failed = failed,
            elapsed_ms = summary.elapsed_ms,
            "物资目录导入完成"
        );

        Ok(summary)
    }

    /// 单行映射: 原始字段 → (行号, Product, 初始库存)
    ///
    /// 必填: product_id, product_name, unit_price
    /// 可选: category, unit (空值落为 None), available_qty (空值落为 0)
    fn map_row(
        &self,
        row: &HashMap<String, String>,
        row_number: usize,
    ) -> ImportResult<(usize, Product, i64)> {
        let product_id = row
            .get("product_id")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or(ImportError::PrimaryKeyMissing(row_number))?
            .to_string();

        let product_name = row
            .get("product_name")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ImportError::FieldMappingError {
                row: row_number,
                message: "缺少必填字段 product_name".to_string(),
            })?
            .to_string();

        let unit_price_raw = row
            .get("unit_price")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ImportError::FieldMappingError {
                row: row_number,
                message: "缺少必填字段 unit_price".to_string(),
            })?;
        let unit_price: f64 =
            unit_price_raw
                .parse()
                .map_err(|_| ImportError::TypeConversionError {
                    row: row_number,
                    field: "unit_price".to_string(),
                    message: format!("无法解析为数值: {}", unit_price_raw),
                })?;
        if unit_price < 0.0 {
            return Err(ImportError::TypeConversionError {
                row: row_number,
                field: "unit_price".to_string(),
                message: "不能为负数".to_string(),
            });
        }

        let available_qty = match row.get("available_qty").map(|s| s.trim()) {
            None | Some("") => 0,
            Some(raw) => {
                let qty: i64 = raw.parse().map_err(|_| ImportError::TypeConversionError {
                    row: row_number,
                    field: "available_qty".to_string(),
                    message: format!("无法解析为整数: {}", raw),
                })?;
                if qty < 0 {
                    return Err(ImportError::TypeConversionError {
                        row: row_number,
                        field: "available_qty".to_string(),
                        message: "不能为负数".to_string(),
                    });
                }
                qty
            }
        };

        let category = row
            .get("category")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        let unit = row
            .get("unit")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        let now = Utc::now().naive_utc();
        let product = Product {
            product_id,
            product_name,
            category,
            unit,
            unit_price,
            created_at: now,
            updated_at: now,
        };

        Ok((row_number, product, available_qty))
    }
}
