// ==========================================
// 工程物资调拨审批系统 - 文件解析器实现
// ==========================================
// 支持: CSV (.csv)
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 解析 CSV 文件为原始记录（表头 → 值）
    ///
    /// # 参数
    /// - file_path: CSV 文件路径
    ///
    /// # 返回
    /// - Ok(Vec<HashMap<String, String>>): 每行一个"表头→值"映射（值已去除首尾空白）
    /// - Err(ImportError): 文件不存在、格式不支持或解析失败
    pub fn parse_to_raw_records(
        &self,
        file_path: &Path,
    ) -> ImportResult<Vec<HashMap<String, String>>> {
        let path = file_path;

        // 检查文件存在
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        // 检查扩展名
        if let Some(ext) = path.extension() {
            if ext != "csv" {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        // 打开 CSV 文件
        let file = File::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        // 读取表头
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        // 读取所有行
        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row_map = HashMap::new();

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    row_map.insert(header.clone(), value.trim().to_string());
                }
            }

            // 跳过完全空白的行
            if row_map.values().all(|v| v.is_empty()) {
                continue;
            }

            records.push(row_map);
        }

        Ok(records)
    }
}
