// ==========================================
// 工程物资调拨审批系统 - 库存 API
// ==========================================
// 职责: 物资目录查询、低库存告警、入库补货
// 红线: 库存只在审批扣减与补货两处变动,补货必须记录ActionLog
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::product::ProductWithStock;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::product_repo::ProductRepository;

// ==========================================
// CatalogItemView - 目录列表行
// ==========================================
/// 用于前端目录展示的物资完整信息（主数据 + 库存 + 告警标记）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItemView {
    pub product_id: String,
    pub product_name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub unit_price: f64,
    pub available_qty: i64,
    pub low_stock: bool,
}

impl CatalogItemView {
    fn from_product(p: ProductWithStock, threshold: i64) -> Self {
        let low_stock = p.is_low_stock(threshold);
        Self {
            product_id: p.product.product_id,
            product_name: p.product.product_name,
            category: p.product.category,
            unit: p.product.unit,
            unit_price: p.product.unit_price,
            available_qty: p.available_qty,
            low_stock,
        }
    }
}

// ==========================================
// StockApi - 库存 API
// ==========================================

/// 库存API
///
/// 职责：
/// 1. 物资目录查询（主数据 + 库存）
/// 2. 低库存告警（阈值来自配置）
/// 3. 入库补货
/// 4. ActionLog记录
pub struct StockApi {
    product_repo: Arc<ProductRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
}

impl StockApi {
    /// 创建新的StockApi实例
    ///
    /// # 参数
    /// - product_repo: 物资目录仓储
    /// - action_log_repo: 操作日志仓储
    /// - config_manager: 配置管理器（低库存阈值）
    pub fn new(
        product_repo: Arc<ProductRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            product_repo,
            action_log_repo,
            config_manager,
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询物资目录（主数据 + 库存，按物资ID排序）
    ///
    /// # 返回
    /// - Ok(Vec<CatalogItemView>): 目录列表（含低库存标记）
    /// - Err(ApiError): API错误
    pub fn list_catalog(&self) -> ApiResult<Vec<CatalogItemView>> {
        let threshold = self.low_stock_threshold()?;
        let products = self.product_repo.list_with_stock()?;

        Ok(products
            .into_iter()
            .map(|p| CatalogItemView::from_product(p, threshold))
            .collect())
    }

    /// 查询单个物资（主数据 + 库存）
    ///
    /// # 参数
    /// - product_id: 物资ID
    ///
    /// # 返回
    /// - Ok(Some(CatalogItemView)): 物资信息
    /// - Ok(None): 物资不存在
    /// - Err(ApiError): API错误
    pub fn get_product(&self, product_id: &str) -> ApiResult<Option<CatalogItemView>> {
        if product_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("物资ID不能为空".to_string()));
        }

        let threshold = self.low_stock_threshold()?;
        Ok(self
            .product_repo
            .find_with_stock(product_id)?
            .map(|p| CatalogItemView::from_product(p, threshold)))
    }

    /// 查询低库存物资（库存升序，最紧缺的排最前）
    ///
    /// 阈值来自配置 low_stock_threshold。
    ///
    /// # 返回
    /// - Ok(Vec<CatalogItemView>): 低库存物资列表
    /// - Err(ApiError): API错误
    pub fn list_low_stock(&self) -> ApiResult<Vec<CatalogItemView>> {
        let threshold = self.low_stock_threshold()?;
        let products = self.product_repo.find_low_stock(threshold)?;

        Ok(products
            .into_iter()
            .map(|p| CatalogItemView::from_product(p, threshold))
            .collect())
    }

    // ==========================================
    // 补货接口
    // ==========================================

    /// 入库补货
    ///
    /// # 参数
    /// - product_id: 物资ID
    /// - qty: 补货数量（必须 > 0）
    /// - operator: 操作人
    ///
    /// # 返回
    /// - Ok(i64): 补货后的可用库存
    /// - Err(ApiError): 校验失败、物资不存在或存储错误
    pub fn restock(&self, product_id: &str, qty: i64, operator: &str) -> ApiResult<i64> {
        // 参数验证
        if product_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("物资ID不能为空".to_string()));
        }
        if qty <= 0 {
            return Err(ApiError::InvalidInput("补货数量必须大于0".to_string()));
        }
        let operator = operator.trim();
        if operator.is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }

        let new_qty = self.product_repo.restock(product_id, qty)?;

        // 记录ActionLog
        let action_log = ActionLog::new(
            Uuid::new_v4().to_string(),
            None,
            ActionType::Restock,
            operator.to_string(),
        )
        .with_payload(&serde_json::json!({
            "product_id": product_id,
            "qty": qty,
            "new_qty": new_qty,
        }))
        .with_detail(format!("补货: 物资{}入库{}件, 现有{}件", product_id, qty, new_qty));

        // 尝试记录ActionLog，失败时只记录警告（不影响主要操作）
        if let Err(e) = self.action_log_repo.insert(&action_log) {
            warn!(error = %e, "记录操作日志失败");
        }

        info!(
            "补货完成: product_id={}, 入库{}件, 现有{}件",
            product_id, qty, new_qty
        );

        Ok(new_qty)
    }

    /// 读取低库存阈值配置
    fn low_stock_threshold(&self) -> ApiResult<i64> {
        self.config_manager
            .get_low_stock_threshold()
            .map_err(|e| ApiError::InternalError(e.to_string()))
    }
}
