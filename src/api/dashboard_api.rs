// ==========================================
// 工程物资调拨审批系统 - 驾驶舱 API
// ==========================================
// 职责: 审批队列聚合查询、低库存告警计数、操作日志查询
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::action_log::ActionLog;
use crate::domain::allocation::AllocationRequest;
use crate::domain::types::RequestStatus;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::allocation_repo::{AllocationItemRepository, AllocationRequestRepository};
use crate::repository::product_repo::ProductRepository;

// ==========================================
// ApprovalQueueSummary - 审批队列概况
// ==========================================
/// 驾驶舱首屏数字（按状态计数 + 未了结数量/金额 + 库存告警）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalQueueSummary {
    pub pending_count: i64,
    pub partially_approved_count: i64,
    pub approved_count: i64,
    pub rejected_count: i64,
    pub open_request_count: i64, // 待处理 = PENDING + PARTIALLY_APPROVED
    pub open_pending_qty: i64,   // 待处理申请的剩余待定数量合计
    pub open_approved_value: f64, // 待处理申请的累计已批金额合计
    pub product_count: i64,
    pub low_stock_count: usize,
}

// ==========================================
// DashboardApi - 驾驶舱 API
// ==========================================

/// 驾驶舱API
///
/// 职责：
/// 1. 审批队列聚合计数
/// 2. 待处理申请列表（审批队列顺序）
/// 3. 操作日志查询
pub struct DashboardApi {
    request_repo: Arc<AllocationRequestRepository>,
    item_repo: Arc<AllocationItemRepository>,
    product_repo: Arc<ProductRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
}

impl DashboardApi {
    /// 创建新的DashboardApi实例
    ///
    /// # 参数
    /// - request_repo: 申请仓储
    /// - item_repo: 明细仓储（未了结数量/金额汇总）
    /// - product_repo: 物资目录仓储
    /// - action_log_repo: 操作日志仓储
    /// - config_manager: 配置管理器（低库存阈值、日志条数）
    pub fn new(
        request_repo: Arc<AllocationRequestRepository>,
        item_repo: Arc<AllocationItemRepository>,
        product_repo: Arc<ProductRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            request_repo,
            item_repo,
            product_repo,
            action_log_repo,
            config_manager,
        }
    }

    // ==========================================
    // 聚合查询接口
    // ==========================================

    /// 查询审批队列概况
    ///
    /// # 返回
    /// - Ok(ApprovalQueueSummary): 各状态计数 + 未了结数量/金额 + 物资/低库存计数
    /// - Err(ApiError): API错误
    pub fn get_queue_summary(&self) -> ApiResult<ApprovalQueueSummary> {
        let pending_count = self.request_repo.count_by_status(RequestStatus::Pending)?;
        let partially_approved_count = self
            .request_repo
            .count_by_status(RequestStatus::PartiallyApproved)?;
        let approved_count = self.request_repo.count_by_status(RequestStatus::Approved)?;
        let rejected_count = self.request_repo.count_by_status(RequestStatus::Rejected)?;

        let (open_pending_qty, open_approved_value) = self.item_repo.sum_open_totals()?;

        let product_count = self.product_repo.count_all()?;

        let threshold = self
            .config_manager
            .get_low_stock_threshold()
            .map_err(|e| ApiError::InternalError(e.to_string()))?;
        let low_stock_count = self.product_repo.find_low_stock(threshold)?.len();

        Ok(ApprovalQueueSummary {
            pending_count,
            partially_approved_count,
            approved_count,
            rejected_count,
            open_request_count: pending_count + partially_approved_count,
            open_pending_qty,
            open_approved_value,
            product_count,
            low_stock_count,
        })
    }

    /// 查询待处理申请（审批队列顺序：先提交的先审）
    ///
    /// 包含 PENDING 与 PARTIALLY_APPROVED（待续批）两类。
    ///
    /// # 返回
    /// - Ok(Vec<AllocationRequest>): 待处理申请列表
    /// - Err(ApiError): API错误
    pub fn list_open_requests(&self) -> ApiResult<Vec<AllocationRequest>> {
        let mut open = self.request_repo.list_by_status(RequestStatus::Pending)?;
        let partial = self
            .request_repo
            .list_by_status(RequestStatus::PartiallyApproved)?;

        open.extend(partial);
        // 两类合并后仍按提交时间排队
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(open)
    }

    // ==========================================
    // 操作日志查询接口
    // ==========================================

    /// 查询最近操作
    ///
    /// # 参数
    /// - limit: 返回记录数上限（None 时取配置 recent_actions_limit）
    ///
    /// # 返回
    /// - Ok(Vec<ActionLog>): 操作日志列表（时间倒序）
    /// - Err(ApiError): API错误
    pub fn get_recent_actions(&self, limit: Option<i32>) -> ApiResult<Vec<ActionLog>> {
        let limit = match limit {
            Some(n) => n,
            None => self
                .config_manager
                .get_recent_actions_limit()
                .map_err(|e| ApiError::InternalError(e.to_string()))?,
        };

        if limit <= 0 || limit > 1000 {
            return Err(ApiError::InvalidInput("limit必须在1-1000之间".to_string()));
        }

        Ok(self.action_log_repo.find_recent(limit)?)
    }

    /// 查询某申请的完整操作轨迹（提交 → 历轮审批，时间正序）
    ///
    /// # 参数
    /// - request_id: 申请ID
    ///
    /// # 返回
    /// - Ok(Vec<ActionLog>): 操作日志列表
    /// - Err(ApiError): API错误
    pub fn list_actions_by_request(&self, request_id: &str) -> ApiResult<Vec<ActionLog>> {
        if request_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("申请ID不能为空".to_string()));
        }

        Ok(self.action_log_repo.find_by_request_id(request_id)?)
    }
}
