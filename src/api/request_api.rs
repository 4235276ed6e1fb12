// ==========================================
// 工程物资调拨审批系统 - 申请 API
// ==========================================
// 职责: 调拨申请的提交、列表查询、详情查询
// 红线: 提交时单价从物资目录快照,后续调价不影响已提交申请
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::allocation::{AllocationLineItem, AllocationRequest, NewRequestItem};
use crate::domain::types::{ItemStatus, RequestStatus};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::allocation_repo::{AllocationItemRepository, AllocationRequestRepository};
use crate::repository::product_repo::ProductRepository;

// ==========================================
// RequestSummary - 申请列表行
// ==========================================
/// 用于前端列表展示的申请摘要（整单 + 明细合计）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSummary {
    pub request_id: String,
    pub project_name: String,
    pub requested_by: String,
    pub status: String,
    pub item_count: usize,
    pub requested_qty: i64,
    pub approved_qty: i64,
    pub pending_qty: i64,
    pub created_at: NaiveDateTime,
}

// ==========================================
// RequestDetail - 申请详情
// ==========================================
/// 整单 + 全部明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDetail {
    pub request: AllocationRequest,
    pub items: Vec<AllocationLineItem>,
}

// ==========================================
// RequestApi - 申请 API
// ==========================================

/// 申请API
///
/// 职责：
/// 1. 提交调拨申请（校验明细、快照单价）
/// 2. 申请列表/详情查询
/// 3. ActionLog记录
pub struct RequestApi {
    request_repo: Arc<AllocationRequestRepository>,
    item_repo: Arc<AllocationItemRepository>,
    product_repo: Arc<ProductRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl RequestApi {
    /// 创建新的RequestApi实例
    ///
    /// # 参数
    /// - request_repo: 申请仓储
    /// - item_repo: 明细仓储
    /// - product_repo: 物资目录仓储
    /// - action_log_repo: 操作日志仓储
    pub fn new(
        request_repo: Arc<AllocationRequestRepository>,
        item_repo: Arc<AllocationItemRepository>,
        product_repo: Arc<ProductRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            request_repo,
            item_repo,
            product_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 提交接口
    // ==========================================

    /// 提交调拨申请
    ///
    /// 校验规则：
    /// - 项目名称、申请人不能为空
    /// - 至少一条明细，且每条数量 > 0
    /// - 每条明细引用的物资必须存在于目录
    ///
    /// 单价在提交时从物资目录快照到明细上。
    ///
    /// # 参数
    /// - project_name: 申请项目/工地名称
    /// - requested_by: 申请人
    /// - items: 明细输入（物资ID + 数量）
    ///
    /// # 返回
    /// - Ok(String): 新申请ID
    /// - Err(ApiError): 校验失败或存储错误
    pub fn submit_request(
        &self,
        project_name: &str,
        requested_by: &str,
        items: Vec<NewRequestItem>,
    ) -> ApiResult<String> {
        // 参数验证
        let project_name = project_name.trim();
        if project_name.is_empty() {
            return Err(ApiError::InvalidInput("项目名称不能为空".to_string()));
        }
        let requested_by = requested_by.trim();
        if requested_by.is_empty() {
            return Err(ApiError::InvalidInput("申请人不能为空".to_string()));
        }
        if items.is_empty() {
            return Err(ApiError::InvalidInput(
                "申请必须至少包含一条明细".to_string(),
            ));
        }

        let now = chrono::Utc::now().naive_utc();
        let request_id = Uuid::new_v4().to_string();

        // 逐条校验并从物资目录快照单价
        let mut line_items = Vec::with_capacity(items.len());
        for input in &items {
            if input.quantity <= 0 {
                return Err(ApiError::InvalidInput(format!(
                    "物资{}的申请数量必须大于0",
                    input.product_id
                )));
            }

            let product = self
                .product_repo
                .find_by_id(&input.product_id)?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("物资(id={})不存在", input.product_id))
                })?;

            line_items.push(AllocationLineItem {
                item_id: Uuid::new_v4().to_string(),
                request_id: request_id.clone(),
                product_id: product.product_id,
                requested_qty: input.quantity,
                approved_qty: 0,
                pending_qty: input.quantity,
                unit_price: product.unit_price,
                status: ItemStatus::Pending,
                note: None,
                created_at: now,
                updated_at: now,
            });
        }

        let request = AllocationRequest {
            request_id: request_id.clone(),
            project_name: project_name.to_string(),
            requested_by: requested_by.to_string(),
            status: RequestStatus::Pending,
            manager_notes: None,
            decided_by: None,
            decided_at: None,
            created_at: now,
            revision: 0,
        };

        self.request_repo.create_with_items(&request, &line_items)?;

        // 记录ActionLog
        let total_qty: i64 = line_items.iter().map(|i| i.requested_qty).sum();
        let action_log = ActionLog::new(
            Uuid::new_v4().to_string(),
            Some(request_id.clone()),
            ActionType::SubmitRequest,
            requested_by.to_string(),
        )
        .with_payload(&serde_json::json!({
            "project_name": project_name,
            "item_count": line_items.len(),
            "total_qty": total_qty,
        }))
        .with_detail(format!(
            "提交调拨申请: 项目{}, {}条明细, 合计{}件",
            project_name,
            line_items.len(),
            total_qty
        ));

        // 尝试记录ActionLog，失败时只记录警告（不影响主要操作）
        if let Err(e) = self.action_log_repo.insert(&action_log) {
            warn!(error = %e, "记录操作日志失败");
        }

        info!(
            "调拨申请已提交: request_id={}, 明细{}条, 合计{}件",
            request_id,
            line_items.len(),
            total_qty
        );

        Ok(request_id)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询全部申请（创建时间倒序）
    ///
    /// # 返回
    /// - Ok(Vec<RequestSummary>): 申请摘要列表（含明细合计）
    /// - Err(ApiError): API错误
    pub fn list_requests(&self) -> ApiResult<Vec<RequestSummary>> {
        let requests = self.request_repo.list_all()?;
        self.to_summaries(requests)
    }

    /// 按状态查询申请（创建时间正序，即审批队列顺序）
    ///
    /// # 参数
    /// - status: 申请状态字符串（PENDING / PARTIALLY_APPROVED / APPROVED / REJECTED）
    pub fn list_requests_by_status(&self, status: &str) -> ApiResult<Vec<RequestSummary>> {
        let parsed = RequestStatus::from_str(status)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知的申请状态: {}", status)))?;

        let requests = self.request_repo.list_by_status(parsed)?;
        self.to_summaries(requests)
    }

    /// 查询申请详情（整单 + 全部明细）
    ///
    /// # 参数
    /// - request_id: 申请ID
    ///
    /// # 返回
    /// - Ok(Some(RequestDetail)): 申请详情
    /// - Ok(None): 申请不存在
    /// - Err(ApiError): API错误
    pub fn get_request_detail(&self, request_id: &str) -> ApiResult<Option<RequestDetail>> {
        if request_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("申请ID不能为空".to_string()));
        }

        let Some(request) = self.request_repo.find_by_id(request_id)? else {
            return Ok(None);
        };
        let items = self.item_repo.find_by_request(request_id)?;

        Ok(Some(RequestDetail { request, items }))
    }

    /// 组装申请摘要（整单字段 + 明细数量合计）
    fn to_summaries(&self, requests: Vec<AllocationRequest>) -> ApiResult<Vec<RequestSummary>> {
        let mut result = Vec::with_capacity(requests.len());
        for request in requests {
            let items = self.item_repo.find_by_request(&request.request_id)?;
            let requested_qty: i64 = items.iter().map(|i| i.requested_qty).sum();
            let approved_qty: i64 = items.iter().map(|i| i.approved_qty).sum();
            let pending_qty: i64 = items.iter().map(|i| i.pending_qty).sum();

            result.push(RequestSummary {
                request_id: request.request_id,
                project_name: request.project_name,
                requested_by: request.requested_by,
                status: request.status.to_string(),
                item_count: items.len(),
                requested_qty,
                approved_qty,
                pending_qty,
                created_at: request.created_at,
            });
        }
        Ok(result)
    }
}
