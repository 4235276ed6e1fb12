// ==========================================
// 工程物资调拨审批系统 - 审批 API
// ==========================================
// 职责: 审批工作单装载、批准/驳回决定的一次性提交
// 红线: 决定落库走乐观锁,冲突时整体失败并向调用方透出
// 红线: 提交失败不留下任何部分写入
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::types::ItemStatus;
use crate::engine::approval_session::ApprovalSession;
use crate::engine::item_reconciler::ManagerEdit;
use crate::engine::request_aggregator::RequestStatistics;
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::allocation_repo::AllocationRequestRepository;
use crate::repository::product_repo::ProductRepository;

// ==========================================
// ItemEditInput - 明细编辑输入
// ==========================================
/// 一条明细上的待回放编辑。字段存在即视为一次编辑，
/// 按 数量 → 备注 → 状态 的顺序回放（状态在最后，显式状态优先）。
///
/// approved_qty 传原始文本：不可解析时该字段按无操作忽略，
/// 与工作单上的交互口径一致。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEditInput {
    pub item_id: String,
    pub approved_qty: Option<String>,
    pub status: Option<String>,
    pub note: Option<String>,
}

// ==========================================
// WorksheetItemView - 工作单明细行
// ==========================================
/// 用于前端审批工作单展示的明细行（台账数量 + 物资信息）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksheetItemView {
    pub item_id: String,
    pub product_id: String,
    pub product_name: String,
    pub requested_qty: i64,      // 本轮申请数量
    pub prior_approved_qty: i64, // 历轮累计已批数量
    pub available_qty: i64,      // 装载时可用库存
    pub approved_qty: i64,       // 本轮拟批数量（默认为最大可满足值）
    pub pending_qty: i64,        // 本轮待定数量
    pub unit_price: f64,
    pub status: String,
    pub note: Option<String>,
}

// ==========================================
// WorksheetView - 审批工作单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksheetView {
    pub request_id: String,
    pub project_name: String,
    pub requested_by: String,
    pub status: String,
    pub partial_round: bool, // 是否为部分批准后的续批轮
    pub request_revision: i32,
    pub items: Vec<WorksheetItemView>,
    pub stats: RequestStatistics,
}

// ==========================================
// DecisionOutcome - 决定结果
// ==========================================
/// 决定落库成功后返回给前端的摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub request_id: String,
    pub action: String,
    pub new_status: String,
    pub has_pending_items: bool,
    pub item_count: usize,   // 本轮工作集明细数
    pub approved_qty: i64,   // 本轮批准数量合计
    pub approved_value: f64, // 本轮批准金额合计
}

// ==========================================
// ApprovalApi - 审批 API
// ==========================================

/// 审批API
///
/// 职责：
/// 1. 装载审批工作单（整单 + 工作集明细 + 统计）
/// 2. 回放审批人编辑并提交批准/驳回决定
/// 3. 决定原子落库（乐观锁）
/// 4. ActionLog记录
pub struct ApprovalApi {
    request_repo: Arc<AllocationRequestRepository>,
    product_repo: Arc<ProductRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl ApprovalApi {
    /// 创建新的ApprovalApi实例
    ///
    /// # 参数
    /// - request_repo: 申请仓储（兼作会话快照源）
    /// - product_repo: 物资目录仓储（工作单展示物资名称）
    /// - action_log_repo: 操作日志仓储
    pub fn new(
        request_repo: Arc<AllocationRequestRepository>,
        product_repo: Arc<ProductRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            request_repo,
            product_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 工作单装载
    // ==========================================

    /// 装载审批工作单
    ///
    /// 开启一次审批会话并把初始工作集转换为展示用视图。
    /// 每行的拟批数量已按"最大可满足"预填（min(本轮申请, 可用库存)）。
    ///
    /// # 参数
    /// - request_id: 申请ID
    ///
    /// # 返回
    /// - Ok(WorksheetView): 工作单视图
    /// - Err(ApiError): 申请不存在、已终态或存储错误
    pub fn load_worksheet(&self, request_id: &str) -> ApiResult<WorksheetView> {
        if request_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("申请ID不能为空".to_string()));
        }

        let session = ApprovalSession::begin(self.request_repo.as_ref(), request_id)?;

        // 整单展示字段（会话只携带编号与修订号）
        let request = self
            .request_repo
            .find_by_id(request_id)?
            .ok_or_else(|| ApiError::NotFound(format!("申请(id={})不存在", request_id)))?;

        let items = self.to_item_views(&session)?;

        Ok(WorksheetView {
            request_id: session.request_id().to_string(),
            project_name: request.project_name,
            requested_by: request.requested_by,
            status: request.status.to_string(),
            partial_round: session.is_partial_round(),
            request_revision: session.request_revision(),
            items,
            stats: session.statistics().clone(),
        })
    }

    // ==========================================
    // 决定提交
    // ==========================================

    /// 提交批准决定（一次性：装载 → 回放编辑 → 提交 → 落库）
    ///
    /// 整单新状态由聚合器根据明细结果推导：
    /// 全部满足为 APPROVED，存在待定为 PARTIALLY_APPROVED。
    ///
    /// # 参数
    /// - request_id: 申请ID
    /// - edits: 明细编辑列表（可为空，表示按预填值直接批准）
    /// - decided_by: 审批人
    /// - manager_notes: 整单审批备注（可选）
    ///
    /// # 返回
    /// - Ok(DecisionOutcome): 决定摘要
    /// - Err(ApiError): 校验失败、乐观锁冲突或存储错误
    pub fn approve_request(
        &self,
        request_id: &str,
        edits: Vec<ItemEditInput>,
        decided_by: &str,
        manager_notes: Option<String>,
    ) -> ApiResult<DecisionOutcome> {
        let decided_by = decided_by.trim();
        if decided_by.is_empty() {
            return Err(ApiError::InvalidInput("审批人不能为空".to_string()));
        }

        let mut session = ApprovalSession::begin(self.request_repo.as_ref(), request_id)?;

        for input in &edits {
            for edit in expand_edits(input)? {
                session.apply_edit(&input.item_id, &edit)?;
            }
        }

        let payload = session.submit_approve(decided_by, manager_notes)?;
        self.request_repo.persist_decision(&payload)?;

        let stats = session.statistics();
        let outcome = DecisionOutcome {
            request_id: payload.request_id.clone(),
            action: payload.action.to_string(),
            new_status: payload.new_status.to_string(),
            has_pending_items: payload.has_pending_items,
            item_count: payload.items.len(),
            approved_qty: stats.approved_qty,
            approved_value: stats.approved_value,
        };

        // 记录ActionLog
        let action_log = ActionLog::new(
            Uuid::new_v4().to_string(),
            Some(payload.request_id.clone()),
            ActionType::ApproveDecision,
            decided_by.to_string(),
        )
        .with_payload(&payload)
        .with_detail(format!(
            "审批通过: 整单状态{}, 本轮批准{}件, 金额{:.2}",
            outcome.new_status, outcome.approved_qty, outcome.approved_value
        ));

        // 尝试记录ActionLog，失败时只记录警告（不影响主要操作）
        if let Err(e) = self.action_log_repo.insert(&action_log) {
            warn!(error = %e, "记录操作日志失败");
        }

        info!(
            "审批决定已落库: request_id={}, new_status={}, 本轮批准{}件",
            outcome.request_id, outcome.new_status, outcome.approved_qty
        );

        Ok(outcome)
    }

    /// 提交驳回决定
    ///
    /// 驳回必须填写审批意见。本轮所有明细批准数量归零，
    /// 历轮累计已批数量不受影响，整单进入 REJECTED 终态。
    ///
    /// # 参数
    /// - request_id: 申请ID
    /// - decided_by: 审批人
    /// - manager_notes: 审批意见（必填）
    ///
    /// # 返回
    /// - Ok(DecisionOutcome): 决定摘要
    /// - Err(ApiError): 校验失败、乐观锁冲突或存储错误
    pub fn reject_request(
        &self,
        request_id: &str,
        decided_by: &str,
        manager_notes: &str,
    ) -> ApiResult<DecisionOutcome> {
        let decided_by = decided_by.trim();
        if decided_by.is_empty() {
            return Err(ApiError::InvalidInput("审批人不能为空".to_string()));
        }

        let session = ApprovalSession::begin(self.request_repo.as_ref(), request_id)?;
        let payload = session.submit_reject(decided_by, manager_notes)?;
        self.request_repo.persist_decision(&payload)?;

        let outcome = DecisionOutcome {
            request_id: payload.request_id.clone(),
            action: payload.action.to_string(),
            new_status: payload.new_status.to_string(),
            has_pending_items: payload.has_pending_items,
            item_count: payload.items.len(),
            approved_qty: 0,
            approved_value: 0.0,
        };

        // 记录ActionLog
        let action_log = ActionLog::new(
            Uuid::new_v4().to_string(),
            Some(payload.request_id.clone()),
            ActionType::RejectDecision,
            decided_by.to_string(),
        )
        .with_payload(&payload)
        .with_detail(format!(
            "审批驳回: {}条明细全部归零待定",
            payload.items.len()
        ));

        // 尝试记录ActionLog，失败时只记录警告（不影响主要操作）
        if let Err(e) = self.action_log_repo.insert(&action_log) {
            warn!(error = %e, "记录操作日志失败");
        }

        info!(
            "驳回决定已落库: request_id={}, 明细{}条",
            outcome.request_id, outcome.item_count
        );

        Ok(outcome)
    }

    // ==========================================
    // 视图组装
    // ==========================================

    /// 把会话工作集转换为展示用明细行（补充物资名称）
    fn to_item_views(&self, session: &ApprovalSession) -> ApiResult<Vec<WorksheetItemView>> {
        let mut views = Vec::with_capacity(session.items().len());
        for item in session.items() {
            // 物资可能已被目录导入移除,名称缺失时回退为物资ID
            let product_name = self
                .product_repo
                .find_by_id(&item.product_id)?
                .map(|p| p.product_name)
                .unwrap_or_else(|| item.product_id.clone());

            let ledger = item.reconciler.ledger();
            views.push(WorksheetItemView {
                item_id: item.item_id.clone(),
                product_id: item.product_id.clone(),
                product_name,
                requested_qty: ledger.requested(),
                prior_approved_qty: ledger.prior_approved(),
                available_qty: ledger.available(),
                approved_qty: ledger.approved(),
                pending_qty: ledger.pending(),
                unit_price: item.unit_price,
                status: item.reconciler.status().to_string(),
                note: item.reconciler.note().map(|s| s.to_string()),
            });
        }
        Ok(views)
    }
}

/// 把一条明细编辑输入展开为会话编辑序列
fn expand_edits(input: &ItemEditInput) -> ApiResult<Vec<ManagerEdit>> {
    let mut edits = Vec::new();
    if let Some(raw) = &input.approved_qty {
        edits.push(ManagerEdit::Quantity(raw.clone()));
    }
    if let Some(note) = &input.note {
        edits.push(ManagerEdit::Note(note.clone()));
    }
    if let Some(status) = &input.status {
        let parsed = ItemStatus::from_str(status)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知的明细状态: {}", status)))?;
        edits.push(ManagerEdit::Status(parsed));
    }
    Ok(edits)
}
