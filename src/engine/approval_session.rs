// ==========================================
// 工程物资调拨审批系统 - 审批会话引擎
// ==========================================
// 红线: 终态申请 (APPROVED/REJECTED) 拒绝开启会话
// 红线: 会话本身不写库;提交失败时工作状态保持不变
// ==========================================
// 职责: 编排一轮完整审批
// 输入: 申请快照 (经 AllocationSnapshotSource 装载)
// 输出: DecisionPayload (交由仓储层原子落库)
// ==========================================

use crate::domain::allocation::{DecisionPayload, ItemDecision};
use crate::domain::types::{DecisionAction, ItemStatus, RequestStatus};
use crate::engine::item_reconciler::{ManagerEdit, WorkingItem, REJECTED_NOTE};
use crate::engine::request_aggregator::{RequestAggregator, RequestStatistics};
use crate::repository::allocation_repo::AllocationRequestRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::RequestSnapshot;
use thiserror::Error;
use tracing::instrument;

// ==========================================
// SessionError - 会话层错误类型
// ==========================================
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("输入校验失败: {0}")]
    Validation(String),

    #[error("申请已处于终态,不可再审批: request_id={request_id}, status={status}")]
    InvalidState {
        request_id: String,
        status: RequestStatus,
    },

    #[error("申请不存在: {0}")]
    NotFound(String),

    #[error("快照装载失败: {0}")]
    Snapshot(RepositoryError),
}

/// Result 类型别名
pub type SessionResult<T> = Result<T, SessionError>;

// ==========================================
// AllocationSnapshotSource - 快照装载接口
// ==========================================
// 用途: 会话与存储解耦的接缝,测试时可注入固定快照
pub trait AllocationSnapshotSource {
    /// 装载申请快照 (申请 + 全部明细 + 当时库存)
    fn load_snapshot(&self, request_id: &str) -> RepositoryResult<RequestSnapshot>;
}

impl AllocationSnapshotSource for AllocationRequestRepository {
    fn load_snapshot(&self, request_id: &str) -> RepositoryResult<RequestSnapshot> {
        AllocationRequestRepository::load_snapshot(self, request_id)
    }
}

// ==========================================
// ApprovalSession - 审批会话
// ==========================================
// 生命周期: begin() 成功后绑定一次审批交互;
//           submit_* 成功后由调用方持 payload 落库并丢弃会话
#[derive(Debug)]
pub struct ApprovalSession {
    request_id: String,
    request_revision: i32, // 装载时的修订号 (落库时做乐观锁检查)
    partial_round: bool,
    items: Vec<WorkingItem>,
    aggregator: RequestAggregator,
    stats: RequestStatistics,
}

impl ApprovalSession {
    /// 开启一轮审批会话
    ///
    /// # 规则
    /// - 终态申请 (APPROVED/REJECTED) 拒绝开启
    /// - 部分批准轮: 工作集只装载剩余待定数量 > 0 的明细,
    ///   且本轮申请数量 = 上轮剩余待定
    /// - 首轮: 装载全部明细
    ///
    /// # 错误
    /// - `SessionError::InvalidState`: 申请已终态
    /// - `SessionError::NotFound`: 申请不存在
    /// - `SessionError::Snapshot`: 存储装载失败
    #[instrument(skip(source), fields(request_id = %request_id))]
    pub fn begin<S: AllocationSnapshotSource>(
        source: &S,
        request_id: &str,
    ) -> SessionResult<Self> {
        let snapshot = source.load_snapshot(request_id).map_err(|e| match e {
            RepositoryError::NotFound { id, .. } => SessionError::NotFound(id),
            other => SessionError::Snapshot(other),
        })?;

        if snapshot.request.is_terminal() {
            return Err(SessionError::InvalidState {
                request_id: snapshot.request.request_id.clone(),
                status: snapshot.request.status,
            });
        }

        let partial_round = snapshot.request.is_partial_round();

        // 部分批准轮只装载未了结明细
        let items: Vec<WorkingItem> = snapshot
            .items
            .iter()
            .filter(|s| !partial_round || s.item.pending_qty > 0)
            .map(|s| WorkingItem::from_item(&s.item, s.available_qty, partial_round))
            .collect();

        let aggregator = RequestAggregator::new();
        let stats = aggregator.aggregate(&items);

        Ok(Self {
            request_id: snapshot.request.request_id.clone(),
            request_revision: snapshot.request.revision,
            partial_round,
            items,
            aggregator,
            stats,
        })
    }

    /// 应用一次审批人操作并重算整单统计
    ///
    /// # 错误
    /// - `SessionError::Validation`: item_id 不在工作集内
    pub fn apply_edit(
        &mut self,
        item_id: &str,
        edit: &ManagerEdit,
    ) -> SessionResult<&RequestStatistics> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.item_id == item_id)
            .ok_or_else(|| SessionError::Validation(format!("明细不在本轮工作集内: {}", item_id)))?;

        item.reconciler.apply(edit);
        self.stats = self.aggregator.aggregate(&self.items);
        Ok(&self.stats)
    }

    /// 提交批准决定
    ///
    /// # 错误
    /// - `SessionError::Validation`: 工作集为空,或本轮批准数量合计为0
    ///
    /// # 返回
    /// 决定载荷 (整单状态为聚合建议;会话状态保持不变)
    #[instrument(skip(self, manager_notes), fields(request_id = %self.request_id))]
    pub fn submit_approve(
        &self,
        decided_by: &str,
        manager_notes: Option<String>,
    ) -> SessionResult<DecisionPayload> {
        if self.items.is_empty() {
            return Err(SessionError::Validation(
                "本轮工作集为空,无可审批明细".to_string(),
            ));
        }
        if self.stats.approved_qty == 0 {
            return Err(SessionError::Validation(
                "本轮批准数量合计为0,请改用驳回".to_string(),
            ));
        }

        let new_status = self.stats.recommended_status();

        let items = self
            .items
            .iter()
            .map(|item| {
                let ledger = item.reconciler.ledger();
                ItemDecision {
                    item_id: item.item_id.clone(),
                    product_id: item.product_id.clone(),
                    requested_qty: ledger.requested(),
                    approved_qty: ledger.approved(),
                    pending_qty: ledger.pending(),
                    status: item.reconciler.status(),
                    note: item.reconciler.note().map(|s| s.to_string()),
                }
            })
            .collect();

        Ok(DecisionPayload {
            request_id: self.request_id.clone(),
            action: DecisionAction::Approve,
            new_status,
            has_pending_items: self.stats.has_partial_approvals,
            manager_notes,
            decided_by: decided_by.to_string(),
            request_revision: self.request_revision,
            items,
        })
    }

    /// 提交驳回决定
    ///
    /// 无论此前编辑为何,载荷中所有明细批准数量归零、
    /// 待定数量恢复为本轮申请数量。历轮累计已批数量不受影响。
    ///
    /// # 错误
    /// - `SessionError::Validation`: 审批意见为空
    #[instrument(skip(self, manager_notes), fields(request_id = %self.request_id))]
    pub fn submit_reject(
        &self,
        decided_by: &str,
        manager_notes: &str,
    ) -> SessionResult<DecisionPayload> {
        let notes = manager_notes.trim();
        if notes.is_empty() {
            return Err(SessionError::Validation(
                "驳回必须填写审批意见".to_string(),
            ));
        }

        let items = self
            .items
            .iter()
            .map(|item| {
                let ledger = item.reconciler.ledger();
                // 手改过的备注保留,否则写默认驳回备注
                let note = if item.reconciler.note_touched() {
                    item.reconciler.note().map(|s| s.to_string())
                } else {
                    Some(REJECTED_NOTE.to_string())
                };
                ItemDecision {
                    item_id: item.item_id.clone(),
                    product_id: item.product_id.clone(),
                    requested_qty: ledger.requested(),
                    approved_qty: 0,
                    pending_qty: ledger.requested(),
                    status: ItemStatus::Rejected,
                    note,
                }
            })
            .collect();

        Ok(DecisionPayload {
            request_id: self.request_id.clone(),
            action: DecisionAction::Reject,
            new_status: RequestStatus::Rejected,
            has_pending_items: false, // 终态,不再有后续轮次
            manager_notes: Some(notes.to_string()),
            decided_by: decided_by.to_string(),
            request_revision: self.request_revision,
            items,
        })
    }

    // ==========================================
    // 只读访问
    // ==========================================

    /// 当前整单统计
    pub fn statistics(&self) -> &RequestStatistics {
        &self.stats
    }

    /// 当前工作集
    pub fn items(&self) -> &[WorkingItem] {
        &self.items
    }

    /// 是否为部分批准轮
    pub fn is_partial_round(&self) -> bool {
        self.partial_round
    }

    /// 申请ID
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// 装载时的修订号
    pub fn request_revision(&self) -> i32 {
        self.request_revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::{AllocationLineItem, AllocationRequest};
    use crate::repository::SnapshotItem;

    // ==========================================
    // Mock 快照源
    // ==========================================
    struct FixedSnapshotSource {
        snapshot: RequestSnapshot,
    }

    impl AllocationSnapshotSource for FixedSnapshotSource {
        fn load_snapshot(&self, request_id: &str) -> RepositoryResult<RequestSnapshot> {
            if request_id == self.snapshot.request.request_id {
                Ok(self.snapshot.clone())
            } else {
                Err(RepositoryError::NotFound {
                    entity: "AllocationRequest".to_string(),
                    id: request_id.to_string(),
                })
            }
        }
    }

    // ==========================================
    // 测试辅助函数
    // ==========================================
    fn create_test_request(status: RequestStatus) -> AllocationRequest {
        AllocationRequest {
            request_id: "REQ001".to_string(),
            project_name: "A栋工地".to_string(),
            requested_by: "worker-01".to_string(),
            status,
            manager_notes: None,
            decided_by: None,
            decided_at: None,
            created_at: chrono::Utc::now().naive_utc(),
            revision: 3,
        }
    }

    fn create_snapshot_item(
        item_id: &str,
        requested: i64,
        approved: i64,
        pending: i64,
        available: i64,
        unit_price: f64,
    ) -> SnapshotItem {
        let now = chrono::Utc::now().naive_utc();
        SnapshotItem {
            item: AllocationLineItem {
                item_id: item_id.to_string(),
                request_id: "REQ001".to_string(),
                product_id: format!("P-{}", item_id),
                requested_qty: requested,
                approved_qty: approved,
                pending_qty: pending,
                unit_price,
                status: ItemStatus::Pending,
                note: None,
                created_at: now,
                updated_at: now,
            },
            available_qty: available,
        }
    }

    fn fresh_source() -> FixedSnapshotSource {
        // 两条明细: I1 申请3/库存充足, I2 申请5/库存2
        FixedSnapshotSource {
            snapshot: RequestSnapshot {
                request: create_test_request(RequestStatus::Pending),
                items: vec![
                    create_snapshot_item("I1", 3, 0, 3, 10, 2.0),
                    create_snapshot_item("I2", 5, 0, 5, 2, 4.0),
                ],
            },
        }
    }

    // ==========================================
    // 测试用例
    // ==========================================

    #[test]
    fn test_begin_首轮装载全部明细() {
        let source = fresh_source();
        let session = ApprovalSession::begin(&source, "REQ001").unwrap();

        assert!(!session.is_partial_round());
        assert_eq!(session.items().len(), 2);
        assert_eq!(session.request_revision(), 3);
        // 默认批准: I1=3, I2=2
        assert_eq!(session.statistics().approved_qty, 5);
        assert_eq!(session.statistics().pending_qty, 3);
    }

    #[test]
    fn test_begin_终态申请被拒绝() {
        for status in [RequestStatus::Approved, RequestStatus::Rejected] {
            let source = FixedSnapshotSource {
                snapshot: RequestSnapshot {
                    request: create_test_request(status),
                    items: vec![],
                },
            };
            let err = ApprovalSession::begin(&source, "REQ001").unwrap_err();
            assert!(
                matches!(err, SessionError::InvalidState { .. }),
                "终态 {} 应拒绝开启会话",
                status
            );
        }
    }

    #[test]
    fn test_begin_申请不存在() {
        let source = fresh_source();
        let err = ApprovalSession::begin(&source, "REQ999").unwrap_err();
        assert!(matches!(err, SessionError::NotFound(id) if id == "REQ999"));
    }

    #[test]
    fn test_begin_部分批准轮只装载未了结明细() {
        // I1 已完全了结(待定0), I2 剩余待定3
        let source = FixedSnapshotSource {
            snapshot: RequestSnapshot {
                request: create_test_request(RequestStatus::PartiallyApproved),
                items: vec![
                    create_snapshot_item("I1", 3, 3, 0, 10, 2.0),
                    create_snapshot_item("I2", 5, 2, 3, 10, 4.0),
                ],
            },
        };

        let session = ApprovalSession::begin(&source, "REQ001").unwrap();

        assert!(session.is_partial_round());
        assert_eq!(session.items().len(), 1);
        assert_eq!(session.items()[0].item_id, "I2");
        // 本轮申请数量 = 上轮剩余待定 3 (而非原始 5)
        assert_eq!(session.items()[0].reconciler.ledger().requested(), 3);
        assert_eq!(session.items()[0].reconciler.ledger().prior_approved(), 2);
    }

    #[test]
    fn test_apply_edit_重算统计() {
        let source = fresh_source();
        let mut session = ApprovalSession::begin(&source, "REQ001").unwrap();

        let stats = session
            .apply_edit("I1", &ManagerEdit::Quantity("1".to_string()))
            .unwrap();

        assert_eq!(stats.approved_qty, 3); // I1=1 + I2=2
        assert_eq!(stats.pending_qty, 5);
    }

    #[test]
    fn test_apply_edit_明细不在工作集() {
        let source = fresh_source();
        let mut session = ApprovalSession::begin(&source, "REQ001").unwrap();

        let err = session
            .apply_edit("I999", &ManagerEdit::Quantity("1".to_string()))
            .unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
    }

    #[test]
    fn test_submit_approve_生成载荷() {
        let source = fresh_source();
        let session = ApprovalSession::begin(&source, "REQ001").unwrap();

        let payload = session
            .submit_approve("manager-01", Some("先发已有库存".to_string()))
            .unwrap();

        assert_eq!(payload.request_id, "REQ001");
        assert_eq!(payload.action, DecisionAction::Approve);
        assert_eq!(payload.new_status, RequestStatus::PartiallyApproved);
        assert!(payload.has_pending_items);
        assert_eq!(payload.request_revision, 3);
        assert_eq!(payload.items.len(), 2);

        let i2 = payload.items.iter().find(|i| i.item_id == "I2").unwrap();
        assert_eq!(i2.approved_qty, 2);
        assert_eq!(i2.pending_qty, 3);
        assert_eq!(i2.status, ItemStatus::PartiallyApproved);
        assert_eq!(i2.note.as_deref(), Some("2 approved, 3 pending"));
    }

    #[test]
    fn test_submit_approve_零批准合计被拒() {
        let source = fresh_source();
        let mut session = ApprovalSession::begin(&source, "REQ001").unwrap();

        // 全部归零
        session
            .apply_edit("I1", &ManagerEdit::Quantity("0".to_string()))
            .unwrap();
        session
            .apply_edit("I2", &ManagerEdit::Quantity("0".to_string()))
            .unwrap();

        let err = session.submit_approve("manager-01", None).unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));

        // 失败不改变工作状态
        assert_eq!(session.statistics().approved_qty, 0);
        assert_eq!(session.items().len(), 2);
    }

    #[test]
    fn test_submit_approve_空工作集被拒() {
        let source = FixedSnapshotSource {
            snapshot: RequestSnapshot {
                request: create_test_request(RequestStatus::Pending),
                items: vec![],
            },
        };
        let session = ApprovalSession::begin(&source, "REQ001").unwrap();

        let err = session.submit_approve("manager-01", None).unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
    }

    #[test]
    fn test_submit_reject_意见为空被拒() {
        let source = fresh_source();
        let session = ApprovalSession::begin(&source, "REQ001").unwrap();

        let err = session.submit_reject("manager-01", "   ").unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        // 失败不改变工作状态
        assert_eq!(session.statistics().approved_qty, 5);
    }

    #[test]
    fn test_submit_reject_无视此前编辑全部归零() {
        let source = fresh_source();
        let mut session = ApprovalSession::begin(&source, "REQ001").unwrap();

        // 先做一些编辑
        session
            .apply_edit("I1", &ManagerEdit::Quantity("2".to_string()))
            .unwrap();

        let payload = session
            .submit_reject("manager-01", "库存需留作应急储备")
            .unwrap();

        assert_eq!(payload.action, DecisionAction::Reject);
        assert_eq!(payload.new_status, RequestStatus::Rejected);
        assert!(!payload.has_pending_items);
        for item in &payload.items {
            assert_eq!(item.approved_qty, 0);
            assert_eq!(item.pending_qty, item.requested_qty);
            assert_eq!(item.status, ItemStatus::Rejected);
            assert_eq!(item.note.as_deref(), Some(REJECTED_NOTE));
        }
    }

    #[test]
    fn test_submit_reject_保留手改备注() {
        let source = fresh_source();
        let mut session = ApprovalSession::begin(&source, "REQ001").unwrap();

        session
            .apply_edit("I1", &ManagerEdit::Note("改从B仓调拨".to_string()))
            .unwrap();

        let payload = session.submit_reject("manager-01", "整单驳回").unwrap();
        let i1 = payload.items.iter().find(|i| i.item_id == "I1").unwrap();
        assert_eq!(i1.note.as_deref(), Some("改从B仓调拨"));
    }

    #[test]
    fn test_两轮审批_第二轮口径衔接() {
        // 第一轮: I2 批2待3 -> 整单 PARTIALLY_APPROVED
        let source = fresh_source();
        let session = ApprovalSession::begin(&source, "REQ001").unwrap();
        let payload = session.submit_approve("manager-01", None).unwrap();
        assert_eq!(payload.new_status, RequestStatus::PartiallyApproved);

        // 模拟落库后的第二轮快照: 累计已批=本轮批准,待定=本轮待定
        let mut request = create_test_request(RequestStatus::PartiallyApproved);
        request.revision = 4;
        let source2 = FixedSnapshotSource {
            snapshot: RequestSnapshot {
                request,
                items: payload
                    .items
                    .iter()
                    .map(|d| {
                        create_snapshot_item(
                            &d.item_id,
                            if d.item_id == "I1" { 3 } else { 5 },
                            d.approved_qty,
                            d.pending_qty,
                            10, // 已补货
                            1.0,
                        )
                    })
                    .collect(),
            },
        };

        let session2 = ApprovalSession::begin(&source2, "REQ001").unwrap();
        assert_eq!(session2.items().len(), 1); // 只剩 I2
        assert_eq!(session2.items()[0].reconciler.ledger().requested(), 3);

        let payload2 = session2.submit_approve("manager-01", None).unwrap();
        assert_eq!(payload2.new_status, RequestStatus::Approved); // 本轮全部满足
        assert!(!payload2.has_pending_items);
        assert_eq!(payload2.request_revision, 4);
    }
}
