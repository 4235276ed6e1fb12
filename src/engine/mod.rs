// ==========================================
// 工程物资调拨审批系统 - 引擎层
// ==========================================
// 职责: 实现审批业务规则,不拼 SQL
// 红线: Engine 不拼 SQL,落库统一走仓储层
// ==========================================

pub mod approval_session;
pub mod item_reconciler;
pub mod quantity_ledger;
pub mod request_aggregator;

// 重导出核心引擎
pub use approval_session::{
    AllocationSnapshotSource, ApprovalSession, SessionError, SessionResult,
};
pub use item_reconciler::{ItemReconciler, ManagerEdit, WorkingItem, REJECTED_NOTE};
pub use quantity_ledger::{parse_quantity_input, QuantityLedger};
pub use request_aggregator::{RequestAggregator, RequestStatistics};
