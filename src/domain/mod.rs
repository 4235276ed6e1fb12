// ==========================================
// 工程物资调拨审批系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod allocation;
pub mod product;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use allocation::{
    AllocationLineItem, AllocationRequest, DecisionPayload, ItemDecision, NewRequestItem,
};
pub use product::{Product, ProductWithStock, StockLevel};
pub use types::{DecisionAction, ItemStatus, RequestStatus};
