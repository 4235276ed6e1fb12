// ==========================================
// 工程物资调拨审批系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供前端/CLI 调用
// ==========================================

pub mod approval_api;
pub mod config_api;
pub mod dashboard_api;
pub mod error;
pub mod request_api;
pub mod stock_api;

// 重导出核心类型
pub use approval_api::{ApprovalApi, DecisionOutcome, ItemEditInput, WorksheetItemView, WorksheetView};
pub use config_api::{ConfigApi, ConfigItem};
pub use dashboard_api::{ApprovalQueueSummary, DashboardApi};
pub use error::{ApiError, ApiResult};
pub use request_api::{RequestApi, RequestDetail, RequestSummary};
pub use stock_api::{CatalogItemView, StockApi};
