// ==========================================
// 物资调拨审批系统 - 应用层
// ==========================================
// 职责: 组装共享状态,连接调用方与后端
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
