// ==========================================
// 工程物资调拨审批系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型,转换仓储/会话错误为用户友好的错误消息
// ==========================================

use crate::engine::approval_session::SessionError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
/// 所有错误信息必须包含显式原因,便于前端直接展示
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将仓储层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                request_id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "申请{}已被其他审批人修改（期望revision={}，实际revision={}）",
                request_id, expected, actual
            )),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 SessionError 转换
// 目的: 审批会话的拒绝理由原样透出给调用方
// ==========================================
impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Validation(msg) => ApiError::ValidationError(msg),
            SessionError::InvalidState { request_id, status } => ApiError::InvalidStateTransition {
                from: status.to_string(),
                to: format!("申请{}重新进入审批", request_id),
            },
            SessionError::NotFound(id) => ApiError::NotFound(format!("申请(id={})不存在", id)),
            SessionError::Snapshot(repo_err) => repo_err.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
