// ==========================================
// 工程物资调拨审批系统 - 操作日志领域模型
// ==========================================
// 红线: 提交/审批/补货/导入等所有写入必须记录
// 对齐: action_log 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,          // 日志ID (UUID)
    pub request_id: Option<String>, // 关联申请 (补货/导入/配置等系统操作可为 None)
    pub action_type: String,        // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,   // 操作时间戳
    pub actor: String,              // 操作人

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 摘要文本 (列表页直接展示)
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    SubmitRequest,   // 提交调拨申请
    ApproveDecision, // 审批通过 (含部分批准)
    RejectDecision,  // 审批驳回
    Restock,         // 库存补货
    ImportCatalog,   // 导入物资目录
    UpdateConfig,    // 更新系统配置
}

// ==========================================
// ActionType 辅助方法
// ==========================================
impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::SubmitRequest => "SubmitRequest",
            ActionType::ApproveDecision => "ApproveDecision",
            ActionType::RejectDecision => "RejectDecision",
            ActionType::Restock => "Restock",
            ActionType::ImportCatalog => "ImportCatalog",
            ActionType::UpdateConfig => "UpdateConfig",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SubmitRequest" => Some(ActionType::SubmitRequest),
            "ApproveDecision" => Some(ActionType::ApproveDecision),
            "RejectDecision" => Some(ActionType::RejectDecision),
            "Restock" => Some(ActionType::Restock),
            "ImportCatalog" => Some(ActionType::ImportCatalog),
            "UpdateConfig" => Some(ActionType::UpdateConfig),
            _ => None,
        }
    }
}

// ==========================================
// ActionLog 辅助方法
// ==========================================
impl ActionLog {
    /// 创建新的操作日志
    ///
    /// # 参数
    /// - `action_id`: 日志ID (通常使用UUID)
    /// - `request_id`: 关联申请ID (可选)
    /// - `action_type`: 操作类型
    /// - `actor`: 操作人
    ///
    /// # 返回
    /// 新的 ActionLog 实例
    pub fn new(
        action_id: String,
        request_id: Option<String>,
        action_type: ActionType,
        actor: String,
    ) -> Self {
        Self {
            action_id,
            request_id,
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Utc::now().naive_utc(),
            actor,
            payload_json: None,
            detail: None,
        }
    }

    /// 设置操作负载 (转换为JSON)
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    /// 设置摘要文本
    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}
