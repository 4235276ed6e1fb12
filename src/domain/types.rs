// ==========================================
// 工程物资调拨审批系统 - 领域类型定义
// ==========================================
// 状态存储格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 调拨申请状态 (Request Status)
// ==========================================
// 状态机: PENDING → {APPROVED, PARTIALLY_APPROVED, REJECTED}
//         PARTIALLY_APPROVED → {APPROVED, PARTIALLY_APPROVED, REJECTED} (可重复)
//         APPROVED / REJECTED 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,           // 待审批
    PartiallyApproved, // 部分批准 (仍有待定数量,可再次审批)
    Approved,          // 全部批准 (终态)
    Rejected,          // 已拒绝 (终态)
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "PENDING"),
            RequestStatus::PartiallyApproved => write!(f, "PARTIALLY_APPROVED"),
            RequestStatus::Approved => write!(f, "APPROVED"),
            RequestStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl RequestStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(RequestStatus::Pending),
            "PARTIALLY_APPROVED" => Some(RequestStatus::PartiallyApproved),
            "APPROVED" => Some(RequestStatus::Approved),
            "REJECTED" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::PartiallyApproved => "PARTIALLY_APPROVED",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
        }
    }

    /// 是否为终态 (终态申请不可再开启审批会话)
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

// ==========================================
// 明细状态 (Item Status)
// ==========================================
// PENDING 仅作为落库初始值; 审批推导只产生后三种
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,           // 未决 (尚无任何审批动作)
    Approved,          // 本行全额批准
    PartiallyApproved, // 本行部分批准
    Rejected,          // 本行拒绝
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "PENDING"),
            ItemStatus::Approved => write!(f, "APPROVED"),
            ItemStatus::PartiallyApproved => write!(f, "PARTIALLY_APPROVED"),
            ItemStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl ItemStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(ItemStatus::Pending),
            "APPROVED" => Some(ItemStatus::Approved),
            "PARTIALLY_APPROVED" => Some(ItemStatus::PartiallyApproved),
            "REJECTED" => Some(ItemStatus::Rejected),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::Approved => "APPROVED",
            ItemStatus::PartiallyApproved => "PARTIALLY_APPROVED",
            ItemStatus::Rejected => "REJECTED",
        }
    }
}

// ==========================================
// 审批动作 (Decision Action)
// ==========================================
// 决定载荷中的动作标识,序列化为小写 ("approve"/"reject")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Approve, // 批准 (含部分批准)
    Reject,  // 整单拒绝
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionAction::Approve => write!(f, "approve"),
            DecisionAction::Reject => write!(f, "reject"),
        }
    }
}
