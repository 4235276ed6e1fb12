// ==========================================
// 工程物资调拨审批系统 - 调拨申请领域模型
// ==========================================
// 对齐: allocation_request / allocation_line_item 表
// ==========================================

use crate::domain::types::{DecisionAction, ItemStatus, RequestStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// AllocationRequest - 调拨申请
// ==========================================
// 生命周期: 提交后为 PENDING; 仅审批决定落库可改写;
//           进入 APPROVED / REJECTED 后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub request_id: String,              // 申请ID
    pub project_name: String,            // 申请项目/工地名称
    pub requested_by: String,            // 申请人
    pub status: RequestStatus,           // 整单状态 (类型安全的枚举)
    pub manager_notes: Option<String>,   // 审批备注 (整单)
    pub decided_by: Option<String>,      // 最近一轮审批人
    pub decided_at: Option<NaiveDateTime>, // 最近一轮审批时间
    pub created_at: NaiveDateTime,       // 创建时间
    pub revision: i32,                   // 乐观锁：修订号,每轮决定落库+1
}

impl AllocationRequest {
    /// 判断是否为终态 (不可再开启审批会话)
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 判断是否为部分批准轮 (后续会话只装载仍有待定数量的明细)
    pub fn is_partial_round(&self) -> bool {
        self.status == RequestStatus::PartiallyApproved
    }
}

// ==========================================
// AllocationLineItem - 调拨明细
// ==========================================
// 数量口径:
// - requested_qty: 原始申请数量 (跨轮不变)
// - approved_qty:  历轮累计已批数量 (只增不减)
// - pending_qty:   剩余待定数量 (下一轮的"本轮申请数")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationLineItem {
    pub item_id: String,           // 明细ID
    pub request_id: String,        // 关联申请
    pub product_id: String,        // 关联物资
    pub requested_qty: i64,        // 原始申请数量
    pub approved_qty: i64,         // 累计已批数量 (历轮之和)
    pub pending_qty: i64,          // 剩余待定数量
    pub unit_price: f64,           // 单价快照 (提交时从物资目录取)
    pub status: ItemStatus,        // 明细状态
    pub note: Option<String>,      // 明细备注
    pub created_at: NaiveDateTime, // 创建时间
    pub updated_at: NaiveDateTime, // 更新时间
}

impl AllocationLineItem {
    /// 判断本行是否已完全了结 (无待定数量,后续轮次不再装载)
    pub fn is_resolved(&self) -> bool {
        self.pending_qty <= 0
    }

    /// 累计已批金额
    pub fn approved_value(&self) -> f64 {
        self.approved_qty as f64 * self.unit_price
    }
}

// ==========================================
// NewRequestItem - 提交申请时的明细输入
// ==========================================
// 单价不由调用方提供,由接口层从物资目录快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequestItem {
    pub product_id: String, // 物资ID
    pub quantity: i64,      // 申请数量 (必须 > 0)
}

// ==========================================
// DecisionPayload - 审批决定落库载荷
// ==========================================
// 用途: 审批会话输出,仓储层原子落库 (同时写入操作日志)
// 红线: approved_qty 为本轮增量,落库时累加到历轮累计值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionPayload {
    pub request_id: String,            // 申请ID
    pub action: DecisionAction,        // 通过 / 驳回
    pub new_status: RequestStatus,     // 整单新状态
    pub has_pending_items: bool,       // 是否仍有待定明细 (需要后续轮次)
    pub manager_notes: Option<String>, // 整单审批备注
    pub decided_by: String,            // 审批人
    pub request_revision: i32,         // 乐观锁: 会话装载时的修订号
    pub items: Vec<ItemDecision>,      // 本轮明细决定
}

// ==========================================
// ItemDecision - 明细决定
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDecision {
    pub item_id: String,      // 明细ID
    pub product_id: String,   // 关联物资 (库存扣减用)
    pub requested_qty: i64,   // 本轮申请数量 (= 装载时的剩余待定)
    pub approved_qty: i64,    // 本轮批准数量 (增量)
    pub pending_qty: i64,     // 落库后的剩余待定数量
    pub status: ItemStatus,   // 落库后的明细状态
    pub note: Option<String>, // 明细备注
}
