// ==========================================
// 工程物资调拨审批系统 - 数量台账引擎
// ==========================================
// 红线: 守恒不变量 approved + pending == requested (本轮口径)
// 红线: 0 <= approved <= min(requested, available)
// ==========================================
// 职责: 单条明细的本轮数量口径与安全变更
// 输入: 明细行 + 装载时刻库存
// 输出: 本轮 批准/待定 数量 (纯内存,不落库)
// ==========================================

use crate::domain::allocation::AllocationLineItem;
use serde::{Deserialize, Serialize};

/// 解析审批数量输入
///
/// 静默忽略策略: 审批界面的实时编辑不允许打断交互,
/// 不可解析的输入返回 None,调用方丢弃该次编辑。
///
/// # 返回
/// - `Some(v)`: 合法整数 (允许负数,由台账钳制)
/// - `None`: 不可解析 (空串/非数字)
pub fn parse_quantity_input(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

// ==========================================
// QuantityLedger - 数量台账
// ==========================================
// 字段口径 (均为"本轮"):
// - requested: 本轮申请数量 (部分批准轮 = 上轮剩余待定)
// - approved:  本轮批准数量
// - pending:   本轮待定数量 (= requested - approved)
// - available: 装载时刻可用库存 (轮内固定)
// - prior_approved: 历轮累计已批数量 (只读展示)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityLedger {
    requested: i64,
    approved: i64,
    pending: i64,
    available: i64,
    prior_approved: i64,
}

impl QuantityLedger {
    /// 从明细行初始化台账
    ///
    /// # 参数
    /// - `item`: 明细行 (存储态)
    /// - `available_qty`: 装载时刻可用库存
    /// - `partial_round`: 是否为部分批准轮
    ///
    /// # 规则
    /// - 部分批准轮: 本轮申请数量 = 存储的剩余待定数量,
    ///   历轮累计 = 存储的累计已批数量
    /// - 首轮: 本轮申请数量 = 原始申请数量,历轮累计 = 0
    /// - 默认批准数量 = min(requested, available),即默认尽量满足
    pub fn initialize(item: &AllocationLineItem, available_qty: i64, partial_round: bool) -> Self {
        let (requested, prior_approved) = if partial_round {
            (item.pending_qty, item.approved_qty)
        } else {
            (item.requested_qty, 0)
        };

        let mut ledger = Self {
            requested,
            approved: 0,
            pending: requested,
            available: available_qty,
            prior_approved,
        };
        ledger.set_approved(requested.min(available_qty));
        ledger
    }

    /// 设置本轮批准数量 (钳制,不报错)
    ///
    /// 越界输入 (负数/超库存/超申请) 来自实时编辑界面,
    /// 按静默钳制策略收敛到 [0, min(requested, available)]。
    ///
    /// # 返回
    /// 实际生效的批准数量
    pub fn set_approved(&mut self, new_value: i64) -> i64 {
        let upper = self.requested.min(self.available).max(0);
        self.approved = new_value.clamp(0, upper);
        self.pending = (self.requested - self.approved).max(0);
        self.approved
    }

    // ==========================================
    // 只读访问
    // ==========================================

    /// 本轮申请数量
    pub fn requested(&self) -> i64 {
        self.requested
    }

    /// 本轮批准数量
    pub fn approved(&self) -> i64 {
        self.approved
    }

    /// 本轮待定数量
    pub fn pending(&self) -> i64 {
        self.pending
    }

    /// 装载时刻可用库存
    pub fn available(&self) -> i64 {
        self.available
    }

    /// 历轮累计已批数量
    pub fn prior_approved(&self) -> i64 {
        self.prior_approved
    }

    /// 本轮是否已完全满足
    pub fn is_fully_approved(&self) -> bool {
        self.pending == 0
    }

    /// 本轮是否有批准数量
    pub fn has_approval(&self) -> bool {
        self.approved > 0
    }
}
