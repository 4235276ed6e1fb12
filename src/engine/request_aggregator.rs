// ==========================================
// 工程物资调拨审批系统 - 整单聚合引擎
// ==========================================
// 红线: 每次明细变更后立即重算,调用方永远看到当前合计
// ==========================================
// 职责: 将工作集明细折叠为整单统计 + 整单状态建议
// 输入: 工作集明细列表
// 输出: RequestStatistics (派生数据,不落库)
// ==========================================

use crate::domain::types::RequestStatus;
use crate::engine::item_reconciler::WorkingItem;
use serde::{Deserialize, Serialize};

// ==========================================
// RequestStatistics - 整单统计
// ==========================================
// 口径: 全部为"本轮"工作集合计;
//       历轮累计单独在 prior_approved_qty 报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatistics {
    pub item_count: usize,          // 工作集明细数
    pub requested_qty: i64,         // 本轮申请数量合计
    pub available_qty: i64,         // 装载时刻库存合计
    pub approved_qty: i64,          // 本轮批准数量合计
    pub pending_qty: i64,           // 本轮待定数量合计
    pub prior_approved_qty: i64,    // 历轮累计已批数量合计
    pub approved_value: f64,        // 本轮批准金额 (Σ 批准数量×单价)
    pub pending_item_count: usize,  // 仍有待定数量的明细数
    pub has_partial_approvals: bool, // 是否存在待定数量 > 0 的明细
    pub has_any_approvals: bool,    // 是否存在批准数量 > 0 的明细
}

impl RequestStatistics {
    /// 创建空统计 (空工作集)
    pub fn empty() -> Self {
        Self {
            item_count: 0,
            requested_qty: 0,
            available_qty: 0,
            approved_qty: 0,
            pending_qty: 0,
            prior_approved_qty: 0,
            approved_value: 0.0,
            pending_item_count: 0,
            has_partial_approvals: false,
            has_any_approvals: false,
        }
    }

    /// 整单状态建议
    ///
    /// 规则 (顺序匹配):
    /// 1. 无任何批准数量 -> REJECTED
    /// 2. 存在待定数量   -> PARTIALLY_APPROVED
    /// 3. 其余           -> APPROVED
    pub fn recommended_status(&self) -> RequestStatus {
        if !self.has_any_approvals {
            RequestStatus::Rejected
        } else if self.has_partial_approvals {
            RequestStatus::PartiallyApproved
        } else {
            RequestStatus::Approved
        }
    }
}

// ==========================================
// RequestAggregator - 整单聚合引擎
// ==========================================
#[derive(Debug)]
pub struct RequestAggregator {
    // 无状态引擎，不需要注入依赖
}

impl RequestAggregator {
    /// 构造函数
    pub fn new() -> Self {
        Self {}
    }

    /// 折叠工作集明细为整单统计
    ///
    /// # 参数
    /// - `items`: 工作集明细列表
    ///
    /// # 返回
    /// 整单统计 (金额口径只含本轮批准,不含历轮累计)
    pub fn aggregate(&self, items: &[WorkingItem]) -> RequestStatistics {
        let mut stats = RequestStatistics::empty();
        stats.item_count = items.len();

        for item in items {
            let ledger = item.reconciler.ledger();
            stats.requested_qty += ledger.requested();
            stats.available_qty += ledger.available();
            stats.approved_qty += ledger.approved();
            stats.pending_qty += ledger.pending();
            stats.prior_approved_qty += ledger.prior_approved();
            stats.approved_value += ledger.approved() as f64 * item.unit_price;

            if ledger.pending() > 0 {
                stats.pending_item_count += 1;
                stats.has_partial_approvals = true;
            }
            if ledger.approved() > 0 {
                stats.has_any_approvals = true;
            }
        }

        stats
    }
}
