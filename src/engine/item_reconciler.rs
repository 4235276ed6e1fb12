// ==========================================
// 工程物资调拨审批系统 - 明细调和引擎
// ==========================================
// 红线: 任何编辑之后,明细必须处于自洽状态
//       (数量满足台账不变量,状态与数量关系一致)
// ==========================================
// 职责: 将审批人的单项操作 (数量/状态/备注) 收敛为
//       一致的台账数量 + 明细状态 + 默认备注
// 输入: ManagerEdit
// 输出: 更新后的内部状态 (纯内存,不落库)
// ==========================================

use crate::domain::allocation::AllocationLineItem;
use crate::domain::types::ItemStatus;
use crate::engine::quantity_ledger::{parse_quantity_input, QuantityLedger};
use serde::{Deserialize, Serialize};

/// 批准数量为 0 时的默认明细备注
pub const REJECTED_NOTE: &str = "Rejected by manager";

/// 部分批准的默认明细备注
fn partial_note(approved: i64, pending: i64) -> String {
    format!("{} approved, {} pending", approved, pending)
}

// ==========================================
// ManagerEdit - 审批人单项操作
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ManagerEdit {
    /// 数量编辑 (原始文本,不可解析则整体忽略)
    Quantity(String),
    /// 状态下拉选择
    Status(ItemStatus),
    /// 备注编辑 (此后默认备注不再覆盖)
    Note(String),
}

// ==========================================
// ItemReconciler - 明细调和器
// ==========================================
// 状态推导规则 (顺序匹配,首条命中生效):
// 1. approved == 0            -> REJECTED, 默认备注 "Rejected by manager"
// 2. pending > 0              -> PARTIALLY_APPROVED, 默认备注 "{n} approved, {m} pending"
// 3. 其余 (完全满足)           -> APPROVED, 默认备注清空
// 默认备注仅在备注未被手改时写入
#[derive(Debug, Clone)]
pub struct ItemReconciler {
    ledger: QuantityLedger,
    status: ItemStatus,
    note: Option<String>,
    note_touched: bool,
}

impl ItemReconciler {
    /// 从明细行初始化调和器 (台账初始化 + 首次状态推导)
    ///
    /// # 参数
    /// - `item`: 明细行 (存储态)
    /// - `available_qty`: 装载时刻可用库存
    /// - `partial_round`: 是否为部分批准轮
    pub fn initialize(item: &AllocationLineItem, available_qty: i64, partial_round: bool) -> Self {
        let ledger = QuantityLedger::initialize(item, available_qty, partial_round);
        let mut reconciler = Self {
            ledger,
            status: ItemStatus::Pending,
            note: None,
            note_touched: false,
        };
        reconciler.rederive();
        reconciler
    }

    /// 应用一次审批人操作
    ///
    /// 静默策略: 不可解析的数量输入不产生任何状态变化。
    pub fn apply(&mut self, edit: &ManagerEdit) {
        match edit {
            ManagerEdit::Quantity(raw) => {
                let Some(value) = parse_quantity_input(raw) else {
                    return; // 不可解析,整体忽略
                };
                self.ledger.set_approved(value);
                self.rederive();
            }
            ManagerEdit::Status(target) => self.apply_status(*target),
            ManagerEdit::Note(text) => {
                self.note_touched = true;
                let trimmed = text.trim();
                self.note = if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                };
            }
        }
    }

    /// 状态下拉选择的语义
    ///
    /// - REJECTED: 强制本轮批准数量归零,走规则1
    /// - APPROVED: 数量不足时不抬升数量,降级为 PARTIALLY_APPROVED
    ///   (审批人必须显式编辑数量才能完全批准)
    /// - PARTIALLY_APPROVED: 数量不动,仅更新标签
    fn apply_status(&mut self, target: ItemStatus) {
        match target {
            ItemStatus::Rejected => {
                self.ledger.set_approved(0);
                self.rederive();
            }
            ItemStatus::Approved => {
                if self.ledger.pending() > 0 {
                    self.status = ItemStatus::PartiallyApproved;
                    if !self.note_touched {
                        self.note =
                            Some(partial_note(self.ledger.approved(), self.ledger.pending()));
                    }
                } else {
                    self.status = ItemStatus::Approved;
                    if !self.note_touched {
                        self.note = None;
                    }
                }
            }
            ItemStatus::PartiallyApproved => {
                self.status = ItemStatus::PartiallyApproved;
            }
            // PENDING 仅作为落库初始值,下拉不提供
            ItemStatus::Pending => {}
        }
    }

    /// 按数量关系重推状态与默认备注
    fn rederive(&mut self) {
        if self.ledger.approved() == 0 {
            self.status = ItemStatus::Rejected;
            if !self.note_touched {
                self.note = Some(REJECTED_NOTE.to_string());
            }
        } else if self.ledger.pending() > 0 {
            self.status = ItemStatus::PartiallyApproved;
            if !self.note_touched {
                self.note = Some(partial_note(self.ledger.approved(), self.ledger.pending()));
            }
        } else {
            self.status = ItemStatus::Approved;
            if !self.note_touched {
                self.note = None;
            }
        }
    }

    // ==========================================
    // 只读访问
    // ==========================================

    /// 数量台账
    pub fn ledger(&self) -> &QuantityLedger {
        &self.ledger
    }

    /// 当前明细状态
    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// 当前明细备注
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// 备注是否已被手改
    pub fn note_touched(&self) -> bool {
        self.note_touched
    }
}

// ==========================================
// WorkingItem - 审批工作集明细
// ==========================================
// 用途: 会话持有的单条明细 (身份字段 + 调和器)
#[derive(Debug, Clone)]
pub struct WorkingItem {
    pub item_id: String,          // 明细ID
    pub product_id: String,       // 关联物资
    pub unit_price: f64,          // 单价快照
    pub reconciler: ItemReconciler, // 调和器 (台账+状态+备注)
}

impl WorkingItem {
    /// 从快照明细构造工作集明细
    pub fn from_item(item: &AllocationLineItem, available_qty: i64, partial_round: bool) -> Self {
        Self {
            item_id: item.item_id.clone(),
            product_id: item.product_id.clone(),
            unit_price: item.unit_price,
            reconciler: ItemReconciler::initialize(item, available_qty, partial_round),
        }
    }
}
