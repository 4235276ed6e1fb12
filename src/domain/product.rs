// ==========================================
// 工程物资调拨审批系统 - 物资领域模型
// ==========================================
// 对齐: product / stock_level 表
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Product - 物资主数据
// ==========================================
// 用途: 导入层/录入接口写入,审批引擎只读单价快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,        // 物资ID (导入文件给定或 UUID)
    pub product_name: String,      // 物资名称
    pub category: Option<String>,  // 分类 (钢材/水泥/机电...)
    pub unit: Option<String>,      // 计量单位 (吨/件/米...)
    pub unit_price: f64,           // 单价
    pub created_at: NaiveDateTime, // 创建时间
    pub updated_at: NaiveDateTime, // 更新时间
}

// ==========================================
// StockLevel - 库存水位
// ==========================================
// 红线: available_qty 只在两处变动 —
//       审批决定落库扣减、入库补货增加,均在事务内
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: String,        // 关联物资 (FK, 1:1)
    pub available_qty: i64,        // 当前可用数量
    pub updated_at: NaiveDateTime, // 最后变动时间
}

// ==========================================
// ProductWithStock - 物资+库存联合视图
// ==========================================
// 用途: 目录查询/低库存告警返回值 (JOIN 结果)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductWithStock {
    pub product: Product,   // 物资主数据
    pub available_qty: i64, // 当前可用数量
}

impl ProductWithStock {
    /// 判断是否低于告警阈值
    pub fn is_low_stock(&self, threshold: i64) -> bool {
        self.available_qty < threshold
    }
}
