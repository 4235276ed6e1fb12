// ==========================================
// 工程物资调拨审批系统 - 调拨申请数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 审批决定落库必须在单一事务内完成
//       (整单更新 + 明细累加 + 库存扣减)
// ==========================================

use crate::domain::allocation::{AllocationLineItem, AllocationRequest, DecisionPayload};
use crate::domain::types::{ItemStatus, RequestStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ==========================================
// RequestSnapshot - 审批会话装载快照
// ==========================================
// 用途: 审批会话的只读输入 (申请 + 全部明细 + 当时库存)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub request: AllocationRequest, // 申请头
    pub items: Vec<SnapshotItem>,   // 全部明细 (含已了结行,由会话自行过滤)
}

// ==========================================
// SnapshotItem - 快照明细
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub item: AllocationLineItem, // 明细行
    pub available_qty: i64,       // 装载时刻的可用库存
}

// ==========================================
// AllocationRequestRepository - 调拨申请仓储
// ==========================================
pub struct AllocationRequestRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AllocationRequestRepository {
    /// 创建新的AllocationRequestRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建申请 (含明细,单一事务)
    ///
    /// # 参数
    /// - `request`: 申请头
    /// - `items`: 明细列表 (非空由接口层保证)
    ///
    /// # 返回
    /// - `Ok(request_id)`: 成功，返回request_id
    /// - `Err`: 失败，返回错误信息
    pub fn create_with_items(
        &self,
        request: &AllocationRequest,
        items: &[AllocationLineItem],
    ) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"INSERT INTO allocation_request (
                request_id, project_name, requested_by, status,
                manager_notes, decided_by, decided_at, created_at, revision
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &request.request_id,
                &request.project_name,
                &request.requested_by,
                request.status.to_db_str(),
                &request.manager_notes,
                &request.decided_by,
                &request
                    .decided_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                &request.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                &request.revision,
            ],
        )?;

        for item in items {
            tx.execute(
                r#"INSERT INTO allocation_line_item (
                    item_id, request_id, product_id, requested_qty,
                    approved_qty, pending_qty, unit_price, status, note,
                    created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                params![
                    &item.item_id,
                    &item.request_id,
                    &item.product_id,
                    &item.requested_qty,
                    &item.approved_qty,
                    &item.pending_qty,
                    &item.unit_price,
                    item.status.to_db_str(),
                    &item.note,
                    &item.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    &item.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(request.request_id.clone())
    }

    /// 按request_id查询申请
    ///
    /// # 返回
    /// - `Ok(Some(AllocationRequest))`: 找到申请
    /// - `Ok(None)`: 未找到申请
    /// - `Err`: 数据库错误
    pub fn find_by_id(&self, request_id: &str) -> RepositoryResult<Option<AllocationRequest>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT request_id, project_name, requested_by, status,
                      manager_notes, decided_by, decided_at, created_at, revision
               FROM allocation_request
               WHERE request_id = ?"#,
            params![request_id],
            |row| self.map_row(row),
        ) {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询所有申请
    ///
    /// # 返回
    /// - `Ok(Vec<AllocationRequest>)`: 申请列表，按created_at降序
    pub fn list_all(&self) -> RepositoryResult<Vec<AllocationRequest>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT request_id, project_name, requested_by, status,
                      manager_notes, decided_by, decided_at, created_at, revision
               FROM allocation_request
               ORDER BY created_at DESC, request_id"#,
        )?;

        let requests = stmt
            .query_map([], |row| self.map_row(row))?
            .collect::<Result<Vec<AllocationRequest>, _>>()?;

        Ok(requests)
    }

    /// 按状态查询申请
    pub fn list_by_status(&self, status: RequestStatus) -> RepositoryResult<Vec<AllocationRequest>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT request_id, project_name, requested_by, status,
                      manager_notes, decided_by, decided_at, created_at, revision
               FROM allocation_request
               WHERE status = ?
               ORDER BY created_at ASC, request_id"#,
        )?;

        let requests = stmt
            .query_map(params![status.to_db_str()], |row| self.map_row(row))?
            .collect::<Result<Vec<AllocationRequest>, _>>()?;

        Ok(requests)
    }

    /// 按状态统计申请数量
    pub fn count_by_status(&self, status: RequestStatus) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM allocation_request WHERE status = ?",
            params![status.to_db_str()],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    /// 装载审批会话快照 (申请 + 全部明细 + 当时库存)
    ///
    /// # 返回
    /// - `Ok(RequestSnapshot)`: 快照
    /// - `Err(NotFound)`: request_id不存在
    pub fn load_snapshot(&self, request_id: &str) -> RepositoryResult<RequestSnapshot> {
        let conn = self.get_conn()?;

        let request = match conn.query_row(
            r#"SELECT request_id, project_name, requested_by, status,
                      manager_notes, decided_by, decided_at, created_at, revision
               FROM allocation_request
               WHERE request_id = ?"#,
            params![request_id],
            |row| self.map_row(row),
        ) {
            Ok(request) => request,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(RepositoryError::NotFound {
                    entity: "AllocationRequest".to_string(),
                    id: request_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let mut stmt = conn.prepare(
            r#"SELECT i.item_id, i.request_id, i.product_id, i.requested_qty,
                      i.approved_qty, i.pending_qty, i.unit_price, i.status, i.note,
                      i.created_at, i.updated_at,
                      COALESCE(s.available_qty, 0)
               FROM allocation_line_item i
               LEFT JOIN stock_level s ON s.product_id = i.product_id
               WHERE i.request_id = ?
               ORDER BY i.created_at, i.item_id"#,
        )?;

        let items = stmt
            .query_map(params![request_id], |row| {
                Ok(SnapshotItem {
                    item: map_item_row(row)?,
                    available_qty: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<SnapshotItem>, _>>()?;

        Ok(RequestSnapshot { request, items })
    }

    /// 审批决定落库 (带乐观锁检查)
    ///
    /// # 事务内容
    /// 1. 整单状态/备注/审批人更新，带revision检查
    /// 2. 明细批准数量累加、待定数量/状态/备注覆盖
    /// 3. 本轮有批准数量的明细扣减库存
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision不匹配 (其他审批人已落库)
    /// - `RepositoryError::NotFound`: request_id不存在
    pub fn persist_decision(&self, decision: &DecisionPayload) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let now = chrono::Utc::now()
            .naive_utc()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        // 1. 整单更新，带revision检查
        let rows_affected = tx.execute(
            r#"UPDATE allocation_request
               SET status = ?, manager_notes = ?, decided_by = ?, decided_at = ?,
                   revision = revision + 1
               WHERE request_id = ? AND revision = ?"#,
            params![
                decision.new_status.to_db_str(),
                &decision.manager_notes,
                &decision.decided_by,
                &now,
                &decision.request_id,
                &decision.request_revision,
            ],
        )?;

        if rows_affected == 0 {
            // 判断是记录不存在还是revision冲突 (事务随early return回滚)
            let exists: Result<i32, _> = tx.query_row(
                "SELECT revision FROM allocation_request WHERE request_id = ?",
                params![&decision.request_id],
                |row| row.get(0),
            );

            return match exists {
                Ok(actual_revision) => Err(RepositoryError::OptimisticLockFailure {
                    request_id: decision.request_id.clone(),
                    expected: decision.request_revision,
                    actual: actual_revision,
                }),
                Err(_) => Err(RepositoryError::NotFound {
                    entity: "AllocationRequest".to_string(),
                    id: decision.request_id.clone(),
                }),
            };
        }

        // 2. 明细更新: 本轮批准数量累加,待定/状态/备注覆盖
        for item in &decision.items {
            tx.execute(
                r#"UPDATE allocation_line_item
                   SET approved_qty = approved_qty + ?, pending_qty = ?,
                       status = ?, note = ?, updated_at = ?
                   WHERE item_id = ?"#,
                params![
                    &item.approved_qty,
                    &item.pending_qty,
                    item.status.to_db_str(),
                    &item.note,
                    &now,
                    &item.item_id,
                ],
            )?;
        }

        // 3. 库存扣减 (仅本轮有批准数量的明细)
        for item in &decision.items {
            if item.approved_qty > 0 {
                tx.execute(
                    r#"UPDATE stock_level
                       SET available_qty = available_qty - ?, updated_at = ?
                       WHERE product_id = ?"#,
                    params![&item.approved_qty, &now, &item.product_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// 映射数据库行到AllocationRequest对象
    fn map_row(&self, row: &rusqlite::Row) -> rusqlite::Result<AllocationRequest> {
        Ok(AllocationRequest {
            request_id: row.get(0)?,
            project_name: row.get(1)?,
            requested_by: row.get(2)?,
            status: RequestStatus::from_str(&row.get::<_, String>(3)?)
                .unwrap_or(RequestStatus::Pending),
            manager_notes: row.get(4)?,
            decided_by: row.get(5)?,
            decided_at: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").ok()),
            created_at: NaiveDateTime::parse_from_str(
                &row.get::<_, String>(7)?,
                "%Y-%m-%d %H:%M:%S",
            )
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
            })?,
            revision: row.get(8)?,
        })
    }
}

// ==========================================
// AllocationItemRepository - 调拨明细仓储
// ==========================================
// 红线: 明细写入只经由 create_with_items / persist_decision,
//       本仓储仅提供查询
pub struct AllocationItemRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AllocationItemRepository {
    /// 创建新的AllocationItemRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询申请的所有明细
    pub fn find_by_request(&self, request_id: &str) -> RepositoryResult<Vec<AllocationLineItem>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT item_id, request_id, product_id, requested_qty,
                      approved_qty, pending_qty, unit_price, status, note,
                      created_at, updated_at
               FROM allocation_line_item
               WHERE request_id = ?
               ORDER BY created_at, item_id"#,
        )?;

        let items = stmt
            .query_map(params![request_id], |row| map_item_row(row))?
            .collect::<Result<Vec<AllocationLineItem>, _>>()?;

        Ok(items)
    }

    /// 查询申请的未了结明细 (剩余待定数量 > 0)
    pub fn find_pending_by_request(
        &self,
        request_id: &str,
    ) -> RepositoryResult<Vec<AllocationLineItem>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT item_id, request_id, product_id, requested_qty,
                      approved_qty, pending_qty, unit_price, status, note,
                      created_at, updated_at
               FROM allocation_line_item
               WHERE request_id = ? AND pending_qty > 0
               ORDER BY created_at, item_id"#,
        )?;

        let items = stmt
            .query_map(params![request_id], |row| map_item_row(row))?
            .collect::<Result<Vec<AllocationLineItem>, _>>()?;

        Ok(items)
    }

    /// 汇总未了结申请 (PENDING / PARTIALLY_APPROVED) 的明细数量与金额
    ///
    /// # 返回
    /// - `Ok((i64, f64))`: (剩余待定数量合计, 累计已批金额合计 Σ 已批数量×单价)
    pub fn sum_open_totals(&self) -> RepositoryResult<(i64, f64)> {
        let conn = self.get_conn()?;

        let totals = conn.query_row(
            r#"SELECT COALESCE(SUM(i.pending_qty), 0),
                      COALESCE(SUM(i.approved_qty * i.unit_price), 0.0)
               FROM allocation_line_item i
               JOIN allocation_request r ON r.request_id = i.request_id
               WHERE r.status IN (?1, ?2)"#,
            params![
                RequestStatus::Pending.to_db_str(),
                RequestStatus::PartiallyApproved.to_db_str()
            ],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?)),
        )?;

        Ok(totals)
    }
}

/// 映射数据库行到AllocationLineItem对象 (两个仓储共用)
fn map_item_row(row: &rusqlite::Row) -> rusqlite::Result<AllocationLineItem> {
    Ok(AllocationLineItem {
        item_id: row.get(0)?,
        request_id: row.get(1)?,
        product_id: row.get(2)?,
        requested_qty: row.get(3)?,
        approved_qty: row.get(4)?,
        pending_qty: row.get(5)?,
        unit_price: row.get(6)?,
        status: ItemStatus::from_str(&row.get::<_, String>(7)?).unwrap_or(ItemStatus::Pending),
        note: row.get(8)?,
        created_at: NaiveDateTime::parse_from_str(&row.get::<_, String>(9)?, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
            })?,
        updated_at: NaiveDateTime::parse_from_str(&row.get::<_, String>(10)?, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
            })?,
    })
}
