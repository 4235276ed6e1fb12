// ==========================================
// 工程物资调拨审批系统 - 操作日志数据仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 红线: 所有写入必须记录
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入操作日志
    ///
    /// # 参数
    /// - `log`: 操作日志实体
    ///
    /// # 返回
    /// - `Ok(action_id)`: 成功插入,返回action_id
    /// - `Err(...)`: 数据库错误
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, request_id, action_type, action_ts, actor,
                payload_json, detail
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                log.action_id,
                log.request_id,
                log.action_type,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.actor,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询最近的 N 条日志
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, request_id, action_type, action_ts, actor,
                   payload_json, detail
            FROM action_log
            ORDER BY action_ts DESC, action_id DESC
            LIMIT ?
            "#,
        )?;

        let logs = stmt
            .query_map(params![limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询指定申请的所有操作日志 (审批轨迹)
    pub fn find_by_request_id(&self, request_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, request_id, action_type, action_ts, actor,
                   payload_json, detail
            FROM action_log
            WHERE request_id = ?
            ORDER BY action_ts ASC, action_id ASC
            "#,
        )?;

        let logs = stmt
            .query_map(params![request_id], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询指定操作类型的日志
    pub fn find_by_action_type(
        &self,
        action_type: &str,
        limit: i32,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, request_id, action_type, action_ts, actor,
                   payload_json, detail
            FROM action_log
            WHERE action_type = ?
            ORDER BY action_ts DESC, action_id DESC
            LIMIT ?
            "#,
        )?;

        let logs = stmt
            .query_map(params![action_type, limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 统计日志总数
    pub fn count_all(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;

        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM action_log", [], |row| row.get(0))?;

        Ok(count)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 将数据库行映射为 ActionLog 实体
    fn map_row(&self, row: &Row) -> SqliteResult<ActionLog> {
        let action_id: String = row.get(0)?;
        let request_id: Option<String> = row.get(1)?;
        let action_type: String = row.get(2)?;
        let action_ts_str: String = row.get(3)?;
        let actor: String = row.get(4)?;
        let payload_json_str: Option<String> = row.get(5)?;
        let detail: Option<String> = row.get(6)?;

        // 解析时间戳
        let action_ts = NaiveDateTime::parse_from_str(&action_ts_str, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?;

        // 解析 JSON 字段
        let payload_json = payload_json_str.and_then(|s| serde_json::from_str(&s).ok());

        Ok(ActionLog {
            action_id,
            request_id,
            action_type,
            action_ts,
            actor,
            payload_json,
            detail,
        })
    }
}
