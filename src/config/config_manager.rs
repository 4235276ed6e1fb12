// ==========================================
// 物资调拨审批系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、快照管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 参数
    /// - key: 配置键
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    ///
    /// # 参数
    /// - key: 配置键
    /// - default: 默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 返回
    /// - Ok(String): 配置快照的JSON字符串
    /// - Err: 获取失败
    ///
    /// # 用途
    /// - 配置变更前留档,出问题时可整体回退
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        // 查询所有global scope的配置
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        // 序列化为JSON
        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 参数
    /// - snapshot_json: 配置快照的JSON字符串
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    /// - Err: 恢复失败
    ///
    /// # 注意
    /// - 此方法会覆盖现有的global配置
    pub fn restore_config_from_snapshot(
        &self,
        snapshot_json: &str,
    ) -> Result<usize, Box<dyn Error>> {
        // 解析JSON
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        // 开启事务
        conn.execute("BEGIN TRANSACTION", [])?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            // 使用UPSERT语法（SQLite 3.24.0+）
            let affected = conn.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            count += affected;
        }

        // 提交事务
        conn.execute("COMMIT", [])?;

        Ok(count)
    }

    // ===== 库存与看板配置 =====

    /// 获取低库存预警阈值
    ///
    /// # 返回
    /// - i64: 可用量小于该值视为低库存（默认 10）
    pub fn get_low_stock_threshold(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::LOW_STOCK_THRESHOLD, "10")?;
        Ok(value.parse::<i64>().unwrap_or(10))
    }

    /// 获取最近操作日志默认条数
    ///
    /// # 返回
    /// - i32: 看板"最近操作"默认返回条数（默认 20）
    pub fn get_recent_actions_limit(&self) -> Result<i32, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::RECENT_ACTIONS_LIMIT, "20")?;
        Ok(value.parse::<i32>().unwrap_or(20))
    }

    /// 获取金额币种
    ///
    /// # 返回
    /// - String: 审批金额展示币种（默认 CNY）
    pub fn get_default_currency(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::DEFAULT_CURRENCY, "CNY")
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 库存
    pub const LOW_STOCK_THRESHOLD: &str = "low_stock_threshold";

    // 看板
    pub const RECENT_ACTIONS_LIMIT: &str = "recent_actions_limit";

    // 金额
    pub const DEFAULT_CURRENCY: &str = "default_currency";
}

// TODO: 更新配置时校验值合法性(当前读取时对非法值静默回退默认)
