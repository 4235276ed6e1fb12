// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试配置写入等功能
// ==========================================

use rusqlite::Connection;
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = Connection::open(&db_path)?;

    // 初始化 schema (与生产共用同一份 DDL)
    allocation_approval::db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试数据库连接 (统一 PRAGMA)
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    let conn = allocation_approval::db::open_sqlite_connection(db_path)?;
    Ok(conn)
}

/// 插入测试配置数据
///
/// # 配置项
/// - low_stock_threshold: 10 (可用量小于该值视为低库存)
/// - recent_actions_limit: 20
/// - default_currency: CNY
pub fn insert_test_config(conn: &Connection) -> Result<(), Box<dyn Error>> {
    conn.execute(
        r#"
        INSERT OR REPLACE INTO config_kv (scope_id, key, value, updated_at)
        VALUES
            ('global', 'low_stock_threshold', '10', datetime('now')),
            ('global', 'recent_actions_limit', '20', datetime('now')),
            ('global', 'default_currency', 'CNY', datetime('now'))
        "#,
        [],
    )?;

    Ok(())
}
