// ==========================================
// ConfigManager / ConfigApi 集成测试
// ==========================================
// 测试目标: 验证配置读取、更新与快照恢复
// ==========================================

mod test_helpers;

use std::sync::{Arc, Mutex};

use allocation_approval::api::{ApiError, ConfigApi};
use allocation_approval::config::ConfigManager;
use allocation_approval::repository::action_log_repo::ActionLogRepository;
use rusqlite::Connection;
use test_helpers::{create_test_db, insert_test_config};

#[test]
fn test_config_manager_creation() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let config_manager = ConfigManager::new(&db_path);
    assert!(
        config_manager.is_ok(),
        "ConfigManager should be created successfully"
    );
}

#[test]
fn test_typed_getters_fall_back_to_defaults() {
    // 空配置表: 全部走内置默认值
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    assert_eq!(config_manager.get_low_stock_threshold().unwrap(), 10);
    assert_eq!(config_manager.get_recent_actions_limit().unwrap(), 20);
    assert_eq!(config_manager.get_default_currency().unwrap(), "CNY");
}

#[test]
fn test_typed_getters_read_from_table() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    insert_test_config(&conn).expect("Failed to insert test config");

    // 覆盖其中一项
    conn.execute(
        "UPDATE config_kv SET value = '25' WHERE scope_id = 'global' AND key = 'low_stock_threshold'",
        [],
    )
    .expect("Failed to update config");

    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");
    assert_eq!(config_manager.get_low_stock_threshold().unwrap(), 25);
    assert_eq!(config_manager.get_recent_actions_limit().unwrap(), 20);
}

#[test]
fn test_unparseable_value_falls_back_to_default() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    insert_test_config(&conn).expect("Failed to insert test config");

    conn.execute(
        "UPDATE config_kv SET value = 'abc' WHERE scope_id = 'global' AND key = 'low_stock_threshold'",
        [],
    )
    .expect("Failed to update config");

    // 值坏了不报错,回落默认值
    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");
    assert_eq!(config_manager.get_low_stock_threshold().unwrap(), 10);
}

#[test]
fn test_get_global_config_value() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    insert_test_config(&conn).expect("Failed to insert test config");

    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    let value = config_manager
        .get_global_config_value("default_currency")
        .unwrap();
    assert_eq!(value.as_deref(), Some("CNY"));

    let missing = config_manager
        .get_global_config_value("no_such_key")
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn test_config_snapshot_roundtrip() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    insert_test_config(&conn).expect("Failed to insert test config");

    let config_manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    // 留档快照
    let snapshot = config_manager.get_config_snapshot().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(parsed["low_stock_threshold"], "10");
    assert_eq!(parsed["default_currency"], "CNY");

    // 改坏配置后整体回退
    conn.execute(
        "UPDATE config_kv SET value = '99' WHERE scope_id = 'global' AND key = 'low_stock_threshold'",
        [],
    )
    .expect("Failed to update config");
    assert_eq!(config_manager.get_low_stock_threshold().unwrap(), 99);

    let restored = config_manager
        .restore_config_from_snapshot(&snapshot)
        .unwrap();
    assert!(restored >= 3, "Should restore at least 3 config entries");
    assert_eq!(config_manager.get_low_stock_threshold().unwrap(), 10);
}

// ==========================================
// ConfigApi 测试
// ==========================================

fn setup_config_api(db_path: &str) -> (ConfigApi, Arc<ActionLogRepository>) {
    let conn = Arc::new(Mutex::new(
        Connection::open(db_path).expect("Failed to open db"),
    ));
    let config_manager = Arc::new(
        ConfigManager::from_connection(conn.clone()).expect("Failed to create ConfigManager"),
    );
    let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
    let config_api = ConfigApi::new(conn, config_manager, action_log_repo.clone());
    (config_api, action_log_repo)
}

#[test]
fn test_list_configs_sorted_by_key() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    insert_test_config(&conn).expect("Failed to insert test config");
    drop(conn);

    let (config_api, _) = setup_config_api(&db_path);
    let configs = config_api.list_configs().unwrap();
    assert_eq!(configs.len(), 3);
    let keys: Vec<&str> = configs.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "default_currency",
            "low_stock_threshold",
            "recent_actions_limit"
        ]
    );
}

#[test]
fn test_update_config_persists_and_logs() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    insert_test_config(&conn).expect("Failed to insert test config");
    drop(conn);

    let (config_api, action_log_repo) = setup_config_api(&db_path);

    config_api
        .update_config(
            "global",
            "low_stock_threshold",
            "15",
            "管理员",
            "雨季提高备货水位",
        )
        .expect("update_config should succeed");

    let item = config_api
        .get_config("global", "low_stock_threshold")
        .unwrap()
        .unwrap();
    assert_eq!(item.value, "15");

    // 配置变更必须留痕
    let logs = action_log_repo
        .find_by_action_type("UpdateConfig", 10)
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].actor, "管理员");
    let payload = logs[0].payload_json.as_ref().unwrap();
    assert_eq!(payload["key"], "low_stock_threshold");
    assert_eq!(payload["reason"], "雨季提高备货水位");
}

#[test]
fn test_update_config_rejects_blank_fields() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let (config_api, _) = setup_config_api(&db_path);

    let result = config_api.update_config("", "low_stock_threshold", "15", "管理员", "原因");
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));

    let result = config_api.update_config("global", "  ", "15", "管理员", "原因");
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));

    let result = config_api.update_config("global", "low_stock_threshold", "15", "管理员", "   ");
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}

#[test]
fn test_restore_from_snapshot_via_api() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = test_helpers::open_test_connection(&db_path).expect("Failed to open db");
    insert_test_config(&conn).expect("Failed to insert test config");

    let (config_api, action_log_repo) = setup_config_api(&db_path);

    let snapshot = config_api.get_config_snapshot().unwrap();

    conn.execute(
        "UPDATE config_kv SET value = 'USD' WHERE scope_id = 'global' AND key = 'default_currency'",
        [],
    )
    .expect("Failed to update config");

    let restored = config_api
        .restore_from_snapshot(&snapshot, "管理员", "配置误改回退")
        .expect("restore_from_snapshot should succeed");
    assert!(restored >= 3);

    let item = config_api
        .get_config("global", "default_currency")
        .unwrap()
        .unwrap();
    assert_eq!(item.value, "CNY");

    // 恢复操作同样留痕
    let logs = action_log_repo
        .find_by_action_type("UpdateConfig", 10)
        .unwrap();
    assert_eq!(logs.len(), 1);

    // 参数校验
    let result = config_api.restore_from_snapshot("  ", "管理员", "原因");
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    let result = config_api.restore_from_snapshot(&snapshot, "管理员", "");
    assert!(matches!(result, Err(ApiError::InvalidInput(_))));
}
