// ==========================================
// 演示数据库重建与填充
// ==========================================
// 用法: cargo run --bin reset_and_seed_demo_db [db_path]
// 说明: 已有数据库会先备份为 *.bak.<时间戳> 再重建
// ==========================================

use chrono::{Duration, Local};
use rusqlite::{params, Connection};
use std::error::Error;
use std::fs;
use std::path::Path;

use allocation_approval::app::get_default_db_path;
use allocation_approval::db::{init_schema, open_sqlite_connection};

fn main() -> Result<(), Box<dyn Error>> {
    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);

    backup_and_reset_db(&db_path)?;

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    seed_demo_data(&conn)?;

    print_quick_counts(&conn)?;

    eprintln!("演示数据库已生成: {}", db_path);
    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

fn seed_demo_data(conn: &Connection) -> Result<(), Box<dyn Error>> {
    let now = Local::now().naive_local();
    let now_sql = now.format("%Y-%m-%d %H:%M:%S").to_string();
    let days_ago = |d: i64| {
        (now - Duration::days(d))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    };

    let tx = conn.unchecked_transaction()?;

    // ==========================================
    // 全局配置默认值
    // ==========================================
    tx.execute(
        "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global','low_stock_threshold','10',?1)",
        params![now_sql],
    )?;
    tx.execute(
        "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global','recent_actions_limit','20',?1)",
        params![now_sql],
    )?;
    tx.execute(
        "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global','default_currency','CNY',?1)",
        params![now_sql],
    )?;

    // ==========================================
    // 物资目录与库存
    // ==========================================
    let products = [
        ("P001", "螺纹钢HRB400", "钢材", "吨", 4200.0, 450),
        ("P002", "硅酸盐水泥42.5", "水泥", "吨", 380.0, 1200),
        ("P003", "中砂", "砂石", "立方米", 120.0, 2600),
        ("P004", "木模板1830x915", "模板", "张", 58.0, 900),
        ("P005", "脚手架扣件", "周转材料", "个", 6.5, 15000),
        ("P006", "电缆YJV-4x50", "机电", "米", 85.0, 3),
        ("P007", "防水卷材SBS", "防水", "卷", 310.0, 80),
        ("P008", "安全帽", "劳保", "件", 25.0, 8),
    ];
    for (id, name, category, unit, price, stock) in products {
        tx.execute(
            r#"
            INSERT INTO product (
                product_id, product_name, category, unit, unit_price,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![id, name, category, unit, price, days_ago(30), days_ago(30)],
        )?;
        tx.execute(
            "INSERT INTO stock_level (product_id, available_qty, updated_at) VALUES (?1, ?2, ?3)",
            params![id, stock, days_ago(1)],
        )?;
    }

    // ==========================================
    // 调拨申请: 待审批
    // ==========================================
    // P006 库存(3) < 申请量(10), 默认批准会被可用量压下来, 用于演示部分批准
    tx.execute(
        r#"
        INSERT INTO allocation_request (
            request_id, project_name, requested_by, status,
            manager_notes, decided_by, decided_at, created_at, revision
        ) VALUES (?1, ?2, ?3, 'PENDING', NULL, NULL, NULL, ?4, 0)
        "#,
        params!["REQ-DEMO-001", "市政大楼项目", "张三", days_ago(2)],
    )?;
    let pending_items = [
        ("ITEM-DEMO-001", "P001", 50i64, 4200.0),
        ("ITEM-DEMO-002", "P002", 200, 380.0),
        ("ITEM-DEMO-003", "P006", 10, 85.0),
    ];
    for (item_id, product_id, qty, price) in pending_items {
        tx.execute(
            r#"
            INSERT INTO allocation_line_item (
                item_id, request_id, product_id, requested_qty,
                approved_qty, pending_qty, unit_price, status, note,
                created_at, updated_at
            ) VALUES (?1, 'REQ-DEMO-001', ?2, ?3, 0, ?3, ?4, 'PENDING', NULL, ?5, ?5)
            "#,
            params![item_id, product_id, qty, price, days_ago(2)],
        )?;
    }

    // ==========================================
    // 调拨申请: 部分批准 (等待下一轮)
    // ==========================================
    tx.execute(
        r#"
        INSERT INTO allocation_request (
            request_id, project_name, requested_by, status,
            manager_notes, decided_by, decided_at, created_at, revision
        ) VALUES (?1, ?2, ?3, 'PARTIALLY_APPROVED', ?4, '王经理', ?5, ?6, 1)
        "#,
        params![
            "REQ-DEMO-002",
            "河堤加固工程",
            "李四",
            "首批先发一半, 余量等补货",
            days_ago(3),
            days_ago(5)
        ],
    )?;
    tx.execute(
        r#"
        INSERT INTO allocation_line_item (
            item_id, request_id, product_id, requested_qty,
            approved_qty, pending_qty, unit_price, status, note,
            created_at, updated_at
        ) VALUES ('ITEM-DEMO-004', 'REQ-DEMO-002', 'P002', 300, 150, 150, 380.0,
                  'PARTIALLY_APPROVED', '150 approved, 150 pending', ?1, ?2)
        "#,
        params![days_ago(5), days_ago(3)],
    )?;
    tx.execute(
        r#"
        INSERT INTO allocation_line_item (
            item_id, request_id, product_id, requested_qty,
            approved_qty, pending_qty, unit_price, status, note,
            created_at, updated_at
        ) VALUES ('ITEM-DEMO-005', 'REQ-DEMO-002', 'P004', 200, 200, 0, 58.0,
                  'APPROVED', NULL, ?1, ?2)
        "#,
        params![days_ago(5), days_ago(3)],
    )?;

    // ==========================================
    // 调拨申请: 已批准 (终态)
    // ==========================================
    tx.execute(
        r#"
        INSERT INTO allocation_request (
            request_id, project_name, requested_by, status,
            manager_notes, decided_by, decided_at, created_at, revision
        ) VALUES (?1, ?2, ?3, 'APPROVED', NULL, '王经理', ?4, ?5, 1)
        "#,
        params!["REQ-DEMO-003", "地铁口改造", "赵工", days_ago(6), days_ago(7)],
    )?;
    tx.execute(
        r#"
        INSERT INTO allocation_line_item (
            item_id, request_id, product_id, requested_qty,
            approved_qty, pending_qty, unit_price, status, note,
            created_at, updated_at
        ) VALUES ('ITEM-DEMO-006', 'REQ-DEMO-003', 'P005', 2000, 2000, 0, 6.5,
                  'APPROVED', NULL, ?1, ?2)
        "#,
        params![days_ago(7), days_ago(6)],
    )?;

    // ==========================================
    // 调拨申请: 已驳回 (终态)
    // ==========================================
    tx.execute(
        r#"
        INSERT INTO allocation_request (
            request_id, project_name, requested_by, status,
            manager_notes, decided_by, decided_at, created_at, revision
        ) VALUES (?1, ?2, ?3, 'REJECTED', ?4, '王经理', ?5, ?6, 1)
        "#,
        params![
            "REQ-DEMO-004",
            "临时仓库搭建",
            "钱五",
            "项目暂停, 本期不发料",
            days_ago(8),
            days_ago(9)
        ],
    )?;
    tx.execute(
        r#"
        INSERT INTO allocation_line_item (
            item_id, request_id, product_id, requested_qty,
            approved_qty, pending_qty, unit_price, status, note,
            created_at, updated_at
        ) VALUES ('ITEM-DEMO-007', 'REQ-DEMO-004', 'P007', 40, 0, 40, 310.0,
                  'REJECTED', 'Rejected by manager', ?1, ?2)
        "#,
        params![days_ago(9), days_ago(8)],
    )?;

    // ==========================================
    // 操作日志
    // ==========================================
    let logs = [
        (
            "LOG-DEMO-001",
            Some("REQ-DEMO-004"),
            "SubmitRequest",
            days_ago(9),
            "钱五",
            "提交调拨申请: 项目临时仓库搭建, 1条明细, 合计40件",
        ),
        (
            "LOG-DEMO-002",
            Some("REQ-DEMO-004"),
            "RejectDecision",
            days_ago(8),
            "王经理",
            "审批驳回: 1条明细全部归零待定",
        ),
        (
            "LOG-DEMO-003",
            Some("REQ-DEMO-003"),
            "SubmitRequest",
            days_ago(7),
            "赵工",
            "提交调拨申请: 项目地铁口改造, 1条明细, 合计2000件",
        ),
        (
            "LOG-DEMO-004",
            Some("REQ-DEMO-003"),
            "ApproveDecision",
            days_ago(6),
            "王经理",
            "审批通过: 整单状态APPROVED, 本轮批准2000件, 金额13000.00",
        ),
        (
            "LOG-DEMO-005",
            Some("REQ-DEMO-002"),
            "SubmitRequest",
            days_ago(5),
            "李四",
            "提交调拨申请: 项目河堤加固工程, 2条明细, 合计500件",
        ),
        (
            "LOG-DEMO-006",
            Some("REQ-DEMO-002"),
            "ApproveDecision",
            days_ago(3),
            "王经理",
            "审批通过: 整单状态PARTIALLY_APPROVED, 本轮批准350件, 金额68600.00",
        ),
        (
            "LOG-DEMO-007",
            Some("REQ-DEMO-001"),
            "SubmitRequest",
            days_ago(2),
            "张三",
            "提交调拨申请: 项目市政大楼项目, 3条明细, 合计260件",
        ),
        (
            "LOG-DEMO-008",
            None,
            "Restock",
            days_ago(1),
            "库管员",
            "补货: 物资P002入库500件, 现有1200件",
        ),
    ];
    for (action_id, request_id, action_type, ts, actor, detail) in logs {
        tx.execute(
            r#"
            INSERT INTO action_log (
                action_id, request_id, action_type, action_ts, actor,
                payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)
            "#,
            params![action_id, request_id, action_type, ts, actor, detail],
        )?;
    }

    tx.commit()?;
    Ok(())
}

fn print_quick_counts(conn: &Connection) -> Result<(), Box<dyn Error>> {
    let tables = [
        "product",
        "stock_level",
        "allocation_request",
        "allocation_line_item",
        "action_log",
        "config_kv",
    ];

    eprintln!("Row counts:");
    for t in tables {
        let sql = format!("SELECT COUNT(*) FROM {}", t);
        let c: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        eprintln!("  {:<24} {}", t, c);
    }

    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM allocation_request GROUP BY status ORDER BY status",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    eprintln!("Request status:");
    for row in rows {
        let (status, count) = row?;
        eprintln!("  {:<24} {}", status, count);
    }

    Ok(())
}
