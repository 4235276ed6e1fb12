// ==========================================
// 工程物资调拨审批系统 - 主入口
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 审批决策支持
// ==========================================
// 启动后打印审批队列概览, 作为值班审批人的状态速览

use allocation_approval::app::{get_default_db_path, AppState};
use allocation_approval::i18n::t;

fn main() {
    // 初始化日志系统
    allocation_approval::logging::init();

    println!("==================================================");
    println!("{}", allocation_approval::APP_NAME);
    println!("系统版本: {}", allocation_approval::VERSION);
    println!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    // 创建AppState
    let app_state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("无法初始化AppState: {}", e);
            std::process::exit(1);
        }
    };

    // 审批队列概览
    match app_state.dashboard_api.get_queue_summary() {
        Ok(summary) => {
            println!();
            println!(
                "审批队列: 待审批{} | 部分批准{} | 已批准{} | 已驳回{}",
                summary.pending_count,
                summary.partially_approved_count,
                summary.approved_count,
                summary.rejected_count
            );
            println!(
                "未了结口径: 待定{}件, 已批金额{:.2}",
                summary.open_pending_qty, summary.open_approved_value
            );
            println!(
                "物资目录: {}种物资, 低库存{}种",
                summary.product_count, summary.low_stock_count
            );
            if summary.open_request_count == 0 {
                println!();
                println!("{}", t("approval.queue_empty"));
            }
        }
        Err(e) => {
            tracing::error!("查询审批队列概览失败: {}", e);
        }
    }

    // 待处理申请 (按提交时间排队)
    match app_state.dashboard_api.list_open_requests() {
        Ok(open) if !open.is_empty() => {
            println!();
            println!("待处理申请:");
            for request in &open {
                println!(
                    "  [{}] {} | 项目: {} | 申请人: {} | 提交于 {}",
                    request.status.to_db_str(),
                    request.request_id,
                    request.project_name,
                    request.requested_by,
                    request.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("查询待处理申请失败: {}", e);
        }
    }

    // 最近操作
    match app_state.dashboard_api.get_recent_actions(Some(5)) {
        Ok(actions) if !actions.is_empty() => {
            println!();
            println!("最近操作:");
            for log in &actions {
                println!(
                    "  {} | {} | {} | {}",
                    log.action_ts.format("%m-%d %H:%M"),
                    log.action_type,
                    log.actor,
                    log.detail.as_deref().unwrap_or("-")
                );
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("查询最近操作失败: {}", e);
        }
    }
}
