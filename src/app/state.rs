// ==========================================
// 物资调拨审批系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ApprovalApi, ConfigApi, DashboardApi, RequestApi, StockApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::importer::CatalogImporter;
use crate::repository::{
    ActionLogRepository, AllocationItemRepository, AllocationRequestRepository, ProductRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 申请提交API
    pub request_api: Arc<RequestApi>,

    /// 审批API
    pub approval_api: Arc<ApprovalApi>,

    /// 物资目录与库存API
    pub stock_api: Arc<StockApi>,

    /// 审批看板API
    pub dashboard_api: Arc<DashboardApi>,

    /// 配置管理API
    pub config_api: Arc<ConfigApi>,

    /// 物资目录导入器
    pub catalog_importer: Arc<CatalogImporter>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库连接并初始化 schema（幂等）
    /// 2. 初始化所有Repository
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("初始化数据库schema失败: {}", e))?;

        // schema 版本仅做告警，不做自动迁移
        match read_schema_version(&conn) {
            Ok(Some(v)) if v != CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    "数据库schema_version={}与代码期望{}不一致，请确认数据库来源",
                    v,
                    CURRENT_SCHEMA_VERSION
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("读取schema_version失败(将继续启动): {}", e);
            }
        }

        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================

        let request_repo = Arc::new(AllocationRequestRepository::new(conn.clone()));
        let item_repo = Arc::new(AllocationItemRepository::new(conn.clone()));
        let product_repo = Arc::new(ProductRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        // 配置管理器
        let config_manager = Arc::new(
            ConfigManager::new(&db_path)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================

        // 申请提交API
        let request_api = Arc::new(RequestApi::new(
            request_repo.clone(),
            item_repo.clone(),
            product_repo.clone(),
            action_log_repo.clone(),
        ));

        // 审批API
        let approval_api = Arc::new(ApprovalApi::new(
            request_repo.clone(),
            product_repo.clone(),
            action_log_repo.clone(),
        ));

        // 物资目录与库存API
        let stock_api = Arc::new(StockApi::new(
            product_repo.clone(),
            action_log_repo.clone(),
            config_manager.clone(),
        ));

        // 审批看板API
        let dashboard_api = Arc::new(DashboardApi::new(
            request_repo,
            item_repo,
            product_repo.clone(),
            action_log_repo.clone(),
            config_manager.clone(),
        ));

        // 配置管理API
        let config_api = Arc::new(ConfigApi::new(
            conn.clone(),
            config_manager,
            action_log_repo.clone(),
        ));

        // 物资目录导入器
        let catalog_importer = Arc::new(CatalogImporter::new(
            product_repo,
            action_log_repo.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            request_api,
            approval_api,
            stock_api,
            dashboard_api,
            config_api,
            catalog_importer,
            action_log_repo,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 开发环境: 用户数据目录/allocation-approval-dev/allocation_approval.db
/// - 生产环境: 用户数据目录/allocation-approval/allocation_approval.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("ALLOCATION_APPROVAL_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    // 使用用户数据目录，避免在工作区里散落数据库文件。
    // 先给一个默认回退值，后续如果能拿到 data_dir 再覆盖。
    let mut path = PathBuf::from("./allocation_approval.db");

    // 尝试获取用户数据目录
    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("allocation-approval-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("allocation-approval");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("allocation_approval.db");

        // 开发环境：如果目标 DB 不存在，但项目根目录有种子库（reset_and_seed_demo_db 生成），则复制一份
        #[cfg(debug_assertions)]
        {
            if !path.exists() {
                let seed = PathBuf::from("./allocation_approval.db");
                if seed.exists() {
                    // best-effort: 复制失败不阻塞启动（后续会自动创建空库并建表）
                    let _ = std::fs::copy(seed, &path);
                }
            }
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    // 注意：AppState::new() 的测试需要真实的数据库文件
    // 这些测试应该在集成测试中进行
}
