// ==========================================
// API集成测试辅助工具
// ==========================================
// 职责: 提供API层集成测试的通用辅助函数
// ==========================================

#[path = "../test_helpers.rs"]
mod test_helpers;

use std::sync::Arc;
use tempfile::NamedTempFile;

use allocation_approval::api::{
    ApiError, ApprovalApi, ConfigApi, DashboardApi, RequestApi, StockApi,
};
use allocation_approval::config::ConfigManager;
use allocation_approval::domain::{NewRequestItem, Product};
use allocation_approval::importer::CatalogImporter;
use allocation_approval::repository::{
    ActionLogRepository, AllocationItemRepository, AllocationRequestRepository, ProductRepository,
};

use rusqlite::Connection;
use std::sync::Mutex;

// ==========================================
// API测试环境
// ==========================================

/// API测试环境
///
/// 包含所有API实例和必要的依赖
pub struct ApiTestEnv {
    pub db_path: String,
    pub request_api: Arc<RequestApi>,
    pub approval_api: Arc<ApprovalApi>,
    pub stock_api: Arc<StockApi>,
    pub dashboard_api: Arc<DashboardApi>,
    pub config_api: Arc<ConfigApi>,
    pub catalog_importer: Arc<CatalogImporter>,

    // Repository层（用于测试数据准备与落库断言）
    pub request_repo: Arc<AllocationRequestRepository>,
    pub item_repo: Arc<AllocationItemRepository>,
    pub product_repo: Arc<ProductRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,

    // 临时文件（确保生命周期）
    _temp_file: NamedTempFile,
}

impl ApiTestEnv {
    /// 创建新的API测试环境
    ///
    /// # 说明
    /// - 使用临时数据库文件
    /// - 初始化所有Repository和API
    /// - 写入默认测试配置 (低库存阈值10等)
    pub fn new() -> Result<Self, String> {
        // 创建临时数据库文件并初始化schema
        let (temp_file, db_path) = test_helpers::create_test_db()
            .map_err(|e| format!("创建测试数据库失败: {}", e))?;

        // 初始化数据库连接
        let conn = Connection::open(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        test_helpers::insert_test_config(&conn)
            .map_err(|e| format!("写入测试配置失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================

        let request_repo = Arc::new(AllocationRequestRepository::new(conn.clone()));
        let item_repo = Arc::new(AllocationItemRepository::new(conn.clone()));
        let product_repo = Arc::new(ProductRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::new(&db_path).map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================

        let request_api = Arc::new(RequestApi::new(
            request_repo.clone(),
            item_repo.clone(),
            product_repo.clone(),
            action_log_repo.clone(),
        ));

        let approval_api = Arc::new(ApprovalApi::new(
            request_repo.clone(),
            product_repo.clone(),
            action_log_repo.clone(),
        ));

        let stock_api = Arc::new(StockApi::new(
            product_repo.clone(),
            action_log_repo.clone(),
            config_manager.clone(),
        ));

        let dashboard_api = Arc::new(DashboardApi::new(
            request_repo.clone(),
            item_repo.clone(),
            product_repo.clone(),
            action_log_repo.clone(),
            config_manager.clone(),
        ));

        let config_api = Arc::new(ConfigApi::new(
            conn.clone(),
            config_manager.clone(),
            action_log_repo.clone(),
        ));

        let catalog_importer = Arc::new(CatalogImporter::new(
            product_repo.clone(),
            action_log_repo.clone(),
        ));

        Ok(Self {
            db_path,
            request_api,
            approval_api,
            stock_api,
            dashboard_api,
            config_api,
            catalog_importer,
            request_repo,
            item_repo,
            product_repo,
            action_log_repo,
            _temp_file: temp_file,
        })
    }

    /// 预置测试物资目录
    ///
    /// # 参数
    /// - products: (物资ID, 名称, 单价, 可用库存) 列表
    pub fn seed_catalog(&self, products: &[(&str, &str, f64, i64)]) -> Result<(), String> {
        let now = chrono::Utc::now().naive_utc();
        for (product_id, product_name, unit_price, available_qty) in products {
            let product = Product {
                product_id: product_id.to_string(),
                product_name: product_name.to_string(),
                category: None,
                unit: None,
                unit_price: *unit_price,
                created_at: now,
                updated_at: now,
            };
            self.product_repo
                .upsert_with_stock(&product, *available_qty)
                .map_err(|e| format!("预置物资{}失败: {}", product_id, e))?;
        }
        Ok(())
    }

    /// 提交一张调拨申请并返回request_id
    ///
    /// # 参数
    /// - items: (物资ID, 申请数量) 列表
    pub fn submit_request(
        &self,
        project_name: &str,
        requested_by: &str,
        items: &[(&str, i64)],
    ) -> Result<String, String> {
        let inputs: Vec<NewRequestItem> = items
            .iter()
            .map(|(product_id, quantity)| NewRequestItem {
                product_id: product_id.to_string(),
                quantity: *quantity,
            })
            .collect();

        self.request_api
            .submit_request(project_name, requested_by, inputs)
            .map_err(|e| format!("提交申请失败: {}", e))
    }

    /// 查询物资当前可用库存
    pub fn stock_of(&self, product_id: &str) -> Result<i64, String> {
        let view = self
            .product_repo
            .find_with_stock(product_id)
            .map_err(|e| format!("查询库存失败: {}", e))?
            .ok_or_else(|| format!("物资{}不存在", product_id))?;
        Ok(view.available_qty)
    }
}

// ==========================================
// 错误断言辅助函数
// ==========================================

/// 验证是否为无效输入错误
pub fn assert_invalid_input(result: Result<impl std::fmt::Debug, ApiError>) {
    match result {
        Err(ApiError::InvalidInput(_)) => {
            // 预期的错误类型
        }
        Ok(val) => panic!("预期InvalidInput错误，但操作成功: {:?}", val),
        Err(e) => panic!("预期InvalidInput错误，但得到: {:?}", e),
    }
}

/// 验证是否为资源未找到错误
pub fn assert_not_found(result: Result<impl std::fmt::Debug, ApiError>) {
    match result {
        Err(ApiError::NotFound(_)) => {
            // 预期的错误类型
        }
        Ok(val) => panic!("预期NotFound错误，但操作成功: {:?}", val),
        Err(e) => panic!("预期NotFound错误，但得到: {:?}", e),
    }
}

/// 验证是否为数据验证失败错误（审批会话的拒绝理由）
pub fn assert_validation_error(result: Result<impl std::fmt::Debug, ApiError>) {
    match result {
        Err(ApiError::ValidationError(_)) => {
            // 预期的错误类型
        }
        Ok(val) => panic!("预期ValidationError错误，但操作成功: {:?}", val),
        Err(e) => panic!("预期ValidationError错误，但得到: {:?}", e),
    }
}

/// 验证是否为无效状态转换错误（终态申请重新进入审批）
pub fn assert_invalid_state_transition(result: Result<impl std::fmt::Debug, ApiError>) {
    match result {
        Err(ApiError::InvalidStateTransition { .. }) => {
            // 预期的错误类型
        }
        Ok(val) => panic!("预期InvalidStateTransition错误，但操作成功: {:?}", val),
        Err(e) => panic!("预期InvalidStateTransition错误，但得到: {:?}", e),
    }
}

// ==========================================
// ActionLog验证辅助函数
// ==========================================

/// 验证ActionLog是否已记录
///
/// # 说明
/// 检查最近的ActionLog是否包含指定的action_type
pub fn assert_action_logged(
    env: &ApiTestEnv,
    action_type: &str,
    expected_count: usize,
) -> Result<(), String> {
    let logs = env
        .action_log_repo
        .find_recent(100)
        .map_err(|e| format!("查询ActionLog失败: {}", e))?;

    let matching_logs: Vec<_> = logs
        .iter()
        .filter(|log| log.action_type == action_type)
        .collect();

    if matching_logs.len() < expected_count {
        return Err(format!(
            "预期至少{}条{}类型的ActionLog，实际找到{}条",
            expected_count,
            action_type,
            matching_logs.len()
        ));
    }

    Ok(())
}

/// 验证最近的ActionLog包含指定的operator
pub fn assert_action_has_operator(env: &ApiTestEnv, operator: &str) -> Result<(), String> {
    let logs = env
        .action_log_repo
        .find_recent(1)
        .map_err(|e| format!("查询ActionLog失败: {}", e))?;

    if logs.is_empty() {
        return Err("未找到任何ActionLog".to_string());
    }

    let latest_log = &logs[0];
    if latest_log.actor != operator {
        return Err(format!(
            "预期operator为{}，实际为{}",
            operator, latest_log.actor
        ));
    }

    Ok(())
}
