// ==========================================
// 并发控制测试
// ==========================================
// 职责: 验证审批落库的乐观锁串行化
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod concurrent_control_test {
    use allocation_approval::api::RequestApi;
    use allocation_approval::domain::allocation::NewRequestItem;
    use allocation_approval::domain::product::Product;
    use allocation_approval::domain::types::RequestStatus;
    use allocation_approval::engine::ApprovalSession;
    use allocation_approval::repository::{
        action_log_repo::ActionLogRepository,
        allocation_repo::{AllocationItemRepository, AllocationRequestRepository},
        product_repo::ProductRepository,
    };
    use chrono::Utc;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use tempfile::NamedTempFile;

    use crate::test_helpers::create_test_db;

    // ==========================================
    // 测试辅助函数
    // ==========================================

    /// 创建测试环境
    fn setup_test_env() -> (
        NamedTempFile,
        Arc<RequestApi>,
        Arc<AllocationRequestRepository>,
        Arc<ProductRepository>,
    ) {
        let (temp_file, db_path) = create_test_db().unwrap();

        let conn = Arc::new(Mutex::new(Connection::open(&db_path).unwrap()));
        let request_repo = Arc::new(AllocationRequestRepository::new(conn.clone()));
        let item_repo = Arc::new(AllocationItemRepository::new(conn.clone()));
        let product_repo = Arc::new(ProductRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn));

        let request_api = Arc::new(RequestApi::new(
            request_repo.clone(),
            item_repo,
            product_repo.clone(),
            action_log_repo,
        ));

        (temp_file, request_api, request_repo, product_repo)
    }

    /// 入库一条物资 (库存30吨)
    fn seed_steel(product_repo: &ProductRepository, stock: i64) {
        let now = Utc::now().naive_utc();
        let product = Product {
            product_id: "P-STEEL".to_string(),
            product_name: "螺纹钢HRB400".to_string(),
            category: Some("钢材".to_string()),
            unit: Some("吨".to_string()),
            unit_price: 4200.0,
            created_at: now,
            updated_at: now,
        };
        product_repo.upsert_with_stock(&product, stock).unwrap();
    }

    /// 提交一条申请 (钢材50吨,库存只有30)
    fn submit_steel_request(request_api: &RequestApi) -> String {
        request_api
            .submit_request(
                "并发测试项目",
                "张三",
                vec![NewRequestItem {
                    product_id: "P-STEEL".to_string(),
                    quantity: 50,
                }],
            )
            .unwrap()
    }

    // ==========================================
    // 测试1: 乐观锁冲突测试
    // ==========================================

    #[test]
    fn test_optimistic_lock_conflict() {
        let (_temp_file, request_api, request_repo, product_repo) = setup_test_env();
        seed_steel(&product_repo, 30);
        let request_id = submit_steel_request(&request_api);

        // 1. 两个审批人同时开启会话(都读到revision=0)
        let session1 = ApprovalSession::begin(request_repo.as_ref(), &request_id).unwrap();
        let session2 = ApprovalSession::begin(request_repo.as_ref(), &request_id).unwrap();

        // 2. 审批人A先落库(应该成功)
        let payload1 = session1.submit_approve("审批人A", None).unwrap();
        let result1 = request_repo.persist_decision(&payload1);
        assert!(result1.is_ok(), "第一次落库应该成功");

        // 3. 审批人B再落库(应该失败,revision已变化)
        let payload2 = session2.submit_approve("审批人B", None).unwrap();
        let result2 = request_repo.persist_decision(&payload2);
        assert!(result2.is_err(), "第二次落库应该失败(乐观锁冲突)");

        // 验证错误类型
        let err_msg = result2.unwrap_err().to_string();
        assert!(
            err_msg.contains("乐观锁冲突") || err_msg.contains("OptimisticLock"),
            "错误应该是乐观锁冲突: {}",
            err_msg
        );

        // 4. 只有A的决定生效: revision加1,库存只扣一次
        let request = request_repo.find_by_id(&request_id).unwrap().unwrap();
        assert_eq!(request.revision, 1);
        assert_eq!(request.status, RequestStatus::PartiallyApproved);
        assert_eq!(request.decided_by.as_deref(), Some("审批人A"));

        let snapshot = request_repo.load_snapshot(&request_id).unwrap();
        assert_eq!(snapshot.items[0].item.approved_qty, 30);
        assert_eq!(snapshot.items[0].item.pending_qty, 20);
        assert_eq!(snapshot.items[0].available_qty, 0);

        println!("✅ 乐观锁冲突测试通过");
    }

    // ==========================================
    // 测试2: 多线程并发落库测试
    // ==========================================

    #[test]
    fn test_concurrent_decision_persists() {
        let (_temp_file, request_api, request_repo, product_repo) = setup_test_env();
        seed_steel(&product_repo, 30);
        let request_id = submit_steel_request(&request_api);

        // 1. 先在主线程开启全部会话,保证每个线程都持有revision=0的快照
        let thread_count = 5;
        let sessions: Vec<ApprovalSession> = (0..thread_count)
            .map(|_| ApprovalSession::begin(request_repo.as_ref(), &request_id).unwrap())
            .collect();

        // 2. 多线程同时提交并落库
        let mut handles = vec![];
        for (i, session) in sessions.into_iter().enumerate() {
            let request_repo_clone = request_repo.clone();

            let handle = thread::spawn(move || -> Result<(), String> {
                let payload = session
                    .submit_approve(&format!("审批人{}", i), None)
                    .map_err(|e| format!("{:?}", e))?;
                request_repo_clone
                    .persist_decision(&payload)
                    .map_err(|e| e.to_string())
            });

            handles.push(handle);
        }

        // 3. 等待所有线程完成
        let mut success_count = 0;
        let mut failure_messages = vec![];

        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => success_count += 1,
                Err(msg) => failure_messages.push(msg),
            }
        }

        // 4. 应该只有1个线程成功,其他线程因乐观锁冲突失败
        assert_eq!(success_count, 1, "应该只有1个线程落库成功");
        assert_eq!(
            failure_messages.len(),
            thread_count - 1,
            "其他线程应该因乐观锁冲突失败"
        );
        for msg in &failure_messages {
            assert!(
                msg.contains("乐观锁冲突") || msg.contains("OptimisticLock"),
                "失败原因应该是乐观锁冲突: {}",
                msg
            );
        }

        // 5. 决定只应用一次: revision=1,库存只扣30
        let request = request_repo.find_by_id(&request_id).unwrap().unwrap();
        assert_eq!(request.revision, 1);
        assert_eq!(request.status, RequestStatus::PartiallyApproved);

        let snapshot = request_repo.load_snapshot(&request_id).unwrap();
        assert_eq!(snapshot.items[0].item.approved_qty, 30);
        assert_eq!(snapshot.items[0].item.pending_qty, 20);
        assert_eq!(snapshot.items[0].available_qty, 0);

        println!(
            "✅ 多线程并发落库测试通过: {}个线程中1个成功,{}个失败",
            thread_count,
            failure_messages.len()
        );
    }

    // ==========================================
    // 测试3: 冲突后重开会话继续续批
    // ==========================================

    #[test]
    fn test_restart_session_after_conflict() {
        let (_temp_file, request_api, request_repo, product_repo) = setup_test_env();
        seed_steel(&product_repo, 30);
        let request_id = submit_steel_request(&request_api);

        // 1. 制造一次冲突: 落库方胜出,另一方失败
        let winner = ApprovalSession::begin(request_repo.as_ref(), &request_id).unwrap();
        let loser = ApprovalSession::begin(request_repo.as_ref(), &request_id).unwrap();
        request_repo
            .persist_decision(&winner.submit_approve("审批人A", None).unwrap())
            .unwrap();
        let stale = loser.submit_approve("审批人B", None).unwrap();
        assert!(request_repo.persist_decision(&stale).is_err());

        // 2. 到货补库后,失败方丢弃旧会话重新开启
        product_repo.restock("P-STEEL", 15).unwrap();

        let retry = ApprovalSession::begin(request_repo.as_ref(), &request_id).unwrap();
        assert_eq!(retry.request_revision(), 1);
        assert!(retry.is_partial_round());
        // 续批轮申请数量 = 上轮剩余待定
        assert_eq!(retry.statistics().requested_qty, 20);
        assert_eq!(retry.statistics().approved_qty, 15);

        // 3. 基于最新revision落库成功
        let payload = retry.submit_approve("审批人B", None).unwrap();
        request_repo.persist_decision(&payload).unwrap();

        let request = request_repo.find_by_id(&request_id).unwrap().unwrap();
        assert_eq!(request.revision, 2);
        assert_eq!(request.status, RequestStatus::PartiallyApproved);
        assert_eq!(request.decided_by.as_deref(), Some("审批人B"));

        // 两轮累计: 30 + 15 = 45,仍差5
        let snapshot = request_repo.load_snapshot(&request_id).unwrap();
        assert_eq!(snapshot.items[0].item.approved_qty, 45);
        assert_eq!(snapshot.items[0].item.pending_qty, 5);
        assert_eq!(snapshot.items[0].available_qty, 0);

        println!("✅ 冲突后重开会话测试通过");
    }
}
