// ==========================================
// 并发决策测试
// ==========================================
// 测试目标: 同一暂存导入的并发确认 / 取消只有一个生效
// ==========================================


use futures::future::join_all;
use peer_review_import::importer::{ImportError, StagedImporter};
use peer_review_import::logging;
use peer_review_import::{ImportDecision, StagingStatus, SubmitOutcome};
use std::sync::Arc;
use test_helpers::{create_fixture, users_csv};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirms_apply_once() {
    logging::init_test();
    let fx = Arc::new(create_fixture(|_| {}));

    let outcome = fx
        .importer
        .submit("users", users_csv(20).as_bytes())
        .await
        .unwrap();
    let id = outcome.staging_id().cloned().expect("应该已暂存");

    let tasks = (0..8).map(|_| {
        let fx = fx.clone();
        let id = id.clone();
        tokio::spawn(async move { fx.importer.decide(&id, ImportDecision::Confirm).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("任务不应 panic"))
        .collect();

    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1, "只有一个确认可以生效");

    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(
                result,
                ImportError::DecisionInProgress { .. }
                    | ImportError::InvalidTransition {
                        status: StagingStatus::Committed,
                        ..
                    }
            ),
            "意外的错误: {}",
            result
        );
    }

    // 每条记录恰好写入一次
    assert_eq!(fx.users.calls(), 20);
    assert_eq!(fx.users.created().len(), 20);
    assert_eq!(fx.storage.delete_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_confirm_and_cancel_race_has_single_winner() {
    logging::init_test();
    let fx = Arc::new(create_fixture(|_| {}));

    let outcome = fx
        .importer
        .submit("users", users_csv(10).as_bytes())
        .await
        .unwrap();
    let id = match outcome {
        SubmitOutcome::Staged { staging_id, .. } => staging_id,
        SubmitOutcome::Rejected(e) => panic!("不应拒绝: {}", e),
    };

    let confirm = {
        let fx = fx.clone();
        let id = id.clone();
        tokio::spawn(async move { fx.importer.decide(&id, ImportDecision::Confirm).await })
    };
    let cancel = {
        let fx = fx.clone();
        let id = id.clone();
        tokio::spawn(async move { fx.importer.decide(&id, ImportDecision::Cancel).await })
    };

    let confirm = confirm.await.unwrap();
    let cancel = cancel.await.unwrap();

    match (&confirm, &cancel) {
        (Ok(commit), Err(_)) => {
            assert_eq!(commit.status, StagingStatus::Committed);
            assert_eq!(fx.users.calls(), 10);
        }
        (Err(_), Ok(cancelled)) => {
            assert_eq!(cancelled.status, StagingStatus::Cancelled);
            assert_eq!(fx.users.calls(), 0, "取消生效时不应写入任何记录");
        }
        other => panic!("应该恰好一个决策生效: {:?}", other),
    }

    // 失败方再也无法改变终态
    let recent = fx.importer.list_recent().await.unwrap();
    assert!(recent[0].status.is_terminal());
    assert_eq!(fx.storage.delete_count(), 1);
}
