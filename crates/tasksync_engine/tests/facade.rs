//! Integration tests for the task and list operations of `TaskSync`.

use proptest::prelude::*;
use serde_json::json;
use std::time::Duration;
use tasksync_engine::{RemoteError, RetryConfig, SyncError};
use tasksync_model::{DeleteState, Payload, Quadrant, QueueAction, QueueStatus};
use tasksync_testkit::prelude::*;

const OWNER: &str = "user-1";

fn queued_harness() -> Harness {
    let h = Harness::with_config(test_config().with_drain_on_mutation(false));
    h.session.sign_in(OWNER);
    h
}

fn fields(value: serde_json::Value) -> Payload {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn new_tasks_go_to_the_end_of_their_bucket() {
    let h = queued_harness();
    let list = h.sync.add_task_list("Work").await.unwrap();
    let a = h.sync.add_task(&list.id, "a", Quadrant::UrgentImportant).await.unwrap();
    let b = h.sync.add_task(&list.id, "b", Quadrant::UrgentImportant).await.unwrap();
    let c = h.sync.add_task(&list.id, "c", Quadrant::NotUrgentImportant).await.unwrap();

    assert_eq!((a.order, b.order, c.order), (0, 1, 0));
    let texts: Vec<_> = h.sync.get_tasks(&list.id).into_iter().map(|t| t.text).collect();
    assert_eq!(texts, ["a", "b", "c"]);
}

#[tokio::test]
async fn empty_text_and_missing_list_are_rejected() {
    let h = queued_harness();
    let list = h.sync.add_task_list("Work").await.unwrap();

    let err = h.sync.add_task(&list.id, "  ", Quadrant::UrgentImportant).await;
    assert!(matches!(err, Err(SyncError::InvalidOperation(_))));

    let err = h.sync.add_task("nope", "x", Quadrant::UrgentImportant).await;
    assert!(matches!(err, Err(SyncError::NotFound { .. })));
    assert_eq!(h.store.queue_items().len(), 1);
}

#[tokio::test]
async fn update_merges_fields_and_queues_them() {
    let h = queued_harness();
    let list = h.sync.add_task_list("Work").await.unwrap();
    let task = h.sync.add_task(&list.id, "draft", Quadrant::UrgentImportant).await.unwrap();
    h.tick(500);

    let updated = h
        .sync
        .update_task(&task.id, fields(json!({ "completed": 1, "estimate": "2h" })))
        .await
        .unwrap();
    assert!(updated.completed);
    assert_eq!(updated.text, "draft");
    assert_eq!(updated.updated_at.millis_or_zero(), TEST_EPOCH + 500);
    assert_eq!(updated.created_at.millis_or_zero(), TEST_EPOCH);

    let item = h.queue(QueueStatus::Pending).pop().unwrap();
    assert_eq!(item.action, QueueAction::Update);
    assert_eq!(item.payload["completed"], json!(1));
    assert_eq!(item.payload["updatedAt"], json!(TEST_EPOCH + 500));
}

#[tokio::test]
async fn protected_fields_cannot_be_updated() {
    let h = queued_harness();
    let list = h.sync.add_task_list("Work").await.unwrap();
    let task = h.sync.add_task(&list.id, "x", Quadrant::UrgentImportant).await.unwrap();

    for field in ["id", "ownerId", "createdAt", "updatedAt", "deleted"] {
        let mut update = Payload::new();
        update.insert(field.to_string(), json!("v"));
        let result = h.sync.update_task(&task.id, update).await;
        assert!(matches!(result, Err(SyncError::InvalidOperation(_))), "{field}");
    }
    let result = h
        .sync
        .update_task_list(&list.id, fields(json!({ "isActive": 0 })))
        .await;
    assert!(matches!(result, Err(SyncError::InvalidOperation(_))));
}

#[tokio::test]
async fn soft_and_permanent_delete() {
    let h = queued_harness();
    let list = h.sync.add_task_list("Work").await.unwrap();
    let soft = h.sync.add_task(&list.id, "soft", Quadrant::UrgentImportant).await.unwrap();
    let hard = h.sync.add_task(&list.id, "hard", Quadrant::UrgentImportant).await.unwrap();

    h.sync.delete_task(&soft.id, false).await.unwrap();
    h.sync.delete_task(&hard.id, true).await.unwrap();

    assert_eq!(h.store.get_task(&soft.id).unwrap().deleted, DeleteState::SoftDeleted);
    assert_eq!(h.store.get_task(&hard.id).unwrap().deleted, DeleteState::Tombstoned);
    let visible: Vec<_> = h.sync.get_tasks(&list.id).into_iter().map(|t| t.id).collect();
    assert_eq!(visible, [soft.id.clone()]);

    // A tombstone cannot be touched again.
    let again = h.sync.delete_task(&hard.id, true).await;
    assert!(matches!(again, Err(SyncError::NotFound { .. })));

    let deletes: Vec<_> = h
        .queue(QueueStatus::Pending)
        .into_iter()
        .filter(|item| item.action == QueueAction::Delete)
        .map(|item| item.payload["deleted"].clone())
        .collect();
    assert_eq!(deletes, [json!(1), json!(2)]);
}

#[tokio::test]
async fn list_delete_skips_tasks_already_deleted() {
    let h = queued_harness();
    let list = h.sync.add_task_list("Work").await.unwrap();
    let live = h.sync.add_task(&list.id, "live", Quadrant::UrgentImportant).await.unwrap();
    let gone = h.sync.add_task(&list.id, "gone", Quadrant::UrgentImportant).await.unwrap();
    h.sync.delete_task(&gone.id, false).await.unwrap();
    let before = h.store.queue_items().len();

    h.sync.delete_task_list(&list.id, false).await.unwrap();

    let items = h.store.queue_items();
    let added: Vec<_> = items[before..].iter().map(|i| i.entity_id.clone()).collect();
    assert_eq!(added, [list.id.clone(), live.id.clone()]);
    assert_eq!(items[before].payload["isActive"], json!(0));
    assert!(h.sync.active_task_list().is_none());
}

#[tokio::test]
async fn reorder_rewrites_only_moved_tasks() {
    let h = queued_harness();
    let list = h.sync.add_task_list("Work").await.unwrap();
    let mut ids = Vec::new();
    for text in ["a", "b", "c"] {
        let task = h.sync.add_task(&list.id, text, Quadrant::UrgentImportant).await.unwrap();
        ids.push(task.id);
    }
    let before = h.store.queue_items().len();

    let order = vec![ids[0].clone(), ids[2].clone(), ids[1].clone()];
    let tasks = h
        .sync
        .reorder_tasks(&list.id, Quadrant::UrgentImportant, &order)
        .await
        .unwrap();

    let orders: Vec<_> = tasks.iter().map(|t| (t.text.as_str(), t.order)).collect();
    assert_eq!(orders, [("a", 0), ("c", 1), ("b", 2)]);
    assert_eq!(h.store.queue_items().len() - before, 2);
}

#[tokio::test]
async fn reorder_rejects_bad_input() {
    let h = queued_harness();
    let list = h.sync.add_task_list("Work").await.unwrap();
    let a = h.sync.add_task(&list.id, "a", Quadrant::UrgentImportant).await.unwrap();
    let other = h.sync.add_task(&list.id, "o", Quadrant::NotUrgentImportant).await.unwrap();

    let dup = h
        .sync
        .reorder_tasks(&list.id, Quadrant::UrgentImportant, &[a.id.clone(), a.id.clone()])
        .await;
    assert!(matches!(dup, Err(SyncError::InvalidOperation(_))));

    let foreign = h
        .sync
        .reorder_tasks(&list.id, Quadrant::UrgentImportant, &[other.id.clone(), a.id.clone()])
        .await;
    assert!(matches!(foreign, Err(SyncError::InvalidOperation(_))));
    assert_eq!(h.store.get_task(&a.id).unwrap().order, 0);
}

#[tokio::test]
async fn move_appends_to_target_bucket() {
    let h = queued_harness();
    let work = h.sync.add_task_list("Work").await.unwrap();
    let home = h.sync.add_task_list("Home").await.unwrap();
    h.sync.add_task(&home.id, "existing", Quadrant::NotUrgentNotImportant).await.unwrap();
    let task = h.sync.add_task(&work.id, "move me", Quadrant::UrgentImportant).await.unwrap();
    let before = h.store.queue_items().len();

    let moved = h
        .sync
        .move_task(&task.id, &home.id, Quadrant::NotUrgentNotImportant)
        .await
        .unwrap();
    assert_eq!(moved.list_id, home.id);
    assert_eq!(moved.order, 1);

    let item = h.store.queue_items().pop().unwrap();
    assert_eq!(item.payload["listId"], json!(home.id));
    assert_eq!(item.payload["quadrant"], json!("not_urgent_not_important"));
    assert_eq!(item.referenced_list_id(), Some(home.id.as_str()));

    // Moving to the same place changes nothing.
    h.sync
        .move_task(&task.id, &home.id, Quadrant::NotUrgentNotImportant)
        .await
        .unwrap();
    assert_eq!(h.store.queue_items().len(), before + 1);
}

#[tokio::test]
async fn adding_a_list_switches_the_active_one() {
    let h = queued_harness();
    let work = h.sync.add_task_list("Work").await.unwrap();
    let home = h.sync.add_task_list("Home").await.unwrap();

    assert!(!h.store.get_task_list(&work.id).unwrap().is_active);
    assert_eq!(h.sync.active_task_list().unwrap().id, home.id);

    let pending = h.queue(QueueStatus::Pending);
    assert_eq!(pending[1].entity_id, work.id);
    assert_eq!(pending[1].activation(), Some(false));
    assert_eq!(pending[2].entity_id, home.id);

    let before = pending.len();
    h.sync.set_active_task_list(&home.id).await.unwrap();
    assert_eq!(h.queue(QueueStatus::Pending).len(), before);

    h.sync.set_active_task_list(&work.id).await.unwrap();
    let pending = h.queue(QueueStatus::Pending);
    assert_eq!(pending[before].activation(), Some(false));
    assert_eq!(pending[before + 1].activation(), Some(true));
}

#[tokio::test]
async fn tombstones_are_purged_after_sync() {
    let h = Harness::signed_in(OWNER);
    let list = h.sync.add_task_list("Work").await.unwrap();
    let task = h.sync.add_task(&list.id, "x", Quadrant::UrgentImportant).await.unwrap();
    h.sync.delete_task(&task.id, true).await.unwrap();
    assert!(h.sync.get_sync_status().is_idle());

    h.tick(Duration::from_secs(31 * 24 * 3600).as_millis() as u64);
    let report = h.sync.purge_tombstones(Duration::from_secs(30 * 24 * 3600)).unwrap();

    assert_eq!(report.tasks, [task.id.clone()]);
    assert!(h.store.get_task(&task.id).is_none());
    assert!(h.store.get_task_list(&list.id).is_some());
}

#[tokio::test]
async fn reads_hide_other_owners() {
    let h = queued_harness();
    h.remote
        .put_task_list(remote_task_list("someone-else", "l-x", "Theirs", false, 0));
    let mine = h.sync.add_task_list("Mine").await.unwrap();

    h.session.sign_in("someone-else");
    assert!(h.sync.get_task_lists().iter().all(|l| l.id != mine.id));
    h.session.sign_in(OWNER);
    assert_eq!(h.sync.get_task_lists().len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn one_active_list_after_flaky_offline_drain(
        script in list_script_strategy(),
        calls in flaky_calls_strategy(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            // Enough attempts that the injected failures never exhaust an item.
            let config = test_config()
                .with_drain_on_mutation(false)
                .with_retry(RetryConfig::new(32).with_jitter(false));
            let h = Harness::with_config(config);
            h.session.sign_in(OWNER);

            let mut lists: Vec<String> = Vec::new();
            for step in &script {
                match step {
                    ListStep::Create => {
                        let list = h.sync.add_task_list("l").await.unwrap();
                        lists.push(list.id);
                    }
                    ListStep::Activate(i) if !lists.is_empty() => {
                        let id = lists[i % lists.len()].clone();
                        h.sync.set_active_task_list(&id).await.unwrap();
                    }
                    ListStep::Delete(i) if !lists.is_empty() => {
                        let id = lists.remove(i % lists.len());
                        h.sync.delete_task_list(&id, false).await.unwrap();
                    }
                    _ => {}
                }
            }

            for fails in &calls {
                if *fails {
                    h.remote.fail_next(RemoteError::network("connection reset"));
                } else {
                    h.remote.pass_next();
                }
            }

            let mut rounds = 0;
            while !h.queue(QueueStatus::Pending).is_empty() {
                rounds += 1;
                assert!(rounds <= calls.len() + 2, "queue did not settle");
                h.sync.drain().await.unwrap();
                assert!(h.remote.active_task_lists(OWNER).len() <= 1);
            }

            assert!(h.queue(QueueStatus::Failed).is_empty());
            let remote_active: Vec<String> = h
                .remote
                .active_task_lists(OWNER)
                .into_iter()
                .map(|l| l.id)
                .collect();
            let local_active: Vec<String> =
                h.sync.active_task_list().into_iter().map(|l| l.id).collect();
            assert_eq!(remote_active, local_active);
        });
    }
}
