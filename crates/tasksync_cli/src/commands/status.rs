//! Status command implementation.

use tasksync_engine::SyncStatus;
use tasksync_model::QueueItem;
use tasksync_store::LocalStore;

/// Runs the status command.
pub fn run(store: &LocalStore, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let status = SyncStatus::collect(store);
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        _ => {
            print!("{}", render_text(&status));
        }
    }
    Ok(())
}

/// Renders the status as a text report. Completed items are only counted.
pub fn render_text(status: &SyncStatus) -> String {
    let mut out = format!(
        "Queue status:\n  Pending:    {}\n  Processing: {}\n  Failed:     {}\n  Completed:  {}\n",
        status.pending.len(),
        status.processing.len(),
        status.failed.len(),
        status.completed.len(),
    );

    for (title, items) in [
        ("Pending", &status.pending),
        ("Processing", &status.processing),
        ("Failed", &status.failed),
    ] {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{title}:\n"));
        for item in items {
            out.push_str(&format!("  {}\n", render_item(item)));
        }
    }
    out
}

fn render_item(item: &QueueItem) -> String {
    let line = format!(
        "#{:<5} {:<7} {:<9} {}  retries={}",
        item.id, item.action, item.entity_type, item.entity_id, item.retry_count
    );
    match &item.last_error {
        Some(error) => format!("{line}  {error}"),
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasksync_model::{NewOperation, QueueStatus, TaskList};
    use tasksync_testkit::TestStore;

    #[test]
    fn text_report_lists_open_and_failed_items() {
        let store = TestStore::memory();
        let list = TaskList::new("Work");
        let first = store.enqueue(NewOperation::add(&list).unwrap()).unwrap();
        let second = store.enqueue(NewOperation::add(&list).unwrap()).unwrap();
        store
            .set_status(second.id, QueueStatus::Failed, Some("AUTH: JWT expired".into()))
            .unwrap();

        let text = render_text(&SyncStatus::collect(&store));
        assert!(text.contains("Pending:    1"));
        assert!(text.contains("Failed:     1"));
        assert!(text.contains(&format!("#{:<5}", first.id)));
        assert!(text.contains("AUTH: JWT expired"));
        assert!(!text.contains("Processing:\n"));
    }

    #[test]
    fn empty_queue_renders_only_counts() {
        let store = TestStore::memory();
        let text = render_text(&SyncStatus::collect(&store));
        assert_eq!(
            text,
            "Queue status:\n  Pending:    0\n  Processing: 0\n  Failed:     0\n  Completed:  0\n"
        );
    }

    #[test]
    fn item_line_ends_with_last_error() {
        let store = TestStore::memory();
        let item = store
            .enqueue(NewOperation::add(&TaskList::new("Work")).unwrap())
            .unwrap();
        assert!(render_item(&item).ends_with("retries=0"));

        let failed = store
            .set_status(item.id, QueueStatus::Failed, Some("NETWORK: reset".into()))
            .unwrap();
        assert!(render_item(&failed).ends_with("retries=0  NETWORK: reset"));
    }
}
