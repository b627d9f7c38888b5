//! Purge-tombstones command implementation.

use tasksync_store::{LocalStore, PurgeReport};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Runs the purge-tombstones command.
pub fn run(
    store: &LocalStore,
    older_than_days: u64,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = purge(store, older_than_days, dry_run)?;

    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!("Tombstones older than {older_than_days} day(s):");
    println!("  Tasks:      {}", report.tasks.len());
    println!("  Task lists: {}", report.task_lists.len());
    for id in report.task_lists.iter().chain(&report.tasks) {
        println!("    {id}");
    }
    if !dry_run && report.total() > 0 {
        println!("✓ Purged {} entities", report.total());
    }
    Ok(())
}

/// Finds, and unless `dry_run` removes, tombstones older than the cutoff.
pub fn purge(
    store: &LocalStore,
    older_than_days: u64,
    dry_run: bool,
) -> tasksync_store::StoreResult<PurgeReport> {
    let age = i64::try_from(older_than_days)
        .unwrap_or(i64::MAX)
        .saturating_mul(DAY_MS);
    let cutoff = store.clock().now_millis().saturating_sub(age);

    if dry_run {
        Ok(store.read(|view| view.purgeable_tombstones(cutoff)))
    } else {
        store.purge_tombstones(cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tasksync_model::{Quadrant, Task, TaskList};
    use tasksync_testkit::TestStore;

    #[test]
    fn dry_run_reports_without_removing() {
        let store = TestStore::memory();
        let list = store.insert_task_list(TaskList::new("Work")).unwrap();
        let mut task = Task::new(&list.id, "old", Quadrant::UrgentImportant);
        task.deleted = tasksync_model::DeleteState::Tombstoned;
        let task = store.insert_task(task).unwrap();
        store.clock.advance(Duration::from_secs(10 * 24 * 3600));

        let preview = purge(&store, 7, true).unwrap();
        assert_eq!(preview.tasks, [task.id.clone()]);
        assert!(store.get_task(&task.id).is_some());

        assert_eq!(purge(&store, 30, false).unwrap().total(), 0);
        assert_eq!(purge(&store, 7, false).unwrap().total(), 1);
        assert!(store.get_task(&task.id).is_none());
    }
}
