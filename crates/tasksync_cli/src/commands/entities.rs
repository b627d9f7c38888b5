//! Tasks and lists commands.

use tasksync_model::{DeleteState, Task, TaskList};
use tasksync_store::{LocalStore, Scope};

/// Prints non-tombstoned tasks, optionally of one list.
pub fn tasks(store: &LocalStore, list_id: Option<&str>) {
    let tasks = match list_id {
        Some(list_id) => store.tasks_in_list(list_id),
        None => store.tasks(&Scope::All),
    };
    print!("{}", render_tasks(&tasks));
}

/// Prints non-tombstoned task lists.
pub fn lists(store: &LocalStore) {
    print!("{}", render_lists(&store.task_lists(&Scope::All)));
}

/// One line per task.
pub fn render_tasks(tasks: &[Task]) -> String {
    let mut out = String::new();
    for task in tasks {
        let mark = if task.completed { "x" } else { " " };
        out.push_str(&format!(
            "[{mark}] {:<24} {:>3}  {}  {}{}\n",
            task.quadrant,
            task.order,
            task.id,
            task.text,
            suffix(task.deleted, task.owner_id.as_deref()),
        ));
    }
    out.push_str(&format!("{} task(s)\n", tasks.len()));
    out
}

/// One line per list; the active list is starred.
pub fn render_lists(lists: &[TaskList]) -> String {
    let mut out = String::new();
    for list in lists {
        let mark = if list.is_active { "*" } else { " " };
        out.push_str(&format!(
            "{mark} {}  {}{}\n",
            list.id,
            list.name,
            suffix(list.deleted, list.owner_id.as_deref()),
        ));
    }
    out.push_str(&format!("{} list(s)\n", lists.len()));
    out
}

fn suffix(deleted: DeleteState, owner: Option<&str>) -> String {
    let mut out = String::new();
    if deleted == DeleteState::SoftDeleted {
        out.push_str("  (deleted)");
    }
    if owner.is_none() {
        out.push_str("  (unclaimed)");
    }
    out
}
