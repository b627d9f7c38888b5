//! Queue recovery commands.

use tasksync_engine::{status, SyncResult};
use tasksync_store::LocalStore;

/// Moves a failed item back to pending.
pub fn retry(store: &LocalStore, id: u64) -> SyncResult<()> {
    let item = status::retry_failed(store, id)?;
    println!(
        "✓ Queue item {} ({} {} {}) is pending again",
        item.id, item.action, item.entity_type, item.entity_id
    );
    Ok(())
}

/// Deletes an item.
pub fn discard(store: &LocalStore, id: u64) -> SyncResult<()> {
    let item = status::discard(store, id)?;
    println!("✓ Queue item {} ({}) discarded", item.id, item.status);
    Ok(())
}
