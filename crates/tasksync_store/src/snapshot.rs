//! In-memory store state and its CBOR snapshot encoding.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tasksync_model::{QueueItem, Task, TaskList};

/// Snapshot format version written by this crate.
pub const FORMAT_VERSION: u16 = 1;

/// Everything the store persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoreState {
    pub format_version: u16,
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,
    #[serde(default)]
    pub task_lists: BTreeMap<String, TaskList>,
    #[serde(default)]
    pub queue: BTreeMap<u64, QueueItem>,
    #[serde(default = "first_queue_id")]
    pub next_queue_id: u64,
    /// Last successful pull per owner (epoch ms).
    #[serde(default)]
    pub watermarks: BTreeMap<String, i64>,
}

fn first_queue_id() -> u64 {
    1
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            tasks: BTreeMap::new(),
            task_lists: BTreeMap::new(),
            queue: BTreeMap::new(),
            next_queue_id: first_queue_id(),
            watermarks: BTreeMap::new(),
        }
    }
}

impl StoreState {
    /// Encodes to CBOR bytes.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
        Ok(bytes)
    }

    /// Decodes from CBOR bytes.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        let state: StoreState =
            ciborium::from_reader(bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
        if state.format_version > FORMAT_VERSION {
            return Err(StoreError::UnsupportedFormat(state.format_version));
        }
        Ok(state)
    }
}
