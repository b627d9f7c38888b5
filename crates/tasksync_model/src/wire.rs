//! Backend wire shapes.
//!
//! The backend uses flat snake_case names, native booleans and ISO-8601
//! timestamps. The delete flag travels as its 0/1/2 code.

use crate::entity::{DeleteState, EntityType, Quadrant, ViewMode};
use crate::queue::Payload;
use serde::{Deserialize, Serialize};

/// Partial entity fields in remote naming.
pub type RemoteFields = Payload;

/// A task as the backend stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTask {
    /// Stable identifier.
    pub id: String,
    /// Task text.
    pub text: String,
    /// Completion flag.
    pub is_completed: bool,
    /// Delete state code.
    #[serde(default)]
    pub deleted: DeleteState,
    /// Quadrant.
    #[serde(default)]
    pub quadrant: Quadrant,
    /// Owning list.
    pub list_id: String,
    /// Free-text estimate.
    #[serde(default)]
    pub estimate_text: String,
    /// Sort order.
    #[serde(default)]
    pub sort_order: i64,
    /// Owner.
    pub user_id: Option<String>,
    /// Creation time.
    pub created_at: String,
    /// Last modification time.
    pub updated_at: String,
}

/// A task list as the backend stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTaskList {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Active flag; unique per owner on the backend.
    pub is_active: bool,
    /// Delete state code.
    #[serde(default)]
    pub deleted: DeleteState,
    /// Layout mode.
    #[serde(default)]
    pub layout_view: ViewMode,
    /// Whether completed tasks are shown.
    #[serde(default)]
    pub show_completed: bool,
    /// Owner.
    pub user_id: Option<String>,
    /// Creation time.
    pub created_at: String,
    /// Last modification time.
    pub updated_at: String,
}

/// Any remote record, tagged by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum RemoteRecord {
    /// A task.
    Task(RemoteTask),
    /// A task list.
    TaskList(RemoteTaskList),
}

impl RemoteRecord {
    /// The record's type.
    pub fn entity_type(&self) -> EntityType {
        match self {
            RemoteRecord::Task(_) => EntityType::Task,
            RemoteRecord::TaskList(_) => EntityType::TaskList,
        }
    }

    /// The record's id.
    pub fn id(&self) -> &str {
        match self {
            RemoteRecord::Task(task) => &task.id,
            RemoteRecord::TaskList(list) => &list.id,
        }
    }

    /// The record's owner.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            RemoteRecord::Task(task) => task.user_id.as_deref(),
            RemoteRecord::TaskList(list) => list.user_id.as_deref(),
        }
    }

    /// The record's modification time, as sent.
    pub fn updated_at(&self) -> &str {
        match self {
            RemoteRecord::Task(task) => &task.updated_at,
            RemoteRecord::TaskList(list) => &list.updated_at,
        }
    }
}
