//! Task and task-list entities in their local (persisted) shape.
//!
//! Local rows use camelCase names, encode booleans as 0/1 integers and
//! carry an explicit tri-state delete flag.

use crate::clock::Timestamp;
use crate::error::{ModelError, ModelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Generates a new entity identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Discriminant carried on every record and queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    /// A single task.
    Task,
    /// A list of tasks.
    TaskList,
}

impl EntityType {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Task => "task",
            EntityType::TaskList => "taskList",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(EntityType::Task),
            "taskList" => Ok(EntityType::TaskList),
            other => Err(ModelError::invalid_code("entity type", other)),
        }
    }
}

/// Delete state of an entity.
///
/// Serialized as the integer code (0, 1, 2) both locally and remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DeleteState {
    /// Visible.
    #[default]
    Active,
    /// Deleted, can be restored.
    SoftDeleted,
    /// Permanently deleted; kept as a marker.
    Tombstoned,
}

impl DeleteState {
    /// Converts to the integer code.
    pub fn to_code(&self) -> u8 {
        match self {
            DeleteState::Active => 0,
            DeleteState::SoftDeleted => 1,
            DeleteState::Tombstoned => 2,
        }
    }

    /// Converts from the integer code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DeleteState::Active),
            1 => Some(DeleteState::SoftDeleted),
            2 => Some(DeleteState::Tombstoned),
            _ => None,
        }
    }

    /// Returns true for the tombstone state.
    pub fn is_tombstoned(&self) -> bool {
        matches!(self, DeleteState::Tombstoned)
    }
}

impl From<DeleteState> for u8 {
    fn from(state: DeleteState) -> Self {
        state.to_code()
    }
}

impl TryFrom<u8> for DeleteState {
    type Error = ModelError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        DeleteState::from_code(code).ok_or_else(|| ModelError::invalid_code("delete state", code))
    }
}

/// Eisenhower-matrix quadrant a task is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    /// Do first.
    #[default]
    UrgentImportant,
    /// Schedule.
    NotUrgentImportant,
    /// Delegate.
    UrgentNotImportant,
    /// Drop.
    NotUrgentNotImportant,
}

impl Quadrant {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::UrgentImportant => "urgent_important",
            Quadrant::NotUrgentImportant => "not_urgent_important",
            Quadrant::UrgentNotImportant => "urgent_not_important",
            Quadrant::NotUrgentNotImportant => "not_urgent_not_important",
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// How a task list is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Four-quadrant grid.
    #[default]
    Matrix,
    /// Flat list.
    List,
}

/// Display settings stored with a task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSettings {
    /// Layout mode.
    #[serde(default)]
    pub view: ViewMode,
    /// Whether completed tasks are shown.
    #[serde(default = "default_true", with = "int_bool")]
    pub show_completed: bool,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            view: ViewMode::Matrix,
            show_completed: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A task as stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Stable identifier.
    pub id: String,
    /// Task text.
    pub text: String,
    /// Completion flag.
    #[serde(with = "int_bool")]
    pub completed: bool,
    /// Delete state.
    #[serde(default)]
    pub deleted: DeleteState,
    /// Quadrant.
    #[serde(default)]
    pub quadrant: Quadrant,
    /// Owning list.
    pub list_id: String,
    /// Free-text estimate.
    #[serde(default)]
    pub estimate: String,
    /// Position within (list, quadrant).
    #[serde(default)]
    pub order: i64,
    /// Owner; `None` until claimed.
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Timestamp,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: Timestamp,
}

impl Task {
    /// Creates an active, incomplete task with a fresh id.
    ///
    /// Timestamps are left at the epoch; the store stamps them on insert.
    pub fn new(list_id: impl Into<String>, text: impl Into<String>, quadrant: Quadrant) -> Self {
        Self {
            id: new_id(),
            text: text.into(),
            completed: false,
            deleted: DeleteState::Active,
            quadrant,
            list_id: list_id.into(),
            estimate: String::new(),
            order: 0,
            owner_id: None,
            created_at: Timestamp::default(),
            updated_at: Timestamp::default(),
        }
    }
}

/// A task list as stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// At most one list per owner is active.
    #[serde(with = "int_bool")]
    pub is_active: bool,
    /// Delete state.
    #[serde(default)]
    pub deleted: DeleteState,
    /// Display settings.
    #[serde(default)]
    pub layout: LayoutSettings,
    /// Owner; `None` until claimed.
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Timestamp,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: Timestamp,
}

impl TaskList {
    /// Creates an inactive list with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            is_active: false,
            deleted: DeleteState::Active,
            layout: LayoutSettings::default(),
            owner_id: None,
            created_at: Timestamp::default(),
            updated_at: Timestamp::default(),
        }
    }
}

/// Reference to one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    /// Entity type.
    pub entity_type: EntityType,
    /// Entity id.
    pub id: String,
}

impl EntityRef {
    /// Creates a reference.
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.id)
    }
}

/// Common behaviour of persisted entities.
pub trait Record: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The discriminant for this record type.
    const ENTITY_TYPE: EntityType;

    /// Entity id.
    fn id(&self) -> &str;

    /// Owner, if claimed.
    fn owner_id(&self) -> Option<&str>;

    /// Sets the owner.
    fn set_owner_id(&mut self, owner: Option<String>);

    /// Delete state.
    fn delete_state(&self) -> DeleteState;

    /// Creation time.
    fn created_at(&self) -> &Timestamp;

    /// Last modification time.
    fn updated_at(&self) -> &Timestamp;

    /// Overwrites both timestamps.
    fn set_timestamps(&mut self, created_at: Timestamp, updated_at: Timestamp);

    /// Sets only the modification time.
    fn set_updated_at(&mut self, updated_at: Timestamp);

    /// Wraps into the tagged enum.
    fn into_entity(self) -> Entity;

    /// Reference to this entity.
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::ENTITY_TYPE, self.id())
    }

    /// Full local-shape payload (used for `add` operations).
    fn to_payload(&self) -> ModelResult<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(ModelError::NotAnObject),
        }
    }

    /// Returns a copy with `fields` merged in.
    ///
    /// Nested objects are merged one level deep; unknown fields are rejected.
    fn merged(&self, fields: &Map<String, Value>) -> ModelResult<Self> {
        let mut current = self.to_payload()?;
        merge_into(Self::ENTITY_TYPE, &mut current, fields)?;
        Ok(serde_json::from_value(Value::Object(current))?)
    }
}

fn merge_into(
    entity_type: EntityType,
    target: &mut Map<String, Value>,
    fields: &Map<String, Value>,
) -> ModelResult<()> {
    for (key, value) in fields {
        if key == "id" {
            return Err(ModelError::invalid_field("id", "entity ids are immutable"));
        }
        match target.get_mut(key) {
            None => {
                return Err(ModelError::UnknownField {
                    entity_type: entity_type.as_str(),
                    field: key.clone(),
                })
            }
            Some(Value::Object(existing)) => match value {
                Value::Object(patch) => {
                    merge_into(entity_type, existing, patch)?;
                }
                _ => return Err(ModelError::invalid_field(key.clone(), "expected an object")),
            },
            Some(slot) => *slot = value.clone(),
        }
    }
    Ok(())
}

impl Record for Task {
    const ENTITY_TYPE: EntityType = EntityType::Task;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    fn set_owner_id(&mut self, owner: Option<String>) {
        self.owner_id = owner;
    }

    fn delete_state(&self) -> DeleteState {
        self.deleted
    }

    fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    fn set_timestamps(&mut self, created_at: Timestamp, updated_at: Timestamp) {
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    fn set_updated_at(&mut self, updated_at: Timestamp) {
        self.updated_at = updated_at;
    }

    fn into_entity(self) -> Entity {
        Entity::Task(self)
    }
}

impl Record for TaskList {
    const ENTITY_TYPE: EntityType = EntityType::TaskList;

    fn id(&self) -> &str {
        &self.id
    }

    fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    fn set_owner_id(&mut self, owner: Option<String>) {
        self.owner_id = owner;
    }

    fn delete_state(&self) -> DeleteState {
        self.deleted
    }

    fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    fn set_timestamps(&mut self, created_at: Timestamp, updated_at: Timestamp) {
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    fn set_updated_at(&mut self, updated_at: Timestamp) {
        self.updated_at = updated_at;
    }

    fn into_entity(self) -> Entity {
        Entity::TaskList(self)
    }
}

/// Any persisted entity, tagged by type.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// A task.
    Task(Task),
    /// A task list.
    TaskList(TaskList),
}

impl Entity {
    /// The entity's type.
    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::Task(_) => EntityType::Task,
            Entity::TaskList(_) => EntityType::TaskList,
        }
    }

    /// The entity's id.
    pub fn id(&self) -> &str {
        match self {
            Entity::Task(task) => &task.id,
            Entity::TaskList(list) => &list.id,
        }
    }

    /// The entity's modification time.
    pub fn updated_at(&self) -> &Timestamp {
        match self {
            Entity::Task(task) => &task.updated_at,
            Entity::TaskList(list) => &list.updated_at,
        }
    }

    /// The entity's delete state.
    pub fn delete_state(&self) -> DeleteState {
        match self {
            Entity::Task(task) => task.deleted,
            Entity::TaskList(list) => list.deleted,
        }
    }

    /// Returns the task, if this is one.
    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Entity::Task(task) => Some(task),
            Entity::TaskList(_) => None,
        }
    }

    /// Returns the task list, if this is one.
    pub fn as_task_list(&self) -> Option<&TaskList> {
        match self {
            Entity::TaskList(list) => Some(list),
            Entity::Task(_) => None,
        }
    }
}

/// Serializes `bool` as 0/1; accepts either integers or booleans on read.
mod int_bool {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(i64),
        Bool(bool),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Int(0) => Ok(false),
            Repr::Int(1) => Ok(true),
            Repr::Int(other) => Err(serde::de::Error::custom(format!(
                "expected 0 or 1, got {other}"
            ))),
            Repr::Bool(b) => Ok(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quadrant_names_match_serde() {
        for quadrant in [
            Quadrant::UrgentImportant,
            Quadrant::NotUrgentImportant,
            Quadrant::UrgentNotImportant,
            Quadrant::NotUrgentNotImportant,
        ] {
            assert_eq!(serde_json::to_value(quadrant).unwrap(), json!(quadrant.as_str()));
        }
    }

    #[test]
    fn delete_state_codes() {
        assert_eq!(DeleteState::Active.to_code(), 0);
        assert_eq!(DeleteState::SoftDeleted.to_code(), 1);
        assert_eq!(DeleteState::Tombstoned.to_code(), 2);
        assert_eq!(DeleteState::from_code(2), Some(DeleteState::Tombstoned));
        assert_eq!(DeleteState::from_code(3), None);
        assert!(serde_json::from_value::<DeleteState>(json!(5)).is_err());
    }

    #[test]
    fn entity_type_names() {
        assert_eq!(EntityType::TaskList.to_string(), "taskList");
        assert_eq!("task".parse::<EntityType>().unwrap(), EntityType::Task);
        assert!("note".parse::<EntityType>().is_err());
        assert_eq!(serde_json::to_value(EntityType::TaskList).unwrap(), json!("taskList"));
    }

    #[test]
    fn local_shape_uses_integers_for_flags() {
        let mut task = Task::new("list-1", "Review PR", Quadrant::NotUrgentImportant);
        task.completed = true;
        let payload = task.to_payload().unwrap();

        assert_eq!(payload["completed"], json!(1));
        assert_eq!(payload["deleted"], json!(0));
        assert_eq!(payload["listId"], json!("list-1"));
        assert_eq!(payload["quadrant"], json!("not_urgent_important"));
        assert_eq!(payload["ownerId"], Value::Null);
    }

    #[test]
    fn reads_booleans_written_by_older_rows() {
        let list: TaskList = serde_json::from_value(json!({
            "id": "l1",
            "name": "Work",
            "isActive": true,
            "updatedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(list.is_active);
        assert_eq!(list.deleted, DeleteState::Active);
        assert!(list.layout.show_completed);
    }

    #[test]
    fn merged_applies_partial_fields() {
        let task = Task::new("list-1", "Draft", Quadrant::UrgentImportant);
        let mut fields = Map::new();
        fields.insert("text".into(), json!("Final"));
        fields.insert("completed".into(), json!(1));

        let merged = task.merged(&fields).unwrap();
        assert_eq!(merged.text, "Final");
        assert!(merged.completed);
        assert_eq!(merged.id, task.id);
    }

    #[test]
    fn merged_merges_nested_layout() {
        let list = TaskList::new("Home");
        let mut fields = Map::new();
        fields.insert("layout".into(), json!({ "view": "list" }));

        let merged = list.merged(&fields).unwrap();
        assert_eq!(merged.layout.view, ViewMode::List);
        assert!(merged.layout.show_completed);
    }

    #[test]
    fn merged_rejects_unknown_and_id_fields() {
        let task = Task::new("l", "t", Quadrant::UrgentImportant);

        let mut unknown = Map::new();
        unknown.insert("colour".into(), json!("red"));
        assert!(matches!(
            task.merged(&unknown),
            Err(ModelError::UnknownField { .. })
        ));

        let mut id = Map::new();
        id.insert("id".into(), json!("other"));
        assert!(task.merged(&id).is_err());
    }

    #[test]
    fn entity_accessors() {
        let list = TaskList::new("Work");
        let entity = list.clone().into_entity();
        assert_eq!(entity.entity_type(), EntityType::TaskList);
        assert_eq!(entity.id(), list.id);
        assert!(entity.as_task().is_none());
        assert_eq!(entity.as_task_list(), Some(&list));
        assert_eq!(list.entity_ref().to_string(), format!("taskList/{}", list.id));
    }
}
