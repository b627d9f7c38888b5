//! Schema translation between the local and remote entity shapes.
//!
//! | local (camelCase, 0/1)   | remote (snake_case, bool) |
//! |--------------------------|---------------------------|
//! | `completed`              | `is_completed`            |
//! | `listId`                 | `list_id`                 |
//! | `estimate`               | `estimate_text`           |
//! | `order`                  | `sort_order`              |
//! | `ownerId`                | `user_id`                 |
//! | `isActive`               | `is_active`               |
//! | `layout.view`            | `layout_view`             |
//! | `layout.showCompleted`   | `show_completed`          |
//! | `createdAt`/`updatedAt`  | `created_at`/`updated_at` |
//!
//! `deleted` passes through as its integer code.

use crate::clock::Timestamp;
use crate::entity::{Entity, EntityType, LayoutSettings, Task, TaskList};
use crate::error::{ModelError, ModelResult};
use crate::queue::Payload;
use crate::wire::{RemoteFields, RemoteRecord, RemoteTask, RemoteTaskList};
use serde_json::{Map, Value};

#[derive(Clone, Copy)]
enum Kind {
    Plain,
    Bool,
    Time,
}

const TASK_FIELDS: &[(&str, &str, Kind)] = &[
    ("id", "id", Kind::Plain),
    ("text", "text", Kind::Plain),
    ("completed", "is_completed", Kind::Bool),
    ("deleted", "deleted", Kind::Plain),
    ("quadrant", "quadrant", Kind::Plain),
    ("listId", "list_id", Kind::Plain),
    ("estimate", "estimate_text", Kind::Plain),
    ("order", "sort_order", Kind::Plain),
    ("ownerId", "user_id", Kind::Plain),
    ("createdAt", "created_at", Kind::Time),
    ("updatedAt", "updated_at", Kind::Time),
];

const TASK_LIST_FIELDS: &[(&str, &str, Kind)] = &[
    ("id", "id", Kind::Plain),
    ("name", "name", Kind::Plain),
    ("isActive", "is_active", Kind::Bool),
    ("deleted", "deleted", Kind::Plain),
    ("ownerId", "user_id", Kind::Plain),
    ("createdAt", "created_at", Kind::Time),
    ("updatedAt", "updated_at", Kind::Time),
];

const LAYOUT_FIELDS: &[(&str, &str, Kind)] = &[
    ("view", "layout_view", Kind::Plain),
    ("showCompleted", "show_completed", Kind::Bool),
];

fn table(entity_type: EntityType) -> &'static [(&'static str, &'static str, Kind)] {
    match entity_type {
        EntityType::Task => TASK_FIELDS,
        EntityType::TaskList => TASK_LIST_FIELDS,
    }
}

/// Converts a local task to the remote shape.
pub fn task_to_remote(task: &Task) -> RemoteTask {
    RemoteTask {
        id: task.id.clone(),
        text: task.text.clone(),
        is_completed: task.completed,
        deleted: task.deleted,
        quadrant: task.quadrant,
        list_id: task.list_id.clone(),
        estimate_text: task.estimate.clone(),
        sort_order: task.order,
        user_id: task.owner_id.clone(),
        created_at: task.created_at.to_iso(),
        updated_at: task.updated_at.to_iso(),
    }
}

/// Converts a remote task to the local shape, keeping its timestamps verbatim.
pub fn task_from_remote(remote: RemoteTask) -> Task {
    Task {
        id: remote.id,
        text: remote.text,
        completed: remote.is_completed,
        deleted: remote.deleted,
        quadrant: remote.quadrant,
        list_id: remote.list_id,
        estimate: remote.estimate_text,
        order: remote.sort_order,
        owner_id: remote.user_id,
        created_at: Timestamp::Text(remote.created_at),
        updated_at: Timestamp::Text(remote.updated_at),
    }
}

/// Converts a local task list to the remote shape.
pub fn task_list_to_remote(list: &TaskList) -> RemoteTaskList {
    RemoteTaskList {
        id: list.id.clone(),
        name: list.name.clone(),
        is_active: list.is_active,
        deleted: list.deleted,
        layout_view: list.layout.view,
        show_completed: list.layout.show_completed,
        user_id: list.owner_id.clone(),
        created_at: list.created_at.to_iso(),
        updated_at: list.updated_at.to_iso(),
    }
}

/// Converts a remote task list to the local shape, keeping its timestamps verbatim.
pub fn task_list_from_remote(remote: RemoteTaskList) -> TaskList {
    TaskList {
        id: remote.id,
        name: remote.name,
        is_active: remote.is_active,
        deleted: remote.deleted,
        layout: LayoutSettings {
            view: remote.layout_view,
            show_completed: remote.show_completed,
        },
        owner_id: remote.user_id,
        created_at: Timestamp::Text(remote.created_at),
        updated_at: Timestamp::Text(remote.updated_at),
    }
}

/// Converts any local entity to its remote record.
pub fn entity_to_remote(entity: &Entity) -> RemoteRecord {
    match entity {
        Entity::Task(task) => RemoteRecord::Task(task_to_remote(task)),
        Entity::TaskList(list) => RemoteRecord::TaskList(task_list_to_remote(list)),
    }
}

/// Converts any remote record to its local entity.
pub fn entity_from_remote(record: RemoteRecord) -> Entity {
    match record {
        RemoteRecord::Task(task) => Entity::Task(task_from_remote(task)),
        RemoteRecord::TaskList(list) => Entity::TaskList(task_list_from_remote(list)),
    }
}

/// Converts a full local payload (as carried by an `add` item) to a remote record.
pub fn payload_to_record(entity_type: EntityType, payload: &Payload) -> ModelResult<RemoteRecord> {
    let value = Value::Object(payload.clone());
    Ok(match entity_type {
        EntityType::Task => RemoteRecord::Task(task_to_remote(&serde_json::from_value(value)?)),
        EntityType::TaskList => {
            RemoteRecord::TaskList(task_list_to_remote(&serde_json::from_value(value)?))
        }
    })
}

/// Renames and re-encodes partial local fields for the backend.
pub fn fields_to_remote(entity_type: EntityType, fields: &Payload) -> ModelResult<RemoteFields> {
    let mut out = Map::new();
    for (key, value) in fields {
        if entity_type == EntityType::TaskList && key == "layout" {
            let layout = value
                .as_object()
                .ok_or_else(|| ModelError::invalid_field("layout", "expected an object"))?;
            for (inner_key, inner_value) in layout {
                let (remote, kind) = lookup_local(LAYOUT_FIELDS, inner_key).ok_or_else(|| {
                    ModelError::UnknownField {
                        entity_type: entity_type.as_str(),
                        field: format!("layout.{inner_key}"),
                    }
                })?;
                out.insert(remote.into(), encode(inner_key, inner_value, kind)?);
            }
            continue;
        }

        let (remote, kind) =
            lookup_local(table(entity_type), key).ok_or_else(|| ModelError::UnknownField {
                entity_type: entity_type.as_str(),
                field: key.clone(),
            })?;
        out.insert(remote.into(), encode(key, value, kind)?);
    }
    Ok(out)
}

/// Renames and re-encodes partial remote fields into local naming.
pub fn fields_from_remote(entity_type: EntityType, fields: &RemoteFields) -> ModelResult<Payload> {
    let mut out = Map::new();
    let mut layout = Map::new();
    for (key, value) in fields {
        if entity_type == EntityType::TaskList {
            if let Some((local, kind)) = lookup_remote(LAYOUT_FIELDS, key) {
                layout.insert(local.into(), decode(key, value, kind)?);
                continue;
            }
        }
        let (local, kind) =
            lookup_remote(table(entity_type), key).ok_or_else(|| ModelError::UnknownField {
                entity_type: entity_type.as_str(),
                field: key.clone(),
            })?;
        out.insert(local.into(), decode(key, value, kind)?);
    }
    if !layout.is_empty() {
        out.insert("layout".into(), Value::Object(layout));
    }
    Ok(out)
}

fn lookup_local(table: &[(&str, &'static str, Kind)], key: &str) -> Option<(&'static str, Kind)> {
    table
        .iter()
        .find(|(local, _, _)| *local == key)
        .map(|(_, remote, kind)| (*remote, *kind))
}

fn lookup_remote(table: &[(&'static str, &str, Kind)], key: &str) -> Option<(&'static str, Kind)> {
    table
        .iter()
        .find(|(_, remote, _)| *remote == key)
        .map(|(local, _, kind)| (*local, *kind))
}

fn encode(field: &str, value: &Value, kind: Kind) -> ModelResult<Value> {
    match kind {
        Kind::Plain => Ok(value.clone()),
        Kind::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(ModelError::invalid_field(field, "expected 0 or 1")),
            },
            _ => Err(ModelError::invalid_field(field, "expected 0 or 1")),
        },
        Kind::Time => {
            let ts: Timestamp = serde_json::from_value(value.clone())
                .map_err(|e| ModelError::invalid_field(field, e.to_string()))?;
            Ok(Value::String(ts.to_iso()))
        }
    }
}

fn decode(field: &str, value: &Value, kind: Kind) -> ModelResult<Value> {
    match kind {
        Kind::Plain | Kind::Time => Ok(value.clone()),
        Kind::Bool => value
            .as_bool()
            .map(|b| Value::from(u8::from(b)))
            .ok_or_else(|| ModelError::invalid_field(field, "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{DeleteState, Quadrant, ViewMode};
    use serde_json::json;

    fn fields(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn task_to_remote_renames_and_formats() {
        let mut task = Task::new("list-1", "Ship it", Quadrant::UrgentNotImportant);
        task.completed = true;
        task.deleted = DeleteState::SoftDeleted;
        task.estimate = "2h".into();
        task.order = 4;
        task.owner_id = Some("u1".into());
        task.created_at = Timestamp::Millis(0);
        task.updated_at = Timestamp::Millis(1_000);

        let remote = task_to_remote(&task);
        assert!(remote.is_completed);
        assert_eq!(remote.deleted, DeleteState::SoftDeleted);
        assert_eq!(remote.estimate_text, "2h");
        assert_eq!(remote.sort_order, 4);
        assert_eq!(remote.user_id.as_deref(), Some("u1"));
        assert_eq!(remote.updated_at, "1970-01-01T00:00:01.000Z");

        let wire = serde_json::to_value(&remote).unwrap();
        assert_eq!(wire["deleted"], json!(1));
        assert_eq!(wire["is_completed"], json!(true));
    }

    #[test]
    fn import_keeps_remote_timestamps_verbatim() {
        let remote = RemoteTaskList {
            id: "l1".into(),
            name: "Work".into(),
            is_active: true,
            deleted: DeleteState::Tombstoned,
            layout_view: ViewMode::List,
            show_completed: false,
            user_id: Some("u1".into()),
            created_at: "2024-03-01 10:00:00".into(),
            updated_at: "2024-03-01T10:00:00.123+00:00".into(),
        };

        let local = task_list_from_remote(remote);
        assert_eq!(local.updated_at, Timestamp::Text("2024-03-01T10:00:00.123+00:00".into()));
        assert_eq!(local.created_at, Timestamp::Text("2024-03-01 10:00:00".into()));
        assert_eq!(local.deleted, DeleteState::Tombstoned);
        assert_eq!(local.layout.view, ViewMode::List);
        assert!(!local.layout.show_completed);
    }

    #[test]
    fn partial_task_fields() {
        let remote = fields_to_remote(
            EntityType::Task,
            &fields(json!({ "completed": 1, "listId": "l2", "order": 3, "updatedAt": 1000 })),
        )
        .unwrap();

        assert_eq!(remote["is_completed"], json!(true));
        assert_eq!(remote["list_id"], json!("l2"));
        assert_eq!(remote["sort_order"], json!(3));
        assert_eq!(remote["updated_at"], json!("1970-01-01T00:00:01.000Z"));
    }

    #[test]
    fn partial_list_fields_flatten_layout() {
        let remote = fields_to_remote(
            EntityType::TaskList,
            &fields(json!({ "isActive": 0, "layout": { "view": "list", "showCompleted": 1 } })),
        )
        .unwrap();

        assert_eq!(remote["is_active"], json!(false));
        assert_eq!(remote["layout_view"], json!("list"));
        assert_eq!(remote["show_completed"], json!(true));

        let back = fields_from_remote(EntityType::TaskList, &remote).unwrap();
        assert_eq!(back["isActive"], json!(0));
        assert_eq!(back["layout"], json!({ "view": "list", "showCompleted": 1 }));
    }

    #[test]
    fn delete_flag_passes_through() {
        let remote =
            fields_to_remote(EntityType::Task, &fields(json!({ "deleted": 2 }))).unwrap();
        assert_eq!(remote["deleted"], json!(2));
    }

    #[test]
    fn rejects_unknown_and_malformed_fields() {
        assert!(matches!(
            fields_to_remote(EntityType::Task, &fields(json!({ "isActive": 1 }))),
            Err(ModelError::UnknownField { .. })
        ));
        assert!(matches!(
            fields_to_remote(EntityType::Task, &fields(json!({ "completed": 7 }))),
            Err(ModelError::InvalidField { .. })
        ));
        assert!(fields_to_remote(
            EntityType::TaskList,
            &fields(json!({ "layout": { "colour": "red" } }))
        )
        .is_err());
    }

    #[test]
    fn add_payload_becomes_record() {
        let mut list = TaskList::new("Errands");
        list.is_active = true;
        list.updated_at = Timestamp::Millis(5);
        let payload = crate::entity::Record::to_payload(&list).unwrap();

        match payload_to_record(EntityType::TaskList, &payload).unwrap() {
            RemoteRecord::TaskList(remote) => {
                assert_eq!(remote.id, list.id);
                assert!(remote.is_active);
                assert_eq!(remote.updated_at, "1970-01-01T00:00:00.005Z");
            }
            other => panic!("unexpected record {other:?}"),
        }
    }
}
