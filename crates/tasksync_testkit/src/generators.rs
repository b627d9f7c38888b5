//! Property-based test generators using proptest.
//!
//! Provides strategies for timestamps in their several encodings, task
//! fields, small operation scripts and remote failure patterns.

use proptest::prelude::*;
use tasksync_model::{format_iso, Quadrant, Timestamp};

/// Epoch milliseconds between 2001 and 2100.
pub fn millis_strategy() -> impl Strategy<Value = i64> {
    1_000_000_000_000i64..4_100_000_000_000i64
}

/// A timestamp in one of the encodings found in stored data: a number, a
/// numeric string or RFC 3339 text.
pub fn timestamp_strategy() -> impl Strategy<Value = (i64, Timestamp)> {
    millis_strategy().prop_flat_map(|ms| {
        let iso = format_iso(ms).unwrap_or_default();
        prop_oneof![
            Just((ms, Timestamp::Millis(ms))),
            Just((ms, Timestamp::Text(ms.to_string()))),
            Just((ms, Timestamp::Text(iso))),
        ]
    })
}

/// Any quadrant.
pub fn quadrant_strategy() -> impl Strategy<Value = Quadrant> {
    prop_oneof![
        Just(Quadrant::UrgentImportant),
        Just(Quadrant::NotUrgentImportant),
        Just(Quadrant::UrgentNotImportant),
        Just(Quadrant::NotUrgentNotImportant),
    ]
}

/// Non-empty task text.
pub fn task_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,39}").expect("Invalid regex")
}

/// One step of a list activation script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStep {
    /// Create a new list (it becomes active).
    Create,
    /// Activate the list at this index, modulo the live lists.
    Activate(usize),
    /// Soft-delete the list at this index, modulo the live lists.
    Delete(usize),
}

/// Scripts of list creations, activations and deletions, starting with a
/// creation.
pub fn list_script_strategy() -> impl Strategy<Value = Vec<ListStep>> {
    let step = prop_oneof![
        3 => Just(ListStep::Create),
        3 => (0usize..8).prop_map(ListStep::Activate),
        1 => (0usize..8).prop_map(ListStep::Delete),
    ];
    prop::collection::vec(step, 0..12).prop_map(|mut steps| {
        steps.insert(0, ListStep::Create);
        steps
    })
}

/// Outcomes for consecutive remote calls: `true` fails the call with a
/// transient error, `false` lets it through.
pub fn flaky_calls_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(prop::bool::weighted(0.3), 0..16)
}
