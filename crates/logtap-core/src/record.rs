//! Log records and the well-known policy field locations.
//!
//! A [`Record`] pairs the structured fields emitted by the upstream
//! pipeline with the verbatim raw payload that gets relayed to
//! subscribers. The structured side is consulted only for policy
//! evaluation; the raw side is never inspected or rewritten.

use bytes::Bytes;
use serde_json::Value;

/// Label carrying the comma-separated access list of usernames allowed
/// to view a record's payload.
pub const ALLOW_LIST_LABEL: &str = "rbac/allowed-users";

/// Nested field path holding pod labels.
const LABELS_PATH: [&str; 2] = ["kubernetes", "labels"];
/// Nested field path holding the originating pod identifier.
const POD_NAME_PATH: [&str; 2] = ["kubernetes", "pod_name"];

/// One structured log record produced by the upstream pipeline.
///
/// Read-only to this crate's consumers; ownership stays with the
/// pipeline, which hands out cheap clones (`Bytes` is refcounted).
#[derive(Debug, Clone)]
pub struct Record {
    /// Nested string-keyed fields, used only for policy evaluation.
    pub fields: Value,
    /// Verbatim payload relayed on authorization success.
    pub raw: Bytes,
}

impl Record {
    /// Build a record from structured fields and a raw payload.
    pub fn new(fields: Value, raw: impl Into<Bytes>) -> Self {
        Self {
            fields,
            raw: raw.into(),
        }
    }

    /// Look up a nested field by key path.
    pub fn get_in(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.fields, |value, key| value.get(key))
    }

    fn get_str_in(&self, path: &[&str]) -> Option<&str> {
        self.get_in(path).and_then(Value::as_str)
    }

    /// The record's access list, if the tag is present and a string.
    pub fn allow_list(&self) -> Option<&str> {
        self.get_str_in(&[LABELS_PATH[0], LABELS_PATH[1], ALLOW_LIST_LABEL])
    }

    /// The originating pod identifier, if present.
    pub fn pod_name(&self) -> Option<&str> {
        self.get_str_in(&POD_NAME_PATH)
    }
}
