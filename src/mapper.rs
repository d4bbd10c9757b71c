//! Record mapper
//!
//! Translates between the shapes the backing stores speak and [`Tool`].
//! Inbound mapping never fails: absent or malformed optional fields fall back
//! to documented defaults (`"未分组"` for the group, "now" for the timestamp).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Tool, ToolInput, ToolPatch, GROUP_UNGROUPED};

/// Row as returned by the tabular store (snake_case columns, textual timestamp)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolRow {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    /// Legacy column name from older table layouts
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Record as persisted by the key-value stores (camelCase, epoch millis)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTool {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Insert payload for the tabular store; `created_at` is left to the table default
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertRow {
    pub name: String,
    pub group_name: String,
    pub description: String,
    pub poster_url: String,
    pub model_url: String,
}

/// Update payload for the tabular store, only the provided columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse a store-native timestamp into epoch millis.
///
/// Accepts RFC 3339 (`2024-05-01T08:00:00.123+00:00`) and the naive
/// `YYYY-MM-DD HH:MM:SS[.f]` form, read as UTC.
pub fn parse_timestamp(text: Option<&str>) -> Option<i64> {
    let text = text?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

impl From<ToolRow> for Tool {
    fn from(row: ToolRow) -> Self {
        let id = match row.id {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Tool {
            id,
            name: row.name.unwrap_or_default(),
            group: non_empty(row.group_name)
                .or_else(|| non_empty(row.group))
                .unwrap_or_else(|| GROUP_UNGROUPED.to_string()),
            description: row.description.unwrap_or_default(),
            poster_url: row.poster_url.unwrap_or_default(),
            model_url: row.model_url.unwrap_or_default(),
            created_at: parse_timestamp(row.created_at.as_deref()).unwrap_or_else(now_millis),
        }
    }
}

impl From<StoredTool> for Tool {
    fn from(stored: StoredTool) -> Self {
        Tool {
            id: stored.id.unwrap_or_default(),
            name: stored.name.unwrap_or_default(),
            group: non_empty(stored.group).unwrap_or_else(|| GROUP_UNGROUPED.to_string()),
            description: stored.description.unwrap_or_default(),
            poster_url: stored.poster_url.unwrap_or_default(),
            model_url: stored.model_url.unwrap_or_default(),
            created_at: stored.created_at.unwrap_or_else(now_millis),
        }
    }
}

impl From<ToolInput> for InsertRow {
    fn from(input: ToolInput) -> Self {
        InsertRow {
            name: input.name,
            group_name: input.group,
            description: input.description,
            poster_url: input.poster_url,
            model_url: input.model_url,
        }
    }
}

impl From<ToolPatch> for PatchRow {
    fn from(patch: ToolPatch) -> Self {
        PatchRow {
            name: patch.name,
            group_name: patch.group,
            description: patch.description,
            poster_url: patch.poster_url,
            model_url: patch.model_url,
        }
    }
}

/// Decode a single stored JSON value; `None` when it is not a record at all
pub fn decode_stored(value: serde_json::Value) -> Option<Tool> {
    match serde_json::from_value::<StoredTool>(value) {
        Ok(stored) => Some(stored.into()),
        Err(e) => {
            tracing::warn!("Skipping unreadable tool record: {}", e);
            None
        }
    }
}

/// Decode a JSON array of stored records, skipping the unreadable ones
pub fn decode_stored_list(value: serde_json::Value) -> Vec<Tool> {
    match value {
        serde_json::Value::Array(items) => items.into_iter().filter_map(decode_stored).collect(),
        other => {
            tracing::warn!("Expected a list of tools, got {}", other);
            Vec::new()
        }
    }
}

/// Decode a JSON array of table rows, skipping the unreadable ones
pub fn decode_rows(value: serde_json::Value) -> Vec<Tool> {
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => {
            tracing::warn!("Expected a list of rows, got {}", other);
            return Vec::new();
        }
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ToolRow>(item) {
            Ok(row) => Some(row.into()),
            Err(e) => {
                tracing::warn!("Skipping unreadable row: {}", e);
                None
            }
        })
        .collect()
}
