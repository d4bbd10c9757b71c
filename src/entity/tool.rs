//! Tool entity - 工具条目
//!
//! The canonical catalog entry plus the create/update payload shapes.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Reserved pseudo-group meaning "no filter"; never assigned to an entry
pub const GROUP_ALL: &str = "全部";
/// Destination for entries whose group was deleted
pub const GROUP_UNGROUPED: &str = "未分组";

const MODEL_EXTENSIONS: [&str; 2] = [".glb", ".gltf"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub group: String,
    #[serde(default)]
    pub description: String,
    pub poster_url: String,
    pub model_url: String,
    /// Epoch milliseconds
    pub created_at: i64,
}

/// Create payload: a tool without `id` and `createdAt`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub poster_url: String,
    #[serde(default)]
    pub model_url: String,
}

/// Partial update. `id` and `createdAt` are not part of it, so a body carrying
/// them has those fields dropped on deserialization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
}

impl Tool {
    /// Build a freshly created tool with a new id and the current timestamp
    pub fn create(input: ToolInput) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name,
            group: input.group,
            description: input.description,
            poster_url: input.poster_url,
            model_url: input.model_url,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Apply only the provided fields
    pub fn apply(&mut self, patch: ToolPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(group) = patch.group {
            self.group = group;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(poster_url) = patch.poster_url {
            self.poster_url = poster_url;
        }
        if let Some(model_url) = patch.model_url {
            self.model_url = model_url;
        }
    }
}

impl ToolInput {
    /// Check required fields and URL formats before anything leaves the process
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty()
            || self.group.trim().is_empty()
            || self.poster_url.trim().is_empty()
            || self.model_url.trim().is_empty()
        {
            return Err(AppError::Validation("缺少必填字段".to_string()));
        }
        validate_group(&self.group)?;
        validate_poster_url(&self.poster_url)?;
        validate_model_url(&self.model_url)
    }
}

impl ToolPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.group.is_none()
            && self.description.is_none()
            && self.poster_url.is_none()
            && self.model_url.is_none()
    }

    /// Same rules as [`ToolInput::validate`], for the fields present
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("工具名称不能为空".to_string()));
            }
        }
        if let Some(group) = &self.group {
            if group.trim().is_empty() {
                return Err(AppError::Validation("分组不能为空".to_string()));
            }
            validate_group(group)?;
        }
        if let Some(poster_url) = &self.poster_url {
            validate_poster_url(poster_url)?;
        }
        if let Some(model_url) = &self.model_url {
            validate_model_url(model_url)?;
        }
        Ok(())
    }
}

fn validate_group(group: &str) -> AppResult<()> {
    if group.trim() == GROUP_ALL {
        return Err(AppError::Validation(format!("\"{}\" 是保留分组", GROUP_ALL)));
    }
    Ok(())
}

fn validate_poster_url(url: &str) -> AppResult<()> {
    Url::parse(url)
        .map(|_| ())
        .map_err(|_| AppError::Validation("请输入有效的 URL 地址".to_string()))
}

fn validate_model_url(url: &str) -> AppResult<()> {
    let parsed =
        Url::parse(url).map_err(|_| AppError::Validation("请输入有效的 URL 地址".to_string()))?;
    let path = parsed.path().to_ascii_lowercase();
    if !MODEL_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return Err(AppError::Validation(
            "模型文件必须是 .glb 或 .gltf 格式".to_string(),
        ));
    }
    Ok(())
}

/// Groups offered to the user: the "All" pseudo-group, then each distinct
/// group in the order it first appears in `tools`.
pub fn derive_groups(tools: &[Tool]) -> Vec<String> {
    let mut groups = vec![GROUP_ALL.to_string()];
    for tool in tools {
        if !groups.iter().any(|g| g == &tool.group) {
            groups.push(tool.group.clone());
        }
    }
    groups
}

/// Filter by group; "All" returns everything
pub fn filter_by_group<'a>(tools: &'a [Tool], group: &str) -> Vec<&'a Tool> {
    tools
        .iter()
        .filter(|t| group == GROUP_ALL || t.group == group)
        .collect()
}

/// Newest first
pub fn sort_newest_first(tools: &mut [Tool]) {
    tools.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
