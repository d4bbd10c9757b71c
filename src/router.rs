//! Request router
//!
//! Maps a logical `{method, path, body}` request onto one [`ToolStore`] and
//! wraps the outcome in the uniform [`Envelope`]. The store is chosen once,
//! at construction, from configuration.

use axum::http::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::entity::{ToolInput, ToolPatch, GROUP_ALL};
use crate::error::{AppError, AppResult};
use crate::storage::{self, is_noop_rename, BackendKind, ToolStore};

/// Uniform response shape shared by every backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn with_data(data: impl Serialize) -> AppResult<Self> {
        Ok(Self {
            success: true,
            data: Some(serde_json::to_value(data)?),
            ..Default::default()
        })
    }

    pub fn with_count(count: usize) -> Self {
        Self {
            success: true,
            count: Some(count),
            ..Default::default()
        }
    }

    /// Decode `data` into `T`
    pub fn data_as<T: DeserializeOwned>(&self) -> AppResult<T> {
        let data = self
            .data
            .clone()
            .ok_or_else(|| AppError::Internal("envelope carried no data".to_string()))?;
        Ok(serde_json::from_value(data)?)
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn with_body(mut self, body: impl Serialize) -> AppResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// Recognised routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    ListTools,
    CreateTool,
    UpdateTool(String),
    DeleteTool(String),
    RenameGroup,
    DeleteGroup,
}

impl Route {
    pub fn parse(method: &Method, path: &str) -> AppResult<Self> {
        let path = path.split('?').next().unwrap_or_default();
        let path = path.trim_end_matches('/');

        let route = match (method, path) {
            (m, "/tools") if m == Method::GET => Some(Route::ListTools),
            (m, "/tools") if m == Method::POST => Some(Route::CreateTool),
            (m, "/groups/rename") if m == Method::POST => Some(Route::RenameGroup),
            (m, "/groups/delete") if m == Method::POST => Some(Route::DeleteGroup),
            (m, p) => match p.strip_prefix("/tools/") {
                Some(id) if !id.is_empty() && !id.contains('/') => {
                    if m == Method::PUT {
                        Some(Route::UpdateTool(id.to_string()))
                    } else if m == Method::DELETE {
                        Some(Route::DeleteTool(id.to_string()))
                    } else {
                        None
                    }
                }
                _ => None,
            },
        };

        route.ok_or_else(|| AppError::UnhandledRequest(format!("{} {}", path, method)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameGroupBody {
    #[serde(default)]
    old_name: String,
    #[serde(default)]
    new_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteGroupBody {
    #[serde(default)]
    group_name: String,
}

fn decode_body<T: DeserializeOwned>(body: Option<Value>) -> AppResult<T> {
    let body = body.ok_or_else(|| AppError::Validation("缺少请求体".to_string()))?;
    serde_json::from_value(body).map_err(|e| AppError::Validation(format!("请求体格式错误: {}", e)))
}

#[derive(Clone)]
pub struct RequestRouter {
    store: Arc<dyn ToolStore>,
}

impl RequestRouter {
    pub fn new(store: Arc<dyn ToolStore>) -> Self {
        Self { store }
    }

    /// Open the backend named in `config` and route to it
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self::new(storage::open(&config.backend, &config.http).await?))
    }

    pub fn store(&self) -> &Arc<dyn ToolStore> {
        &self.store
    }

    /// Verify the configured backend answers, logging which one is in use
    pub async fn check(&self) -> AppResult<BackendKind> {
        let kind = self.store.kind();
        tracing::info!("Checking {} backend: {}", kind, kind.description());
        match self.store.ping().await {
            Ok(()) => {
                tracing::info!("{} backend is reachable", kind);
                Ok(kind)
            }
            Err(e) => {
                tracing::error!("{} backend check failed: {}", kind, e);
                Err(e)
            }
        }
    }

    pub async fn dispatch(&self, request: Request) -> AppResult<Envelope> {
        let route = Route::parse(&request.method, &request.path)?;
        self.dispatch_route(route, request.body).await
    }

    /// Dispatch an already resolved route. Ids travel as-is and are never
    /// re-read from a path string.
    pub async fn dispatch_route(&self, route: Route, body: Option<Value>) -> AppResult<Envelope> {
        tracing::debug!("Dispatching {:?} to {} backend", route, self.store.kind());

        match route {
            Route::ListTools => Envelope::with_data(self.store.list().await?),
            Route::CreateTool => {
                let input: ToolInput = decode_body(body)?;
                input.validate()?;
                Envelope::with_data(self.store.create(input).await?)
            }
            Route::UpdateTool(id) => {
                let patch: ToolPatch = decode_body(body)?;
                patch.validate()?;
                Envelope::with_data(self.store.update(&id, patch).await?)
            }
            Route::DeleteTool(id) => {
                self.store.remove(&id).await?;
                Ok(Envelope::ok())
            }
            Route::RenameGroup => {
                let body: RenameGroupBody = decode_body(body)?;
                if body.old_name.trim().is_empty() {
                    return Err(AppError::Validation("缺少必填字段".to_string()));
                }
                if is_noop_rename(&body.old_name, &body.new_name) {
                    return Ok(Envelope::with_count(0));
                }
                if body.new_name.trim() == GROUP_ALL {
                    return Err(AppError::Validation(format!("\"{}\" 是保留分组", GROUP_ALL)));
                }
                let count = self
                    .store
                    .rename_group(&body.old_name, &body.new_name)
                    .await?;
                Ok(Envelope::with_count(count))
            }
            Route::DeleteGroup => {
                let body: DeleteGroupBody = decode_body(body)?;
                if body.group_name.trim().is_empty() {
                    return Err(AppError::Validation("缺少分组名称".to_string()));
                }
                if body.group_name == GROUP_ALL {
                    return Err(AppError::Validation(format!("无法删除\"{}\"分组", GROUP_ALL)));
                }
                let count = self.store.delete_group(&body.group_name).await?;
                Ok(Envelope::with_count(count))
            }
        }
    }
}
