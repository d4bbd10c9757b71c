//! Sync controller
//!
//! Owns the local tool list and keeps it current by polling `GET /tools`
//! through the [`RequestRouter`] on a fixed interval and after every
//! successful mutation. Consistency comes from re-fetching the whole list;
//! mutation results are never merged into local state.
//!
//! Overlapping refreshes are allowed: a timer refresh may race one triggered
//! by a mutation, and whichever response resolves last is what the state
//! shows.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::entity::{
    derive_groups, filter_by_group, sort_newest_first, Tool, ToolInput, ToolPatch, GROUP_ALL,
};
use crate::error::{AppError, AppResult};
use crate::router::{Envelope, Request, RequestRouter, Route};
use crate::storage::is_noop_rename;

/// Shown instead of backend details when a refresh fails
pub const LOAD_FAILED_MESSAGE: &str = "数据加载失败，请检查网络连接";

const ADD_FAILED: &str = "添加工具失败，请重试";
const UPDATE_FAILED: &str = "更新工具失败，请重试";
const DELETE_FAILED: &str = "删除工具失败，请重试";
const RENAME_GROUP_FAILED: &str = "重命名分组失败，请重试";
const DELETE_GROUP_FAILED: &str = "删除分组失败，请重试";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
    Failed(String),
}

/// Snapshot published to subscribers after every change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub phase: Phase,
    /// Newest first
    pub tools: Vec<Tool>,
    /// A refresh is in flight
    pub loading: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            phase: Phase::Loading,
            tools: Vec::new(),
            loading: true,
        }
    }
}

impl SyncState {
    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct SyncController {
    router: RequestRouter,
    interval: Duration,
    state: Arc<watch::Sender<SyncState>>,
}

impl SyncController {
    pub fn new(router: RequestRouter, config: &SyncConfig) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self {
            router,
            interval: config.poll_interval(),
            state: Arc::new(state),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.state.borrow().tools.clone()
    }

    /// "全部" followed by every group currently in use
    pub fn groups(&self) -> Vec<String> {
        derive_groups(&self.state.borrow().tools)
    }

    pub fn tools_in(&self, group: &str) -> Vec<Tool> {
        filter_by_group(&self.state.borrow().tools, group)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Start polling: one refresh now, then one per interval, until the
    /// returned handle is shut down or dropped. The controller itself stays
    /// usable afterwards and may be started again.
    pub fn start(&self) -> SyncHandle {
        let controller = self.clone();
        let cancel = CancellationToken::new();
        let stopped = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(controller.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stopped.cancelled() => break,
                    _ = ticker.tick() => {
                        let c = controller.clone();
                        let token = stopped.clone();
                        tokio::spawn(async move { c.reload(&token).await });
                    }
                }
            }
            tracing::debug!("Tool polling stopped");
        });
        tracing::info!("Polling tools every {:?}", self.interval);

        SyncHandle {
            cancel,
            task: Some(task),
        }
    }

    /// Re-fetch the full list. Failures are logged and flip the state to
    /// `Failed`; the previous list stays visible.
    pub async fn refresh(&self) {
        self.reload(&CancellationToken::new()).await
    }

    /// Refresh on behalf of a poll loop; a result that arrives after `cancel`
    /// fires is dropped.
    async fn reload(&self, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }
        self.state.send_modify(|s| s.loading = true);

        let result = self
            .router
            .dispatch(Request::get("/tools"))
            .await
            .and_then(|envelope| envelope.data_as::<Vec<Tool>>());

        // Torn down while the request was in flight
        if cancel.is_cancelled() {
            tracing::debug!("Discarding tool list received after shutdown");
            return;
        }

        match result {
            Ok(mut tools) => {
                sort_newest_first(&mut tools);
                self.state.send_modify(|s| {
                    s.tools = tools;
                    s.phase = Phase::Ready;
                    s.loading = false;
                });
            }
            Err(e) => {
                tracing::error!("加载工具列表失败: {}", e);
                self.state.send_modify(|s| {
                    s.phase = Phase::Failed(LOAD_FAILED_MESSAGE.to_string());
                    s.loading = false;
                });
            }
        }
    }

    /// Dispatch a mutation, then reload the list
    async fn mutate(&self, route: Route, body: Option<Value>, failure: &str) -> AppResult<Envelope> {
        let label = format!("{:?}", route);
        let envelope = match self.router.dispatch_route(route, body).await {
            Ok(envelope) if envelope.success => envelope,
            Ok(envelope) => {
                tracing::error!("{} {}: {:?}", failure, label, envelope.error);
                return Err(AppError::Operation(failure.to_string()));
            }
            Err(e) if e.is_user_facing() => return Err(e),
            Err(e) => {
                tracing::error!("{} {}: {}", failure, label, e);
                return Err(AppError::Operation(failure.to_string()));
            }
        };
        self.refresh().await;
        Ok(envelope)
    }

    pub async fn add_tool(&self, input: ToolInput) -> AppResult<Tool> {
        input.validate()?;
        let body = serde_json::to_value(&input)?;
        self.mutate(Route::CreateTool, Some(body), ADD_FAILED)
            .await?
            .data_as()
    }

    pub async fn update_tool(&self, id: &str, patch: ToolPatch) -> AppResult<Tool> {
        patch.validate()?;
        let body = serde_json::to_value(&patch)?;
        self.mutate(Route::UpdateTool(id.to_string()), Some(body), UPDATE_FAILED)
            .await?
            .data_as()
    }

    pub async fn delete_tool(&self, id: &str) -> AppResult<()> {
        self.mutate(Route::DeleteTool(id.to_string()), None, DELETE_FAILED)
            .await?;
        Ok(())
    }

    /// Rename a group. Blank or unchanged names are a no-op that never
    /// reaches the backend.
    pub async fn rename_group(&self, old_name: &str, new_name: &str) -> AppResult<usize> {
        if is_noop_rename(old_name, new_name) {
            return Ok(0);
        }
        if new_name.trim() == GROUP_ALL {
            return Err(AppError::Validation(format!("\"{}\" 是保留分组", GROUP_ALL)));
        }
        let body = json!({ "oldName": old_name, "newName": new_name });
        Ok(self
            .mutate(Route::RenameGroup, Some(body), RENAME_GROUP_FAILED)
            .await?
            .count
            .unwrap_or(0))
    }

    /// Move every tool of `group_name` to "未分组"
    pub async fn delete_group(&self, group_name: &str) -> AppResult<usize> {
        if group_name == GROUP_ALL {
            return Err(AppError::Validation(format!("无法删除\"{}\"分组", GROUP_ALL)));
        }
        let body = json!({ "groupName": group_name });
        Ok(self
            .mutate(Route::DeleteGroup, Some(body), DELETE_GROUP_FAILED)
            .await?
            .count
            .unwrap_or(0))
    }
}

/// Keeps the poll loop alive; dropping it stops polling
pub struct SyncHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Stop polling and wait for the loop to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Poll loop ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
