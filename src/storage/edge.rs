//! Function-style adapter
//!
//! Client for the `/tools`, `/tools/{id}`, `/groups/rename` and
//! `/groups/delete` endpoints. Unlike the local and tabular adapters, list
//! failures propagate to the caller.

use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{is_noop_rename, BackendKind, ToolStore};
use crate::config::EdgeConfig;
use crate::entity::{Tool, ToolInput, ToolPatch};
use crate::error::{AppError, AppResult};
use crate::mapper;
use crate::router::Envelope;

pub struct EdgeStore {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl EdgeStore {
    pub fn new(config: &EdgeConfig, client: reqwest::Client) -> AppResult<Self> {
        if config.url.trim().is_empty() {
            return Err(AppError::Config("backend.edge.url is not set".to_string()));
        }
        let base_url = Url::parse(config.url.trim_end_matches('/')).map_err(|e| {
            AppError::Config(format!("backend.edge.url is invalid: {}", e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "backend.edge.url cannot hold paths: {}",
                base_url
            )));
        }
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    /// Base URL extended by `segments`, each percent-encoded as one segment
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Call an endpoint and unwrap the success envelope
    async fn call(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<serde_json::Value>,
    ) -> AppResult<Envelope> {
        let url = self.endpoint(segments);
        let path = url.path().to_string();
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let envelope: Envelope = read_envelope(response, &path).await?;
        if !envelope.success {
            return Err(AppError::Upstream {
                status: StatusCode::OK.as_u16(),
                message: envelope.error.unwrap_or_else(|| "request failed".to_string()),
            });
        }
        Ok(envelope)
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response, path: &str) -> AppResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    // Prefer the server's own error text
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Envelope>(&text)
        .ok()
        .and_then(|e| e.error)
        .unwrap_or_else(|| format!("HTTP {}: {}", status.as_u16(), text));

    tracing::error!("Function API request {} failed: {}", path, message);
    if status == StatusCode::NOT_FOUND {
        return Err(AppError::NotFound(message));
    }
    Err(AppError::Upstream {
        status: status.as_u16(),
        message,
    })
}

fn single_tool(envelope: Envelope) -> AppResult<Tool> {
    envelope
        .data
        .and_then(mapper::decode_stored)
        .ok_or_else(|| AppError::Internal("response carried no tool".to_string()))
}

#[async_trait]
impl ToolStore for EdgeStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Edge
    }

    async fn ping(&self) -> AppResult<()> {
        self.call(Method::GET, &["tools"], None).await.map(|_| ())
    }

    async fn list(&self) -> AppResult<Vec<Tool>> {
        let envelope = self.call(Method::GET, &["tools"], None).await?;
        Ok(envelope
            .data
            .map(mapper::decode_stored_list)
            .unwrap_or_default())
    }

    async fn create(&self, input: ToolInput) -> AppResult<Tool> {
        let body = serde_json::to_value(&input)?;
        single_tool(self.call(Method::POST, &["tools"], Some(body)).await?)
    }

    async fn update(&self, id: &str, patch: ToolPatch) -> AppResult<Tool> {
        let body = serde_json::to_value(&patch)?;
        single_tool(self.call(Method::PUT, &["tools", id], Some(body)).await?)
    }

    async fn remove(&self, id: &str) -> AppResult<bool> {
        self.call(Method::DELETE, &["tools", id], None).await?;
        Ok(true)
    }

    async fn rename_group(&self, old_name: &str, new_name: &str) -> AppResult<usize> {
        if is_noop_rename(old_name, new_name) {
            return Ok(0);
        }
        let body = json!({ "oldName": old_name, "newName": new_name });
        let envelope = self.call(Method::POST, &["groups", "rename"], Some(body)).await?;
        Ok(envelope.count.unwrap_or(0))
    }

    async fn delete_group(&self, group_name: &str) -> AppResult<usize> {
        let body = json!({ "groupName": group_name });
        let envelope = self.call(Method::POST, &["groups", "delete"], Some(body)).await?;
        Ok(envelope.count.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::{self, edge_store};

    #[tokio::test]
    async fn test_lifecycle() {
        let store = edge_store("").await;
        assert!(store.ping().await.is_ok());
        testing::lifecycle(&store).await;
    }

    #[tokio::test]
    async fn test_updates_are_scoped() {
        testing::updates_are_scoped(&edge_store("/make-server").await).await;
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let config = EdgeConfig {
            url: "http://127.0.0.1:1".to_string(),
            api_key: String::new(),
        };
        let store = EdgeStore::new(&config, reqwest::Client::new()).unwrap();
        assert!(store.list().await.is_err());
        assert!(store.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_server_validation_message_surfaces() {
        let store = edge_store("").await;
        let mut input = testing::input("A", "G");
        input.model_url = "https://x/m.obj".to_string();
        let err = store.create(input).await.unwrap_err();
        match err {
            AppError::Upstream { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains(".glb"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ids_are_sent_as_one_segment() {
        let store = edge_store("/make-server").await;
        let created = store.create(testing::input("A", "G")).await.unwrap();
        let suffixed = format!("{}?x=1", created.id);

        let patch = ToolPatch {
            name: Some("X".to_string()),
            ..Default::default()
        };
        let err = store.update(&suffixed, patch).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert!(store.remove(&suffixed).await.unwrap());
        assert!(store.remove(&format!("{}/x", created.id)).await.unwrap());
        assert_eq!(store.list().await.unwrap(), vec![created]);
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let config = EdgeConfig {
            url: "https://fn.example.com/make-server/".to_string(),
            api_key: String::new(),
        };
        let store = EdgeStore::new(&config, reqwest::Client::new()).unwrap();
        assert_eq!(
            store.endpoint(&["tools", "a?b/c"]).as_str(),
            "https://fn.example.com/make-server/tools/a%3Fb%2Fc"
        );
        assert_eq!(
            store.endpoint(&["groups", "rename"]).path(),
            "/make-server/groups/rename"
        );
    }
}
