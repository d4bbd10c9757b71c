//! Tabular REST adapter
//!
//! Talks to a PostgREST-style table API (`/rest/v1/{table}`) with row filters
//! in the query string (`id=eq.{id}`). The table stores the group under a
//! `group_name` column and assigns `created_at` itself.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};

use super::{is_noop_rename, BackendKind, ToolStore};
use crate::config::RestConfig;
use crate::entity::{Tool, ToolInput, ToolPatch, GROUP_UNGROUPED};
use crate::error::{AppError, AppResult, OptionExt};
use crate::mapper::{self, InsertRow, PatchRow};

const PREFER_REPRESENTATION: &str = "return=representation";

pub struct RestStore {
    client: reqwest::Client,
    root_url: String,
    table_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(config: &RestConfig, client: reqwest::Client) -> AppResult<Self> {
        if config.url.trim().is_empty() {
            return Err(AppError::Config("backend.rest.url is not set".to_string()));
        }
        let root_url = format!("{}/rest/v1/", config.url.trim_end_matches('/'));
        let table_url = format!("{}{}", root_url, config.table);
        Ok(Self {
            client,
            root_url,
            table_url,
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: Method, filters: &[(&str, String)]) -> RequestBuilder {
        self.authorized(method, &self.table_url).query(filters)
    }

    fn authorized(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
    }

    /// Issue a write that returns the affected rows
    async fn write_rows(&self, builder: RequestBuilder) -> AppResult<Vec<Tool>> {
        let response = builder
            .header("Prefer", PREFER_REPRESENTATION)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(mapper::decode_rows(response.json().await?))
    }

    async fn fetch_one(&self, id: &str) -> AppResult<Tool> {
        let response = self
            .request(Method::GET, &[("id", eq(id))])
            .send()
            .await?;
        let response = ensure_success(response).await?;
        mapper::decode_rows(response.json().await?)
            .into_iter()
            .next()
            .ok_or_not_found(id)
    }

    async fn regroup(&self, from: &str, to: &str) -> AppResult<usize> {
        let body = PatchRow {
            group_name: Some(to.to_string()),
            ..Default::default()
        };
        let rows = self
            .write_rows(
                self.request(Method::PATCH, &[("group_name", eq(from))])
                    .json(&body),
            )
            .await?;
        Ok(rows.len())
    }

    async fn fetch_all(&self) -> AppResult<Vec<Tool>> {
        let response = self
            .request(Method::GET, &[("order", "created_at.desc".to_string())])
            .send()
            .await?;

        // Table not provisioned yet
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE
        ) {
            tracing::debug!("Tool table not available ({}), treating as empty", response.status());
            return Ok(Vec::new());
        }

        let response = ensure_success(response).await?;
        Ok(mapper::decode_rows(response.json().await?))
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Turn a non-2xx response into an error carrying the server's text
async fn ensure_success(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    tracing::error!("Table API error {}: {}", status, message);
    Err(AppError::Upstream {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ToolStore for RestStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Rest
    }

    /// Hit the API root; unlike `list`, any failure is reported
    async fn ping(&self) -> AppResult<()> {
        let response = self.authorized(Method::GET, &self.root_url).send().await?;
        ensure_success(response).await.map(|_| ())
    }

    async fn list(&self) -> AppResult<Vec<Tool>> {
        match self.fetch_all().await {
            Ok(tools) => Ok(tools),
            Err(e) => {
                tracing::error!("获取工具失败: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn create(&self, input: ToolInput) -> AppResult<Tool> {
        let rows = self
            .write_rows(self.request(Method::POST, &[]).json(&InsertRow::from(input)))
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("insert returned no row".to_string()))
    }

    async fn update(&self, id: &str, patch: ToolPatch) -> AppResult<Tool> {
        if patch.is_empty() {
            return self.fetch_one(id).await;
        }
        let rows = self
            .write_rows(
                self.request(Method::PATCH, &[("id", eq(id))])
                    .json(&PatchRow::from(patch)),
            )
            .await?;
        rows.into_iter().next().ok_or_not_found(id)
    }

    async fn remove(&self, id: &str) -> AppResult<bool> {
        let response = self
            .request(Method::DELETE, &[("id", eq(id))])
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(true)
    }

    async fn rename_group(&self, old_name: &str, new_name: &str) -> AppResult<usize> {
        if is_noop_rename(old_name, new_name) {
            return Ok(0);
        }
        self.regroup(old_name, new_name).await
    }

    async fn delete_group(&self, group_name: &str) -> AppResult<usize> {
        self.regroup(group_name, GROUP_UNGROUPED).await
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Minimal in-process table API for exercising [`RestStore`] over HTTP

    use axum::{
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    use serde_json::{json, Map, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct Table {
        pub provisioned: bool,
        /// Answer every request with a 500
        pub failing: bool,
        pub rows: Vec<Value>,
        pub requests: usize,
    }

    pub type MockDb = Arc<Mutex<Table>>;

    fn matches(row: &Value, filters: &HashMap<String, String>) -> bool {
        filters
            .iter()
            .filter(|(k, _)| k.as_str() != "order")
            .all(|(column, cond)| {
                let want = cond.strip_prefix("eq.").unwrap_or(cond);
                row.get(column).and_then(Value::as_str) == Some(want)
            })
    }

    fn admit(db: &MockDb, headers: &HeaderMap) -> Result<(), Response> {
        let mut table = db.lock().unwrap();
        table.requests += 1;
        if headers.get("apikey").is_none() {
            return Err((StatusCode::UNAUTHORIZED, "missing apikey").into_response());
        }
        if table.failing {
            return Err(
                (StatusCode::INTERNAL_SERVER_ERROR, "database is restarting").into_response(),
            );
        }
        Ok(())
    }

    fn check(db: &MockDb, headers: &HeaderMap) -> Result<(), Response> {
        admit(db, headers)?;
        if !db.lock().unwrap().provisioned {
            return Err((
                StatusCode::NOT_FOUND,
                Json(json!({"message": "relation \"fracking_tools\" does not exist"})),
            )
                .into_response());
        }
        Ok(())
    }

    /// API root answers whether or not the table exists
    async fn root(State(db): State<MockDb>, headers: HeaderMap) -> Response {
        match admit(&db, &headers) {
            Ok(()) => Json(json!({})).into_response(),
            Err(resp) => resp,
        }
    }

    async fn select(
        State(db): State<MockDb>,
        headers: HeaderMap,
        Query(filters): Query<HashMap<String, String>>,
    ) -> Response {
        if let Err(resp) = check(&db, &headers) {
            return resp;
        }
        let table = db.lock().unwrap();
        let mut rows: Vec<Value> = table
            .rows
            .iter()
            .filter(|r| matches(r, &filters))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b["created_at"].as_str().cmp(&a["created_at"].as_str()));
        Json(rows).into_response()
    }

    async fn insert(
        State(db): State<MockDb>,
        headers: HeaderMap,
        Json(body): Json<Map<String, Value>>,
    ) -> Response {
        if let Err(resp) = check(&db, &headers) {
            return resp;
        }
        if body.contains_key("group") {
            return (
                StatusCode::BAD_REQUEST,
                "Could not find the 'group' column of 'fracking_tools'",
            )
                .into_response();
        }
        let mut row = body;
        row.insert("id".to_string(), json!(uuid::Uuid::new_v4().to_string()));
        row.insert(
            "created_at".to_string(),
            json!(chrono::Utc::now()
                .format("%Y-%m-%dT%H:%M:%S%.6f+00:00")
                .to_string()),
        );
        let row = Value::Object(row);
        db.lock().unwrap().rows.push(row.clone());
        (StatusCode::CREATED, Json(vec![row])).into_response()
    }

    async fn patch(
        State(db): State<MockDb>,
        headers: HeaderMap,
        Query(filters): Query<HashMap<String, String>>,
        Json(body): Json<Map<String, Value>>,
    ) -> Response {
        if let Err(resp) = check(&db, &headers) {
            return resp;
        }
        let mut table = db.lock().unwrap();
        let mut changed = Vec::new();
        for row in table.rows.iter_mut().filter(|r| matches(r, &filters)) {
            if let Some(obj) = row.as_object_mut() {
                for (k, v) in &body {
                    obj.insert(k.clone(), v.clone());
                }
            }
            changed.push(row.clone());
        }
        Json(changed).into_response()
    }

    async fn delete(
        State(db): State<MockDb>,
        headers: HeaderMap,
        Query(filters): Query<HashMap<String, String>>,
    ) -> Response {
        if let Err(resp) = check(&db, &headers) {
            return resp;
        }
        db.lock().unwrap().rows.retain(|r| !matches(r, &filters));
        StatusCode::NO_CONTENT.into_response()
    }

    /// Serve a mock table on an ephemeral port, returning its base URL
    pub async fn spawn(provisioned: bool) -> (String, MockDb) {
        let db: MockDb = Arc::new(Mutex::new(Table {
            provisioned,
            ..Default::default()
        }));
        let app = Router::new()
            .route("/rest/v1/", get(root))
            .route(
                "/rest/v1/fracking_tools",
                get(select).post(insert).patch(patch).delete(delete),
            )
            .with_state(db.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), db)
    }
}
