// 🌐 HTTP Record Repository - headless CMS REST dialect
//
// GET    /api/{plural}?filters[..]=..   -> { data: [..] }   (users: bare array)
// GET    /api/{plural}/{id}              -> { data: {..} }   (users: bare object)
// POST   /api/{plural}       { data }    -> { data: {..} }
// PUT    /api/{plural}/{id}  { data }    -> { data: {..} }
// DELETE /api/{plural}/{id}
//
// A bearer credential is attached to every call.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{Collection, Filter, Query, Record, RecordId, RecordRepository};
use crate::error::{BffError, BffResult};

#[derive(Clone)]
pub struct HttpRepository {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpRepository {
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        HttpRepository {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, collection: Collection, id: Option<RecordId>) -> String {
        match id {
            Some(id) => format!("{}/api/{}/{}", self.base_url, collection.path(), id),
            None => format!("{}/api/{}", self.base_url, collection.path()),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> BffResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| BffError::upstream(operation, e.status().map(|s| s.as_u16()), e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        Err(upstream_error(operation, response).await)
    }

    async fn read_json(&self, operation: &str, response: Response) -> BffResult<Value> {
        response
            .json::<Value>()
            .await
            .map_err(|e| BffError::upstream(operation, None, format!("unreadable body: {e}")))
    }
}

/// Turn a non-2xx response into an upstream failure carrying the store's own message
pub(crate) async fn upstream_error(operation: &str, response: Response) -> BffError {
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("upstream request failed")
            .to_string()
    });
    BffError::upstream(operation, Some(status.as_u16()), message)
}

/// `{ error: { message } }` (CMS) or `{ errors: [{ detail }] }` (payment provider)
pub(crate) fn error_message(body: &Value) -> Option<String> {
    body.pointer("/error/message")
        .or_else(|| body.pointer("/errors/0/detail"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ============================================================================
// QUERY STRING ENCODING
// ============================================================================

fn filter_params(filter: &Filter, prefix: &str, out: &mut Vec<(String, String)>) {
    match filter {
        Filter::All => {}
        Filter::NameEqualsIgnoreCase(name) => {
            out.push((format!("{prefix}[name][$eqi]"), name.trim().to_string()));
        }
        Filter::RelationIs { field, id } => {
            out.push((format!("{prefix}[{field}][id][$eq]"), id.to_string()));
        }
        Filter::And(parts) => {
            for (i, part) in parts.iter().enumerate() {
                filter_params(part, &format!("{prefix}[$and][{i}]"), out);
            }
        }
    }
}

/// Encode a query in the store's bracketed filter syntax
pub fn encode_query(query: &Query) -> String {
    let mut params = Vec::new();
    filter_params(&query.filter, "filters", &mut params);

    for (i, (field, order)) in query.sort.iter().enumerate() {
        params.push((format!("sort[{i}]"), format!("{}:{}", field, order.as_str())));
    }
    if let Some(limit) = query.limit {
        params.push(("pagination[limit]".to_string(), limit.to_string()));
    }
    params.push(("populate".to_string(), "*".to_string()));

    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn unwrap_one(collection: Collection, body: Value) -> Option<Record> {
    let inner = if collection.is_enveloped() {
        body.get("data").cloned().unwrap_or(Value::Null)
    } else {
        body
    };
    Record::from_json(inner)
}

fn unwrap_many(collection: Collection, body: Value) -> Vec<Record> {
    let inner = if collection.is_enveloped() {
        body.get("data").cloned().unwrap_or(Value::Null)
    } else {
        body
    };
    match inner {
        Value::Array(items) => items.into_iter().filter_map(Record::from_json).collect(),
        _ => Vec::new(),
    }
}

fn wrap_payload(collection: Collection, fields: Map<String, Value>) -> Value {
    if collection.is_enveloped() {
        json!({ "data": fields })
    } else {
        Value::Object(fields)
    }
}

// ============================================================================
// REPOSITORY IMPLEMENTATION
// ============================================================================

#[async_trait]
impl RecordRepository for HttpRepository {
    async fn find(&self, collection: Collection, query: &Query) -> BffResult<Vec<Record>> {
        let operation = format!("GET {}", collection.path());
        let url = format!("{}?{}", self.url(collection, None), encode_query(query));
        debug!(%url, "repository find");

        let response = self.send(&operation, self.request(Method::GET, &url)).await?;
        let body = self.read_json(&operation, response).await?;
        Ok(unwrap_many(collection, body))
    }

    async fn get(&self, collection: Collection, id: RecordId) -> BffResult<Option<Record>> {
        let operation = format!("GET {}/{}", collection.path(), id);
        let url = format!("{}?populate=*", self.url(collection, Some(id)));

        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| BffError::upstream(&operation, None, e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(upstream_error(&operation, response).await);
        }

        let body = self.read_json(&operation, response).await?;
        Ok(unwrap_one(collection, body))
    }

    async fn create(&self, collection: Collection, fields: Map<String, Value>) -> BffResult<Record> {
        let operation = format!("POST {}", collection.path());
        let request = self
            .request(Method::POST, &self.url(collection, None))
            .json(&wrap_payload(collection, fields));

        let response = self.send(&operation, request).await?;
        let body = self.read_json(&operation, response).await?;
        unwrap_one(collection, body)
            .ok_or_else(|| BffError::upstream(&operation, None, "response carried no record id"))
    }

    async fn update(
        &self,
        collection: Collection,
        id: RecordId,
        fields: Map<String, Value>,
    ) -> BffResult<Record> {
        let operation = format!("PUT {}/{}", collection.path(), id);
        let request = self
            .request(Method::PUT, &self.url(collection, Some(id)))
            .json(&wrap_payload(collection, fields));

        let response = match self.send(&operation, request).await {
            Err(BffError::UpstreamFailure { status: Some(404), .. }) => {
                return Err(BffError::not_found(format!("{} {}", collection.path(), id)));
            }
            other => other?,
        };
        let body = self.read_json(&operation, response).await?;
        unwrap_one(collection, body)
            .ok_or_else(|| BffError::upstream(&operation, None, "response carried no record id"))
    }

    async fn delete(&self, collection: Collection, id: RecordId) -> BffResult<()> {
        let operation = format!("DELETE {}/{}", collection.path(), id);
        match self
            .send(&operation, self.request(Method::DELETE, &self.url(collection, Some(id))))
            .await
        {
            Ok(_) => Ok(()),
            Err(BffError::UpstreamFailure { status: Some(404), .. }) => {
                Err(BffError::not_found(format!("{} {}", collection.path(), id)))
            }
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
