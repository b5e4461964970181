//! In-memory `comments` record collection
//!
//! A small JSON REST resource: list, create, read, replace, patch and delete
//! over a single collection. Records are JSON objects with a unique `id`,
//! numbered from 1 unless the client supplies one.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Name of the identifier field
const ID_FIELD: &str = "id";

/// Why a record could not be inserted
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CreateError {
    #[error("a record with id {0} already exists")]
    DuplicateId(String),
    #[error("id must be a string or a number")]
    InvalidId,
}

/// The `comments` collection
#[derive(Debug, Default)]
pub struct CommentStore {
    records: RwLock<Vec<Map<String, Value>>>,
}

impl CommentStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records whose fields equal every filter value
    pub fn list(&self, filters: &HashMap<String, String>) -> Vec<Map<String, Value>> {
        self.records
            .read()
            .iter()
            .filter(|record| {
                filters
                    .iter()
                    .all(|(field, expected)| record.get(field).is_some_and(|v| matches(v, expected)))
            })
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Map<String, Value>> {
        self.records.read().iter().find(|r| has_id(r, id)).cloned()
    }

    /// Insert `record`. A missing or null id gets the next free number; an
    /// explicit string or number id is kept as given.
    pub fn create(&self, mut record: Map<String, Value>) -> Result<Map<String, Value>, CreateError> {
        let mut records = self.records.write();
        match record.get(ID_FIELD) {
            None | Some(Value::Null) => {
                let next = records
                    .iter()
                    .filter_map(|r| r.get(ID_FIELD).and_then(Value::as_u64))
                    .max()
                    .map_or(1, |max| max + 1);
                record.insert(ID_FIELD.to_string(), json!(next));
            }
            Some(id @ (Value::String(_) | Value::Number(_))) => {
                let id = id_text(id);
                if records.iter().any(|r| has_id(r, &id)) {
                    return Err(CreateError::DuplicateId(id));
                }
            }
            Some(_) => return Err(CreateError::InvalidId),
        }
        records.push(record.clone());
        Ok(record)
    }

    /// Replace the record with `id`; the stored id itself is preserved
    pub fn replace(&self, id: &str, mut record: Map<String, Value>) -> Option<Map<String, Value>> {
        let mut records = self.records.write();
        let slot = records.iter_mut().find(|r| has_id(r, id))?;
        if let Some(existing) = slot.get(ID_FIELD).cloned() {
            record.insert(ID_FIELD.to_string(), existing);
        }
        *slot = record.clone();
        Some(record)
    }

    /// Shallow-merge `changes` into the record with `id`
    pub fn patch(&self, id: &str, changes: Map<String, Value>) -> Option<Map<String, Value>> {
        let mut records = self.records.write();
        let slot = records.iter_mut().find(|r| has_id(r, id))?;
        for (field, value) in changes {
            if field != ID_FIELD {
                slot.insert(field, value);
            }
        }
        Some(slot.clone())
    }

    pub fn delete(&self, id: &str) -> bool {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|record| !has_id(record, id));
        records.len() != before
    }
}

/// Ids compare by their text, so `/comments/7` finds both `7` and `"7"`
fn has_id(record: &Map<String, Value>, id: &str) -> bool {
    record.get(ID_FIELD).is_some_and(|value| matches(value, id))
}

fn id_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compare a JSON field with a query-string value
fn matches(value: &Value, expected: &str) -> bool {
    id_text(value) == expected
}

/// Routes for the collection, mounted at `/comments`
pub fn router(store: Arc<CommentStore>) -> Router {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route(
            "/comments/{id}",
            get(read_comment)
                .put(replace_comment)
                .patch(patch_comment)
                .delete(delete_comment),
        )
        .fallback(not_found)
        .with_state(store)
}

fn bad_request(message: impl ToString) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.to_string() })),
    )
        .into_response()
}

fn object(body: Value) -> Result<Map<String, Value>, Response> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(bad_request("expected a JSON object")),
    }
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({}))).into_response()
}

async fn list_comments(
    State(store): State<Arc<CommentStore>>,
    Query(filters): Query<HashMap<String, String>>,
) -> Json<Vec<Map<String, Value>>> {
    Json(store.list(&filters))
}

async fn create_comment(
    State(store): State<Arc<CommentStore>>,
    Json(body): Json<Value>,
) -> Response {
    let record = match object(body) {
        Ok(record) => record,
        Err(response) => return response,
    };
    match store.create(record) {
        Ok(created) => {
            debug!(id = ?created.get(ID_FIELD), "Comment created");
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(e @ CreateError::DuplicateId(_)) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e @ CreateError::InvalidId) => bad_request(e),
    }
}

async fn read_comment(State(store): State<Arc<CommentStore>>, Path(id): Path<String>) -> Response {
    match store.get(&id) {
        Some(record) => Json(record).into_response(),
        None => not_found().await,
    }
}

async fn replace_comment(
    State(store): State<Arc<CommentStore>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let record = match object(body) {
        Ok(record) => record,
        Err(response) => return response,
    };
    match store.replace(&id, record) {
        Some(record) => Json(record).into_response(),
        None => not_found().await,
    }
}

async fn patch_comment(
    State(store): State<Arc<CommentStore>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let changes = match object(body) {
        Ok(changes) => changes,
        Err(response) => return response,
    };
    match store.patch(&id, changes) {
        Some(record) => Json(record).into_response(),
        None => not_found().await,
    }
}

async fn delete_comment(State(store): State<Arc<CommentStore>>, Path(id): Path<String>) -> Response {
    if store.delete(&id) {
        Json(json!({})).into_response()
    } else {
        not_found().await
    }
}
