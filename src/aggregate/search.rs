//! `GET /api/search?q=...`: fans the term out to the item and list services.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::form_urlencoded::byte_serialize;

use crate::aggregate::{bearer_credential, Envelope};
use crate::error::GatewayError;
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct SearchSlice {
    pub results: Vec<Value>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub items: SearchSlice,
    pub lists: SearchSlice,
}

/// Accepts either a bare array or `{ "results": [...], "total": n }`.
/// Anything else collapses to the empty slice.
pub fn normalize_results(body: Value) -> SearchSlice {
    match body {
        Value::Array(results) => SearchSlice {
            total: results.len() as u64,
            results,
        },
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(results)) => {
                let total = map
                    .get("total")
                    .and_then(Value::as_u64)
                    .unwrap_or(results.len() as u64);
                SearchSlice { results, total }
            }
            _ => SearchSlice::default(),
        },
        _ => SearchSlice::default(),
    }
}

fn settle(name: &str, result: Result<Value, GatewayError>) -> SearchSlice {
    match result {
        Ok(body) => normalize_results(body),
        Err(e) => {
            tracing::warn!(slice = %name, error = %e, "Search slice unavailable");
            SearchSlice::default()
        }
    }
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> Result<Json<Envelope<SearchResults>>, GatewayError> {
    let term = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| GatewayError::BadRequest("query parameter `q` is required".into()))?;

    let encoded: String = byte_serialize(term.as_bytes()).collect();
    let path = format!("/search?q={encoded}");
    let credential = bearer_credential(&headers);
    let composite = &state.config.composite;
    let timeout = state.config.timeouts.composite();

    // Lists are private to a user; without a credential the slice stays empty.
    let lists = async {
        match credential {
            Some(credential) => Some(
                state
                    .dispatcher
                    .get_json(&composite.list_service, &path, Some(credential), timeout)
                    .await,
            ),
            None => None,
        }
    };

    let (items, lists) = tokio::join!(
        state.dispatcher.get_json(&composite.item_service, &path, None, timeout),
        lists,
    );

    let results = SearchResults {
        items: settle("items", items),
        lists: lists.map(|r| settle("lists", r)).unwrap_or_default(),
    };

    Ok(Json(Envelope::ok(results)))
}
