//! `GET /api/dashboard`: profile, recent items and the caller's lists.

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::aggregate::{bearer_credential, Envelope, Verification};
use crate::error::GatewayError;
use crate::http::server::AppState;

/// Each slice is `null` when its constituent failed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub user: Option<Value>,
    pub recent_items: Option<Value>,
    pub user_lists: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

/// Keep at most `limit` entries when the item service ignored the limit.
fn truncate_items(items: Value, limit: usize) -> Value {
    match items {
        Value::Array(mut entries) => {
            entries.truncate(limit);
            Value::Array(entries)
        }
        other => other,
    }
}

fn slice<T>(name: &str, result: Result<T, GatewayError>) -> Option<T> {
    result
        .inspect_err(|e| tracing::warn!(slice = %name, error = %e, "Dashboard slice unavailable"))
        .ok()
}

pub async fn dashboard_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Envelope<Dashboard>>, GatewayError> {
    let credential = bearer_credential(&headers)
        .ok_or_else(|| GatewayError::Unauthorized("bearer token required".into()))?;

    let composite = &state.config.composite;
    let timeout = state.config.timeouts.composite();
    let items_path = format!("/items?limit={}", composite.recent_items_limit);

    let (user, items, lists) = tokio::join!(
        state.verifier.verify(credential),
        state.dispatcher.get_json(&composite.item_service, &items_path, None, timeout),
        state.dispatcher.get_json(&composite.list_service, "/lists", Some(credential), timeout),
    );

    let user = match user {
        Verification::Valid(identity) => Some(identity),
        Verification::Rejected => {
            tracing::info!("Dashboard credential rejected by verifier");
            None
        }
        Verification::Unavailable(e) => slice("user", Err::<Value, _>(e)),
    };

    let dashboard = Dashboard {
        user,
        recent_items: slice("recentItems", items).map(|v| truncate_items(v, composite.recent_items_limit)),
        user_lists: slice("userLists", lists),
        timestamp: state.registry.clock().now(),
    };

    Ok(Json(Envelope::ok(dashboard)))
}
