//! REST surface: tracking management and diagnostics.

use crate::state::SharedState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracker_core::{
    AccountId, ChangeEvent, DeliveryPreferences, Direction, RequestError, SubscriberId,
    Subscription,
};
use tracing::{info, warn};

type ApiResponse = (StatusCode, Json<Value>);

fn bad_request(message: impl ToString) -> ApiResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.to_string() })),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    address_id: Option<String>,
    socket_id: Option<String>,
    #[serde(default)]
    preferences: Option<DeliveryPreferences>,
}

/// POST /api/track — subscribe a live connection to an account.
pub async fn track(
    State(state): State<SharedState>,
    Json(req): Json<TrackRequest>,
) -> ApiResponse {
    let (Some(address_id), Some(socket_id)) = (req.address_id.as_deref(), req.socket_id.as_deref())
    else {
        return bad_request("missing addressId or socketId");
    };

    let request = match Subscription::new(address_id, req.preferences) {
        Ok(request) => request,
        Err(e) => return bad_request(e),
    };
    let subscriber = match SubscriberId::parse(socket_id) {
        Ok(subscriber) => subscriber,
        Err(e) => return bad_request(e),
    };

    let snapshot = state.registry.subscribe(&request, &subscriber).await;
    state.poller.nudge();
    (
        StatusCode::OK,
        Json(json!({ "success": true, "balance": snapshot.balance })),
    )
}

/// DELETE /api/track — drop one subscription.
pub async fn untrack(
    State(state): State<SharedState>,
    Json(req): Json<TrackRequest>,
) -> ApiResponse {
    let (Some(address_id), Some(socket_id)) = (req.address_id.as_deref(), req.socket_id.as_deref())
    else {
        return bad_request("missing addressId or socketId");
    };
    let subscriber = match SubscriberId::parse(socket_id) {
        Ok(subscriber) => subscriber,
        Err(e) => return bad_request(e),
    };

    state
        .registry
        .unsubscribe(&AccountId::new(address_id), &subscriber)
        .await;
    (StatusCode::OK, Json(json!({ "success": true })))
}

/// GET /api/tracked — the currently tracked account ids.
pub async fn tracked(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({ "addresses": state.registry.list_tracked().await }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest {
    address_id: Option<String>,
    /// Accepted as a JSON number or a decimal string.
    amount: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Normalize the simulated amount, keeping the caller's rendering for the
/// event's difference field.
fn parse_amount(value: &Value) -> Result<(f64, String), RequestError> {
    let (amount, rendered) = match value {
        Value::String(s) => (s.parse::<f64>().map_err(|_| RequestError::InvalidAmount)?, s.clone()),
        Value::Number(n) => (n.as_f64().ok_or(RequestError::InvalidAmount)?, n.to_string()),
        _ => return Err(RequestError::InvalidAmount),
    };
    if !amount.is_finite() || amount <= 0.0 {
        return Err(RequestError::InvalidAmount);
    }
    Ok((amount, rendered))
}

/// POST /api/simulate-transaction — inject a synthetic balance change and
/// run it through the normal delivery path.
pub async fn simulate_transaction(
    State(state): State<SharedState>,
    Json(req): Json<SimulateRequest>,
) -> ApiResponse {
    let (Some(address_id), Some(amount), Some(kind)) =
        (req.address_id.as_deref(), req.amount.as_ref(), req.kind.as_deref())
    else {
        return bad_request("missing addressId, amount or type");
    };

    let direction: Direction = match kind.parse() {
        Ok(direction) => direction,
        Err(e) => return bad_request(e),
    };
    let (amount, difference) = match parse_amount(amount) {
        Ok(parsed) => parsed,
        Err(e) => return bad_request(e),
    };

    let account = AccountId::new(address_id);
    // Tracks the account (without subscribers) if nobody asked for it yet,
    // so the simulation always has a baseline.
    let old_balance = state.registry.ensure_tracked(&account).await;

    let old = old_balance.parse::<f64>().unwrap_or(0.0);
    let new = match direction {
        Direction::Incoming => old + amount,
        Direction::Outgoing => old - amount,
    };

    let event = ChangeEvent {
        old_balance: old.to_string(),
        new_balance: new.to_string(),
        difference,
        direction,
        timestamp: Utc::now(),
        simulated: true,
    };

    info!(
        account = %account,
        kind = %direction,
        amount = %event.difference,
        "Simulating transaction"
    );

    let notified = state.dispatcher.dispatch(&account, &event).await;
    if notified == 0 {
        warn!(account = %account, "Simulated transaction had no active recipients");
    }
    state
        .registry
        .commit_balance(&account, &event.new_balance)
        .await;

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": format!("Simulated transaction delivered to {notified} recipients"),
            "oldBalance": event.old_balance,
            "newBalance": event.new_balance,
            "difference": event.difference,
            "type": direction.to_string(),
            "notified": notified,
        })),
    )
}

/// GET /api/test-connection/:address_id — diagnostic probe of the
/// upstream RPC, returning its raw response.
pub async fn test_connection(
    State(state): State<SharedState>,
    Path(address_id): Path<String>,
) -> ApiResponse {
    match state.fetcher.probe(&AccountId::new(&address_id)).await {
        Ok(data) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Upstream RPC reachable",
                "data": data,
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "message": "Failed to reach upstream RPC",
                "error": e.to_string(),
            })),
        ),
    }
}
