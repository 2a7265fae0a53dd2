//! WebSocket endpoint and the live-push connection table.
//!
//! Each connected client gets a server-assigned subscriber id and an
//! outbound message queue. The connection table doubles as the live-push
//! channel: the dispatcher checks it for liveness and pushes change
//! events through it.

use crate::api;
use crate::state::SharedState;
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracker_alerts::{DeliveryError, LivePush};
use tracker_core::{AccountId, ChangeEvent, DeliveryPreferences, SubscriberId, Subscription};
use tracing::{debug, info, warn};

/// Change event as pushed to live clients: the account id plus the
/// flattened event fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    pub address_id: AccountId,
    #[serde(flatten)]
    pub event: ChangeEvent,
}

/// Server-to-client messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum WsServerMessage {
    /// Greets a new client with its assigned subscriber id.
    #[serde(rename_all = "camelCase")]
    Connected { socket_id: String },
    #[serde(rename_all = "camelCase")]
    TrackingConfirmed {
        address_id: String,
        balance: String,
        valid_for_tick: u64,
    },
    #[serde(rename_all = "camelCase")]
    TrackingError { address_id: String, error: String },
    #[serde(rename_all = "camelCase")]
    UntrackingConfirmed { address_id: String },
    TransactionDetected(TransactionPayload),
}

/// Client-to-server messages.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WsClientMessage {
    #[serde(rename_all = "camelCase")]
    Track {
        address_id: String,
        #[serde(default)]
        preferences: Option<DeliveryPreferences>,
    },
    #[serde(rename_all = "camelCase")]
    Untrack { address_id: String },
}

/// Live connections keyed by subscriber id. Implements the dispatcher's
/// push channel.
#[derive(Default)]
pub struct ConnectionTable {
    senders: DashMap<SubscriberId, mpsc::UnboundedSender<WsServerMessage>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, subscriber: &SubscriberId, tx: mpsc::UnboundedSender<WsServerMessage>) {
        self.senders.insert(subscriber.clone(), tx);
    }

    fn unregister(&self, subscriber: &SubscriberId) {
        self.senders.remove(subscriber);
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[async_trait]
impl LivePush for ConnectionTable {
    fn is_active(&self, subscriber: &SubscriberId) -> bool {
        self.senders
            .get(subscriber)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    async fn push(
        &self,
        subscriber: &SubscriberId,
        account: &AccountId,
        event: &ChangeEvent,
    ) -> Result<(), DeliveryError> {
        let tx = self
            .senders
            .get(subscriber)
            .ok_or_else(|| DeliveryError::Push("connection not registered".to_string()))?;
        tx.send(WsServerMessage::TransactionDetected(TransactionPayload {
            address_id: account.clone(),
            event: event.clone(),
        }))
        .map_err(|_| DeliveryError::Push("connection closed".to_string()))
    }
}

static NEXT_SOCKET: AtomicU64 = AtomicU64::new(1);

fn next_subscriber_id() -> SubscriberId {
    let n = NEXT_SOCKET.fetch_add(1, Ordering::Relaxed);
    SubscriberId::new(format!(
        "socket-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        n
    ))
}

/// Build the full HTTP router: websocket endpoint, REST surface, health.
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/api/track", post(api::track).delete(api::untrack))
        .route("/api/tracked", get(api::tracked))
        .route("/api/simulate-transaction", post(api::simulate_transaction))
        .route("/api/test-connection/:address_id", get(api::test_connection))
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one client connection for its lifetime. On close, the
/// subscriber is removed from every account it watched.
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let subscriber = next_subscriber_id();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<WsServerMessage>();

    state.connections.register(&subscriber, tx.clone());
    info!(subscriber = %subscriber, clients = state.connections.len(), "Client connected");

    let _ = tx.send(WsServerMessage::Connected {
        socket_id: subscriber.to_string(),
    });

    // Outbound pump: everything queued for this client, in order.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Failed to serialize outbound message"),
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_message(&text, &subscriber, &state, &tx).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(subscriber = %subscriber, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    state.connections.unregister(&subscriber);
    let removed = state.registry.remove_subscriber(&subscriber).await;
    send_task.abort();
    info!(subscriber = %subscriber, untracked = removed, "Client disconnected");
}

async fn handle_client_message(
    text: &str,
    subscriber: &SubscriberId,
    state: &SharedState,
    tx: &mpsc::UnboundedSender<WsServerMessage>,
) {
    let msg: WsClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(subscriber = %subscriber, error = %e, "Ignoring unparseable client message");
            return;
        }
    };

    match msg {
        WsClientMessage::Track {
            address_id,
            preferences,
        } => match Subscription::new(&address_id, preferences) {
            Ok(request) => {
                let snapshot = state.registry.subscribe(&request, subscriber).await;
                // Verify the fresh subscription on the next loop iteration
                // instead of waiting out the full poll interval.
                state.poller.nudge();
                let _ = tx.send(WsServerMessage::TrackingConfirmed {
                    address_id,
                    balance: snapshot.balance,
                    valid_for_tick: snapshot.valid_for_tick,
                });
            }
            Err(e) => {
                let _ = tx.send(WsServerMessage::TrackingError {
                    address_id,
                    error: e.to_string(),
                });
            }
        },
        WsClientMessage::Untrack { address_id } => {
            state
                .registry
                .unsubscribe(&AccountId::new(&address_id), subscriber)
                .await;
            let _ = tx.send(WsServerMessage::UntrackingConfirmed { address_id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tracker_core::Direction;

    fn sample_event() -> ChangeEvent {
        ChangeEvent {
            old_balance: "100".to_string(),
            new_balance: "150".to_string(),
            difference: "50.000000".to_string(),
            direction: Direction::Incoming,
            timestamp: Utc::now(),
            simulated: false,
        }
    }

    #[test]
    fn transaction_payload_flattens_the_event() {
        let msg = WsServerMessage::TransactionDetected(TransactionPayload {
            address_id: AccountId::new("QACC"),
            event: sample_event(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "transactionDetected");
        assert_eq!(json["data"]["addressId"], "QACC");
        assert_eq!(json["data"]["oldBalance"], "100");
        assert_eq!(json["data"]["newBalance"], "150");
        assert_eq!(json["data"]["difference"], "50.000000");
        assert_eq!(json["data"]["type"], "incoming");
    }

    #[test]
    fn confirmation_messages_use_camel_case() {
        let json = serde_json::to_value(WsServerMessage::TrackingConfirmed {
            address_id: "QACC".to_string(),
            balance: "100".to_string(),
            valid_for_tick: 7,
        })
        .unwrap();
        assert_eq!(json["type"], "trackingConfirmed");
        assert_eq!(json["data"]["addressId"], "QACC");
        assert_eq!(json["data"]["validForTick"], 7);

        let json = serde_json::to_value(WsServerMessage::UntrackingConfirmed {
            address_id: "QACC".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "untrackingConfirmed");
    }

    #[test]
    fn client_messages_parse_both_dialects() {
        let msg: WsClientMessage =
            serde_json::from_str(r#"{"type":"track","addressId":"QACC"}"#).unwrap();
        assert!(matches!(
            msg,
            WsClientMessage::Track { ref address_id, ref preferences }
                if address_id == "QACC" && preferences.is_none()
        ));

        let msg: WsClientMessage = serde_json::from_str(
            r#"{"type":"track","addressId":"QACC","preferences":{"email":"a@b.c"}}"#,
        )
        .unwrap();
        match msg {
            WsClientMessage::Track { preferences, .. } => {
                assert_eq!(preferences.unwrap().email.as_deref(), Some("a@b.c"));
            }
            _ => panic!("expected track message"),
        }

        let msg: WsClientMessage =
            serde_json::from_str(r#"{"type":"untrack","addressId":"QACC"}"#).unwrap();
        assert!(matches!(msg, WsClientMessage::Untrack { .. }));
    }

    #[tokio::test]
    async fn connection_table_tracks_liveness() {
        let table = ConnectionTable::new();
        let subscriber = SubscriberId::new("socket-1");
        assert!(!table.is_active(&subscriber));

        let (tx, mut rx) = mpsc::unbounded_channel();
        table.register(&subscriber, tx);
        assert!(table.is_active(&subscriber));

        table
            .push(&subscriber, &AccountId::new("QACC"), &sample_event())
            .await
            .unwrap();
        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, WsServerMessage::TransactionDetected(_)));

        // Dropping the receiver marks the connection dead even before
        // the table entry is removed.
        drop(rx);
        assert!(!table.is_active(&subscriber));

        table.unregister(&subscriber);
        assert!(table.is_empty());
        assert!(table
            .push(&subscriber, &AccountId::new("QACC"), &sample_event())
            .await
            .is_err());
    }
}
