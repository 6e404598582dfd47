//! WebSocket feed of committed ledger events
//!
//! Clients receive every event by default, or only those for the properties
//! they subscribed to. Events carry no authority; clients re-fetch listing
//! state through the HTTP API when one arrives.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use homeward_ledger::{LedgerEvent, PropertyId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

const EVENT_BUFFER: usize = 100;

/// WebSocket server state
#[derive(Clone)]
pub struct WsState {
    tx: broadcast::Sender<LedgerEvent>,
    clients: Arc<RwLock<HashMap<Uuid, Subscription>>>,
}

/// Properties a client listens to; empty means all of them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscription {
    properties: BTreeSet<PropertyId>,
}

impl Subscription {
    pub fn wants(&self, event: &LedgerEvent) -> bool {
        self.properties.is_empty() || self.properties.contains(&event.property_id())
    }

    fn add(&mut self, ids: &[PropertyId]) {
        self.properties.extend(ids.iter().copied());
    }

    fn remove(&mut self, ids: &[PropertyId]) {
        for id in ids {
            self.properties.remove(id);
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe { property_ids: Vec<PropertyId> },
    Unsubscribe { property_ids: Vec<PropertyId> },
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Event { event: LedgerEvent },
    Subscribed { property_ids: Vec<PropertyId> },
    Unsubscribed { property_ids: Vec<PropertyId> },
    Pong,
    Error { message: String },
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

impl WsState {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_BUFFER);
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fan an event out to connected clients. No receivers is not an error.
    pub fn broadcast_event(&self, event: LedgerEvent) {
        match self.tx.send(event) {
            Ok(receivers) => tracing::debug!(receivers, "Broadcast ledger event"),
            Err(_) => tracing::trace!("No WebSocket clients connected"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }

    pub async fn connected_clients(&self) -> usize {
        self.clients.read().await.len()
    }

    async fn register_client(&self, client_id: Uuid) {
        self.clients
            .write()
            .await
            .insert(client_id, Subscription::default());
        tracing::info!(client = %client_id, "WebSocket client connected");
    }

    async fn unregister_client(&self, client_id: &Uuid) {
        self.clients.write().await.remove(client_id);
        tracing::info!(client = %client_id, "WebSocket client disconnected");
    }

    async fn client_wants(&self, client_id: &Uuid, event: &LedgerEvent) -> bool {
        self.clients
            .read()
            .await
            .get(client_id)
            .is_some_and(|subscription| subscription.wants(event))
    }

    async fn handle_message(&self, client_id: &Uuid, message: ClientMessage) -> ServerMessage {
        match message {
            ClientMessage::Subscribe { property_ids } => {
                if let Some(subscription) = self.clients.write().await.get_mut(client_id) {
                    subscription.add(&property_ids);
                }
                tracing::debug!(client = %client_id, ?property_ids, "Client subscribed");
                ServerMessage::Subscribed { property_ids }
            }
            ClientMessage::Unsubscribe { property_ids } => {
                if let Some(subscription) = self.clients.write().await.get_mut(client_id) {
                    subscription.remove(&property_ids);
                }
                tracing::debug!(client = %client_id, ?property_ids, "Client unsubscribed");
                ServerMessage::Unsubscribed { property_ids }
            }
            ClientMessage::Ping => ServerMessage::Pong,
        }
    }
}

/// Upgrades the HTTP connection to a WebSocket
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let client_id = Uuid::new_v4();
    state.register_client(client_id).await;

    let (mut sender, mut receiver) = socket.split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(32);
    let mut events = state.subscribe();

    let send_state = state.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        if !send_state.client_wants(&client_id, &event).await {
                            continue;
                        }
                        ServerMessage::Event { event }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(client = %client_id, skipped, "WebSocket client lagging");
                        ServerMessage::Error {
                            message: format!("missed {} events, re-fetch state", skipped),
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(reply) = reply_rx.recv() => reply,
                else => break,
            };

            let text = match serde_json::to_string(&outgoing) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize WebSocket message");
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => recv_state.handle_message(&client_id, message).await,
                Err(e) => ServerMessage::Error {
                    message: format!("unrecognized message: {}", e),
                },
            };
            if reply_tx.send(reply).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.unregister_client(&client_id).await;
}
