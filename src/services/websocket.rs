use crate::{
    models::websocket::user_destination,
    utils::stomp::{StompCommand, StompFrame},
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Server-to-client push. Best effort and at most once: a recipient with no
/// live subscription simply misses the push.
#[cfg_attr(test, mockall::automock)]
pub trait PushDelivery: Send + Sync {
    /// Returns how many live subscriptions accepted the payload.
    fn send_to_user(&self, user_id: i64, destination: &str, payload: Value) -> usize;
}

/// 连接信息
struct Connection {
    user_id: i64,
    tx: mpsc::UnboundedSender<String>,
    // subscription id -> destination
    subscriptions: RwLock<HashMap<String, String>>,
    connected_at: DateTime<Utc>,
}

/// WebSocket连接管理器
#[derive(Default)]
pub struct WebSocketHub {
    connections: DashMap<String, Arc<Connection>>,
    // 用户到连接的映射
    user_connections: DashMap<i64, HashSet<String>>,
}

impl WebSocketHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新连接
    pub fn register(&self, connection_id: &str, user_id: i64, tx: mpsc::UnboundedSender<String>) {
        let connection = Arc::new(Connection {
            user_id,
            tx,
            subscriptions: RwLock::new(HashMap::new()),
            connected_at: Utc::now(),
        });
        self.connections.insert(connection_id.to_string(), connection);
        self.user_connections
            .entry(user_id)
            .or_default()
            .insert(connection_id.to_string());

        debug!("Registered connection: {} for user: {}", connection_id, user_id);
    }

    /// 注销连接
    pub fn unregister(&self, connection_id: &str) {
        let Some((_, connection)) = self.connections.remove(connection_id) else {
            return;
        };

        let user_id = connection.user_id;
        let now_empty = match self.user_connections.get_mut(&user_id) {
            Some(mut ids) => {
                ids.remove(connection_id);
                ids.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.user_connections.remove_if(&user_id, |_, ids| ids.is_empty());
        }

        info!(
            "Unregistered connection: {} for user: {} (open for {}s)",
            connection_id,
            user_id,
            (Utc::now() - connection.connected_at).num_seconds()
        );
    }

    pub fn subscribe(&self, connection_id: &str, subscription_id: &str, destination: &str) -> bool {
        let Some(connection) = self.connection(connection_id) else {
            return false;
        };
        connection
            .subscriptions
            .write()
            .insert(subscription_id.to_string(), destination.to_string());
        debug!("Connection {} subscribed to {} as {}", connection_id, destination, subscription_id);
        true
    }

    pub fn unsubscribe(&self, connection_id: &str, subscription_id: &str) -> bool {
        self.connection(connection_id)
            .map(|connection| connection.subscriptions.write().remove(subscription_id).is_some())
            .unwrap_or(false)
    }

    /// Relays a body to every subscriber of `destination`.
    pub fn broadcast(&self, destination: &str, body: &str, content_type: &str) -> usize {
        let connections: Vec<Arc<Connection>> =
            self.connections.iter().map(|entry| entry.value().clone()).collect();

        connections
            .iter()
            .map(|connection| deliver(connection, destination, body, content_type))
            .sum()
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.user_connections
            .get(&user_id)
            .map(|ids| !ids.is_empty())
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn connection(&self, connection_id: &str) -> Option<Arc<Connection>> {
        self.connections.get(connection_id).map(|entry| entry.value().clone())
    }
}

impl PushDelivery for WebSocketHub {
    fn send_to_user(&self, user_id: i64, destination: &str, payload: Value) -> usize {
        let connection_ids: Vec<String> = match self.user_connections.get(&user_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => {
                debug!("User {} has no live connection, dropping push to {}", user_id, destination);
                return 0;
            }
        };

        let body = payload.to_string();
        let subscribed_as = user_destination(destination);

        connection_ids
            .iter()
            .filter_map(|id| self.connection(id))
            .map(|connection| deliver(&connection, &subscribed_as, &body, "application/json"))
            .sum()
    }
}

/// Sends one MESSAGE frame per matching subscription on the connection.
fn deliver(connection: &Connection, destination: &str, body: &str, content_type: &str) -> usize {
    let subscriptions: Vec<String> = connection
        .subscriptions
        .read()
        .iter()
        .filter(|(_, subscribed)| subscribed.as_str() == destination)
        .map(|(id, _)| id.clone())
        .collect();

    subscriptions
        .into_iter()
        .filter(|subscription_id| {
            let frame = StompFrame::new(StompCommand::Message)
                .header("destination", destination)
                .header("subscription", subscription_id.as_str())
                .header("message-id", Uuid::new_v4().to_string())
                .header("content-type", content_type)
                .body(body);
            connection.tx.send(frame.encode()).is_ok()
        })
        .count()
}
