use crate::{
    error::AppError,
    models::{
        chat::{MarkReadRequest, SendMessageRequest},
        websocket::{is_broadcast_destination, is_broker_destination, AppDestination, SessionError, UserQueue},
    },
    services::{auth::AuthUser, PushDelivery},
    state::AppState,
    utils::stomp::{parse_frames, StompCommand, StompFrame},
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(websocket_handler))
}

/// WebSocket连接处理器
/// GET /ws
async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, state))
}

/// 处理WebSocket连接
async fn handle_websocket_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // 写任务：把会话和推送产生的帧依次写出
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut session = StompSession::new(state, tx);
    info!("WebSocket connection opened: {}", session.connection_id());

    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    session.reject("Binary frames must be UTF-8");
                    break;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("WebSocket receive error on {}: {}", session.connection_id(), e);
                break;
            }
        };

        if session.handle_text(&text).await == SessionControl::Close {
            break;
        }
    }

    info!("WebSocket connection closed: {}", session.connection_id());
    session.close();
    drop(session);
    let _ = writer.await;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    Continue,
    Close,
}

/// One STOMP session on top of a WebSocket. Outgoing frames go to `tx`
/// as encoded text.
pub struct StompSession {
    state: Arc<AppState>,
    connection_id: String,
    tx: mpsc::UnboundedSender<String>,
    user: Option<AuthUser>,
}

impl StompSession {
    pub fn new(state: Arc<AppState>, tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            state,
            connection_id: format!("conn_{}", Uuid::new_v4()),
            tx,
            user: None,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    /// Handles every frame in one WebSocket text message.
    pub async fn handle_text(&mut self, text: &str) -> SessionControl {
        let frames = match parse_frames(text) {
            Ok(frames) => frames,
            Err(e) => {
                self.send(StompFrame::error("Malformed frame", &e.to_string()));
                return SessionControl::Close;
            }
        };

        for frame in frames {
            if self.handle_frame(frame).await == SessionControl::Close {
                return SessionControl::Close;
            }
        }
        SessionControl::Continue
    }

    /// Sends ERROR; the caller closes the socket afterwards.
    pub fn reject(&self, message: &str) {
        self.send(StompFrame::error(message, ""));
    }

    /// Drops the connection from the hub; pending pushes are discarded.
    pub fn close(&mut self) {
        if self.user.take().is_some() {
            self.state.hub.unregister(&self.connection_id);
        }
    }

    async fn handle_frame(&mut self, frame: StompFrame) -> SessionControl {
        let Some(user) = self.user.clone() else {
            return match frame.command {
                StompCommand::Connect | StompCommand::Stomp => self.connect(&frame).await,
                _ => self.protocol_error("Not connected", "The first frame must be CONNECT"),
            };
        };

        let control = match frame.command {
            StompCommand::Connect | StompCommand::Stomp => {
                self.protocol_error("Already connected", "CONNECT was already accepted")
            }
            StompCommand::Subscribe => self.subscribe(&frame),
            StompCommand::Unsubscribe => self.unsubscribe(&frame),
            StompCommand::Send => self.dispatch(&user, &frame).await,
            StompCommand::Disconnect => {
                self.send_receipt(&frame);
                return SessionControl::Close;
            }
            // no transactions or acknowledgements: accepted and ignored
            StompCommand::Ack
            | StompCommand::Nack
            | StompCommand::Begin
            | StompCommand::Commit
            | StompCommand::Abort => SessionControl::Continue,
            StompCommand::Connected
            | StompCommand::Message
            | StompCommand::Receipt
            | StompCommand::Error => {
                self.protocol_error("Unexpected frame", frame.command.as_str())
            }
        };

        if control == SessionControl::Continue {
            self.send_receipt(&frame);
        }
        control
    }

    async fn connect(&mut self, frame: &StompFrame) -> SessionControl {
        if let Some(versions) = frame.get_header("accept-version") {
            if !versions.split(',').any(|v| v.trim() == "1.2") {
                return self.protocol_error("Unsupported protocol version", "Only STOMP 1.2 is supported");
            }
        }

        let token = frame
            .get_header("Authorization")
            .or_else(|| frame.get_header("authorization"))
            .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim())
            .or_else(|| frame.get_header("passcode").map(str::trim))
            .filter(|token| !token.is_empty());

        let Some(token) = token else {
            return self.protocol_error("Authentication failed", "Missing bearer token");
        };

        match self.state.auth_service.authenticate(token).await {
            Ok(user) => {
                self.state.hub.register(&self.connection_id, user.id, self.tx.clone());
                self.send(
                    StompFrame::new(StompCommand::Connected)
                        .header("version", "1.2")
                        .header("heart-beat", "0,0")
                        .header("user-name", user.username.as_str()),
                );
                info!("STOMP session {} connected as {}", self.connection_id, user.username);
                self.user = Some(user);
                SessionControl::Continue
            }
            Err(e) => {
                warn!("STOMP CONNECT rejected on {}: {}", self.connection_id, e);
                self.protocol_error("Authentication failed", "Invalid or expired token")
            }
        }
    }

    fn subscribe(&self, frame: &StompFrame) -> SessionControl {
        let (Some(id), Some(destination)) = (frame.get_header("id"), frame.get_header("destination")) else {
            return self.protocol_error("Invalid SUBSCRIBE", "Both 'id' and 'destination' are required");
        };
        if !is_broker_destination(destination) {
            return self.protocol_error("Invalid destination", destination);
        }

        self.state.hub.subscribe(&self.connection_id, id, destination);
        SessionControl::Continue
    }

    fn unsubscribe(&self, frame: &StompFrame) -> SessionControl {
        let Some(id) = frame.get_header("id") else {
            return self.protocol_error("Invalid UNSUBSCRIBE", "'id' is required");
        };
        self.state.hub.unsubscribe(&self.connection_id, id);
        SessionControl::Continue
    }

    async fn dispatch(&self, user: &AuthUser, frame: &StompFrame) -> SessionControl {
        let Some(destination) = frame.get_header("destination") else {
            return self.protocol_error("Invalid SEND", "'destination' is required");
        };

        if let Some(handler) = AppDestination::parse(destination) {
            let result = match handler {
                AppDestination::SendMessage => match parse_body::<SendMessageRequest>(&frame.body) {
                    Ok(request) => self
                        .state
                        .chat_service
                        .send_message(user.id, request.receiver_id, &request.content)
                        .await
                        .map(|_| ()),
                    Err(e) => Err(e),
                },
                AppDestination::MarkRead => match parse_body::<MarkReadRequest>(&frame.body) {
                    Ok(request) => self
                        .state
                        .chat_service
                        .mark_messages_as_read(request.chat_id, user.id)
                        .await
                        .map(|_| ()),
                    Err(e) => Err(e),
                },
            };

            if let Err(e) = result {
                self.push_error(user, destination, &e.to_string());
            }
            return SessionControl::Continue;
        }

        if is_broadcast_destination(destination) {
            let content_type = frame.get_header("content-type").unwrap_or("application/json");
            let delivered = self.state.hub.broadcast(destination, &frame.body, content_type);
            debug!("Relayed frame to {} subscribers of {}", delivered, destination);
            return SessionControl::Continue;
        }

        if destination.starts_with("/app/") {
            self.push_error(user, destination, "Unknown destination");
            return SessionControl::Continue;
        }

        self.protocol_error("Invalid destination", destination)
    }

    fn push_error(&self, user: &AuthUser, destination: &str, message: &str) {
        debug!("Session {} error on {}: {}", self.connection_id, destination, message);
        let error = SessionError {
            destination: destination.to_string(),
            message: message.to_string(),
        };
        match serde_json::to_value(&error) {
            Ok(payload) => {
                self.state
                    .hub
                    .send_to_user(user.id, UserQueue::Errors.destination(), payload);
            }
            Err(e) => warn!("Failed to encode session error: {}", e),
        }
    }

    fn send_receipt(&self, frame: &StompFrame) {
        if let Some(receipt) = frame.get_header("receipt") {
            self.send(StompFrame::new(StompCommand::Receipt).header("receipt-id", receipt));
        }
    }

    fn protocol_error(&self, message: &str, details: &str) -> SessionControl {
        self.send(StompFrame::error(message, details));
        SessionControl::Close
    }

    fn send(&self, frame: StompFrame) {
        if self.tx.send(frame.encode()).is_err() {
            debug!("Session {} writer already closed", self.connection_id);
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, AppError> {
    serde_json::from_str(body).map_err(|e| AppError::BadRequest(format!("Invalid message body: {}", e)))
}
