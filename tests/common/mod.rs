#![allow(dead_code)]

use parking_lot::Mutex;
use pixelgram::{
    config::Config,
    models::user::RegisterRequest,
    services::{Database, LocalFileStorage, PushDelivery, WebSocketHub},
    state::AppState,
};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Push channel that records every push instead of delivering it.
pub struct RecordingPush {
    accepts: usize,
    pushes: Mutex<Vec<(i64, String, Value)>>,
}

impl RecordingPush {
    /// `accepts` is what every push reports as the number of live subscriptions.
    pub fn new(accepts: usize) -> Self {
        Self {
            accepts,
            pushes: Mutex::new(Vec::new()),
        }
    }

    pub fn pushes_to(&self, user_id: i64, destination: &str) -> Vec<Value> {
        self.pushes
            .lock()
            .iter()
            .filter(|(to, dest, _)| *to == user_id && dest == destination)
            .map(|(_, _, payload)| payload.clone())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.pushes.lock().len()
    }
}

impl PushDelivery for RecordingPush {
    fn send_to_user(&self, user_id: i64, destination: &str, payload: Value) -> usize {
        self.pushes.lock().push((user_id, destination.to_string(), payload));
        self.accepts
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub push: Arc<RecordingPush>,
}

pub fn test_config() -> Config {
    let upload_dir = std::env::temp_dir().join(format!("pixelgram-test-{}", Uuid::new_v4()));
    Config {
        upload_dir: upload_dir.to_string_lossy().to_string(),
        ..Config::default()
    }
}

/// In-memory database, recording push channel, temp upload dir.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(RecordingPush::new(0)).await
}

pub async fn spawn_app_with(push: RecordingPush) -> TestApp {
    let config = test_config();
    let db = Arc::new(Database::in_memory().await.expect("in-memory database"));
    let push = Arc::new(push);
    let storage = Arc::new(LocalFileStorage::new(&config).expect("local storage"));

    let state = AppState::with_collaborators(config, db, Arc::new(WebSocketHub::new()), push.clone(), storage)
        .await
        .expect("app state");

    TestApp {
        state: Arc::new(state),
        push,
    }
}

/// Registers a user and returns `(user id, access token)`.
pub async fn register(state: &AppState, username: &str) -> (i64, String) {
    let response = state
        .auth_service
        .register(RegisterRequest {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "password123".to_string(),
        })
        .await
        .expect("registration succeeds");

    let user = state
        .auth_service
        .authenticate(&response.access_token)
        .await
        .expect("fresh token authenticates");

    (user.id, response.access_token)
}

/// A 1x1 PNG as a data URL
pub const PNG_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
