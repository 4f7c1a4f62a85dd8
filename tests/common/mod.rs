// Shared helpers for the HTTP integration tests
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use async_trait::async_trait;
use laundry_flow::{
    build_app, config::ServerConfig, notify::RecordingNotifier, AppState, ContactRecord,
    InMemoryStore, NotificationMode, Partition, RecordStore, StoreError, StoredRecord,
    WorkflowEngine, WorkflowOptions,
};
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub app: Router,
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn create_test_app(options: WorkflowOptions) -> TestApp {
    create_test_app_with(options, RecordingNotifier::new(), &ServerConfig::default())
}

pub fn create_test_app_with(
    options: WorkflowOptions,
    notifier: RecordingNotifier,
    server: &ServerConfig,
) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(notifier);
    let engine = WorkflowEngine::new(
        store.clone() as Arc<dyn RecordStore>,
        notifier.clone(),
        options,
    );
    let app = build_app(Arc::new(AppState::new(engine)), server);
    TestApp {
        app,
        store,
        notifier,
    }
}

/// Router over an arbitrary store, for fault scenarios
pub fn create_app_with_store(store: Arc<dyn RecordStore>, options: WorkflowOptions) -> Router {
    let engine = WorkflowEngine::new(store, Arc::new(RecordingNotifier::new()), options);
    build_app(Arc::new(AppState::new(engine)), &ServerConfig::default())
}

/// Record store whose every operation fails with the same backend message
pub struct FailingStore {
    message: String,
}

impl FailingStore {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    fn fault(&self) -> StoreError {
        StoreError::backend(self.message.clone())
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn insert(
        &self,
        _partition: Partition,
        _record: ContactRecord,
    ) -> Result<StoredRecord, StoreError> {
        Err(self.fault())
    }

    async fn delete(
        &self,
        _partition: Partition,
        _id: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        Err(self.fault())
    }

    async fn find_by_contact(
        &self,
        _partition: Partition,
        _name: &str,
        _phone: &str,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        Err(self.fault())
    }

    async fn list(&self, _partition: Partition) -> Result<Vec<StoredRecord>, StoreError> {
        Err(self.fault())
    }
}

pub fn inline_options() -> WorkflowOptions {
    WorkflowOptions {
        duplicate_check: true,
        notification_mode: NotificationMode::Inline,
        ..WorkflowOptions::default()
    }
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn post_raw(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}
