use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{AddContactRequest, OperationResponse, TransitionRequest};
use super::AppState;
use crate::store::Partition;
use crate::workflows::WorkflowError;

fn rejected(rejection: JsonRejection) -> OperationResponse {
    let err = WorkflowError::InvalidRequest(rejection.body_text());
    warn!(error = %err, "Rejected request body");
    OperationResponse::from(&err)
}

fn write_result<T>(result: Result<T, WorkflowError>) -> OperationResponse {
    match result {
        Ok(_) => OperationResponse::ok(),
        Err(err) => {
            debug!(kind = err.kind(), error = %err, "Operation failed");
            OperationResponse::from(&err)
        }
    }
}

pub async fn add_contact(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddContactRequest>, JsonRejection>,
) -> OperationResponse {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejected(rejection),
    };
    write_result(state.engine.intake(&req.name, &req.phone).await)
}

pub async fn mark_ready(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> OperationResponse {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejected(rejection),
    };
    write_result(
        state
            .engine
            .advance_to_ready(&req.id, &req.name, &req.phone)
            .await,
    )
}

pub async fn mark_delivered(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> OperationResponse {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejected(rejection),
    };
    write_result(
        state
            .engine
            .advance_to_delivered(&req.id, &req.name, &req.phone)
            .await,
    )
}

async fn list_partition(state: &AppState, partition: Partition) -> Response {
    match state.engine.contacts(partition).await {
        Ok(records) => Json(records).into_response(),
        Err(err) => OperationResponse::from(&err).into_response(),
    }
}

pub async fn contacts_in_work(State(state): State<Arc<AppState>>) -> Response {
    list_partition(&state, Partition::InWork).await
}

pub async fn contacts_ready_for_delivery(State(state): State<Arc<AppState>>) -> Response {
    list_partition(&state, Partition::ReadyForDelivery).await
}

pub async fn contacts_history(State(state): State<Arc<AppState>>) -> Response {
    list_partition(&state, Partition::History).await
}

pub async fn status(State(state): State<Arc<AppState>>) -> Response {
    match state.engine.status().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => OperationResponse::from(&err).into_response(),
    }
}

pub async fn health() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}
