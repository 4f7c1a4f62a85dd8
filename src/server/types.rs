use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::workflows::WorkflowError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddContactRequest {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransitionRequest {
    pub id: String,
    pub name: String,
    pub phone: String,
}

/// Body of every write response, and of read responses that failed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OperationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<&WorkflowError> for OperationResponse {
    fn from(err: &WorkflowError) -> Self {
        OperationResponse::failed(err.to_string())
    }
}

// Failures are reported in the body; the status stays 200.
impl IntoResponse for OperationResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
