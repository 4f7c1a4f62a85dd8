use thiserror::Error;

use crate::notify::NotifyError;
use crate::store::StoreError;

pub const DUPLICATE_CONTACT_MESSAGE: &str = "Contact already exists.";

/// Failure of a workflow operation. The display text is what callers see in
/// the `error` field.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{}", DUPLICATE_CONTACT_MESSAGE)]
    DuplicateContact,
    #[error(transparent)]
    StoreFault(#[from] StoreError),
    #[error(transparent)]
    NotifyFault(#[from] NotifyError),
    #[error("{0}")]
    InvalidRequest(String),
}

impl WorkflowError {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::DuplicateContact => "duplicate_contact",
            WorkflowError::StoreFault(_) => "store_fault",
            WorkflowError::NotifyFault(_) => "notify_fault",
            WorkflowError::InvalidRequest(_) => "invalid_request",
        }
    }
}
