//! SMS notification abstractions
//!
//! The workflow only needs `send(phone, body)`. Concrete providers live in
//! submodules and are chosen from configuration at startup.

pub mod mock;
pub mod twilio;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::config::{NotifierConfig, NotifierProvider};

pub use mock::RecordingNotifier;
pub use twilio::TwilioNotifier;

pub const READY_FOR_DELIVERY_MESSAGE: &str = "Your clothes are ready for delivery.";
pub const DELIVERED_MESSAGE: &str = "Your clothes have been delivered.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("{message}")]
    Transport { message: String },
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("Notifier is not configured: {reason}")]
    NotConfigured { reason: String },
}

/// Fire-and-forget message sending capability
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, phone: &str, body: &str) -> Result<(), NotifyError>;
}

/// Notifier used when no provider is configured. Messages are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, phone: &str, body: &str) -> Result<(), NotifyError> {
        debug!(phone = %phone, body = %body, "Notifications disabled, message not sent");
        Ok(())
    }
}

/// Build the notifier selected by configuration
pub fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config.provider {
        NotifierProvider::None => Ok(Arc::new(DisabledNotifier)),
        NotifierProvider::Twilio => Ok(Arc::new(TwilioNotifier::from_config(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_notifier_accepts_everything() {
        let notifier = DisabledNotifier;
        assert!(notifier.send("+15551234", DELIVERED_MESSAGE).await.is_ok());
    }

    #[test]
    fn test_build_notifier_requires_twilio_credentials() {
        let config = NotifierConfig {
            provider: NotifierProvider::Twilio,
            ..NotifierConfig::default()
        };
        let err = build_notifier(&config).err().unwrap();
        assert!(matches!(err, NotifyError::NotConfigured { .. }));
    }

    #[test]
    fn test_build_notifier_defaults_to_disabled() {
        assert!(build_notifier(&NotifierConfig::default()).is_ok());
    }
}
