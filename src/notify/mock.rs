// Recording notifier for tests - no side effects

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{Notifier, NotifyError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub phone: String,
    pub body: String,
}

/// Records every message it is asked to send. Optionally fails each send with
/// a fixed error after recording the attempt, or delays each send.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMessage>>,
    failure: Option<NotifyError>,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(NotifyError::Transport {
                message: message.to_string(),
            }),
            delay: None,
        }
    }

    /// Waits `delay` before recording each send
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Poll until at least `count` sends were attempted or `timeout` elapses.
    /// Background deliveries land after the operation has returned.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<SentMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, phone: &str, body: &str) -> Result<(), NotifyError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().await.push(SentMessage {
            phone: phone.to_string(),
            body: body.to_string(),
        });
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
