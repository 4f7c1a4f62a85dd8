use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{Notifier, NotifyError};
use crate::config::NotifierConfig;

/// Rate-limited Twilio Messages API client
#[derive(Debug)]
pub struct TwilioNotifier {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_phone: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: Option<String>,
}

impl TwilioNotifier {
    pub fn new(
        api_base: &str,
        account_sid: String,
        auth_token: String,
        from_phone: String,
        timeout: Duration,
        max_per_second: u32,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport {
                message: e.to_string(),
            })?;

        let per_second = NonZeroU32::new(max_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            client,
            rate_limiter,
            api_base: api_base.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            from_phone,
        })
    }

    pub fn from_config(config: &NotifierConfig) -> Result<Self, NotifyError> {
        let account_sid = required(&config.account_sid, "account_sid")?;
        let auth_token = required(&config.auth_token, "auth_token")?;
        let from_phone = required(&config.from_phone, "from_phone")?;

        info!(api_base = %config.api_base, from = %from_phone, "Twilio notifier configured");

        Self::new(
            &config.api_base,
            account_sid,
            auth_token,
            from_phone,
            Duration::from_secs(config.timeout_seconds),
            config.max_per_second,
        )
    }

    pub fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

fn required(value: &Option<String>, field: &str) -> Result<String, NotifyError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(NotifyError::NotConfigured {
            reason: format!("missing notifier.{field}"),
        }),
    }
}

/// Extract the provider's `message` field, falling back to the raw body
fn rejection_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<TwilioErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("SMS provider returned HTTP {}", status.as_u16())
            } else {
                body.trim().to_string()
            }
        })
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, phone: &str, body: &str) -> Result<(), NotifyError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(50)))
            .await;

        let params = [("To", phone), ("From", self.from_phone.as_str()), ("Body", body)];
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| NotifyError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| NotifyError::Transport {
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message: rejection_message(status, &text),
            });
        }

        let sid = serde_json::from_str::<TwilioMessage>(&text)
            .ok()
            .and_then(|m| m.sid);
        debug!(to = %phone, sid = ?sid, "SMS accepted by provider");
        Ok(())
    }
}
