use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::sender::{SentMessage, SmsError, SmsSender};
use crate::config::TwilioConfig;

const TWILIO_API: &str = "https://api.twilio.com/2010-04-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Twilio codes for an unusable destination number.
const INVALID_NUMBER_CODES: [u32; 2] = [21211, 21614];
const AUTH_FAILED_CODE: u32 = 20003;

/// Sends messages through the Twilio Messages API.
pub struct TwilioClient {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: String,
}

impl TwilioClient {
    pub fn new(cfg: &TwilioConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build twilio http client")?;
        Ok(Self {
            http,
            account_sid: cfg.account_sid.clone(),
            auth_token: cfg.auth_token.clone(),
            from_number: cfg.from_number.clone(),
        })
    }
}

#[async_trait]
impl SmsSender for TwilioClient {
    #[instrument(skip(self, body))]
    async fn send(&self, to: &str, body: &str) -> Result<SentMessage, SmsError> {
        let url = format!("{TWILIO_API}/Accounts/{}/Messages.json", self.account_sid);
        let resp = self
            .http
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "twilio request failed");
                SmsError::Send(e.to_string())
            })?;

        let status = resp.status();
        if status.is_success() {
            let msg = resp
                .json::<MessageResource>()
                .await
                .map_err(|e| SmsError::Send(e.to_string()))?;
            debug!(sid = %msg.sid, status = %msg.status, "twilio accepted message");
            return Ok(SentMessage {
                sid: msg.sid,
                status: msg.status,
            });
        }

        let err = resp.json::<ApiError>().await.unwrap_or_default();
        warn!(%status, code = ?err.code, message = %err.message, "twilio rejected message");
        Err(classify(status.as_u16(), err))
    }
}

fn classify(http_status: u16, err: ApiError) -> SmsError {
    let code = err.code.unwrap_or_default();
    if INVALID_NUMBER_CODES.contains(&code) || err.message.to_lowercase().contains("phone number") {
        return SmsError::InvalidPhone;
    }
    if http_status == 401 || code == AUTH_FAILED_CODE {
        return SmsError::Auth;
    }
    let message = if err.message.is_empty() {
        format!("HTTP {http_status}")
    } else {
        err.message
    };
    SmsError::Send(message)
}
