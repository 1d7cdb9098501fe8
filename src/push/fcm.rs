use crate::push::{BearerToken, PushGateway, PushMessage, SendError};
use crate::telemetry::token_prefix;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Firebase Cloud Messaging HTTP v1 client.
pub struct FcmGateway {
    http_client: reqwest::Client,
    send_url: String,
}

#[derive(Deserialize)]
struct Acknowledgement {
    #[serde(default)]
    name: String,
}

impl FcmGateway {
    pub fn new(base_url: &str, project_id: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            send_url: format!(
                "{}/v1/projects/{}/messages:send",
                base_url.trim_end_matches('/'),
                project_id
            ),
        })
    }

    fn envelope(message: &PushMessage) -> serde_json::Value {
        serde_json::json!({
            "message": {
                "token": message.token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": message.data,
                "android": {
                    "priority": "high",
                    "notification": {
                        "sound": "default",
                    },
                },
                "apns": {
                    "payload": {
                        "aps": {
                            "sound": "default",
                            "badge": 1,
                        },
                    },
                },
            }
        })
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    #[tracing::instrument(
        name = "Send push message",
        skip(self, bearer, message),
        fields(token = %token_prefix(&message.token))
    )]
    async fn send(&self, bearer: &BearerToken, message: &PushMessage) -> Result<String, SendError> {
        let response = self
            .http_client
            .post(&self.send_url)
            .bearer_auth(bearer.expose())
            .json(&Self::envelope(message))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SendError::Timeout
                } else {
                    SendError::Transport(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(SendError::Transport)?;
        if status == StatusCode::OK {
            let ack: Acknowledgement = serde_json::from_str(&body)
                .map_err(|_| SendError::MalformedAcknowledgement(body.clone()))?;
            if ack.name.is_empty() {
                return Err(SendError::MalformedAcknowledgement(body));
            }
            return Ok(ack.name);
        }
        if status == StatusCode::NOT_FOUND || body.contains("UNREGISTERED") {
            return Err(SendError::Unregistered);
        }
        Err(SendError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
