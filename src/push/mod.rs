//! Push gateway plumbing: credentials, the service account exchange and the
//! FCM HTTP v1 client.

mod credentials;
mod fcm;
mod service_account;

use crate::domain::Target;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

pub use credentials::{
    BearerToken, Clock, CredentialCache, CredentialError, FreshToken, SystemClock, TokenSource,
};
pub use fcm::FcmGateway;
pub use service_account::{
    AssertionSigner, OAuthExchange, ServiceAccountKey, ServiceAccountTokenSource,
    DEFAULT_TOKEN_URI, MESSAGING_SCOPE,
};

#[derive(thiserror::Error, Debug)]
pub enum SendError {
    #[error("the gateway did not answer in time")]
    Timeout,
    #[error("failed to reach the gateway")]
    Transport(#[source] reqwest::Error),
    #[error("the device token is no longer registered")]
    Unregistered,
    #[error("the gateway rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("the gateway acknowledgement is malformed: {0}")]
    MalformedAcknowledgement(String),
}

/// What every device in a dispatch receives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// A payload addressed to one device, with that device's area merged into the
/// data under `area`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    pub fn for_target(payload: &PushPayload, target: &Target) -> Self {
        let mut data = payload.data.clone();
        data.insert("area".to_string(), target.area.locality.clone());
        Self {
            token: target.token.clone(),
            title: payload.title.clone(),
            body: payload.body.clone(),
            data,
        }
    }
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Delivers one message and returns the gateway's message name.
    async fn send(&self, bearer: &BearerToken, message: &PushMessage) -> Result<String, SendError>;
}
