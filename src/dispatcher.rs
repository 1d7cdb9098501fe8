use crate::domain::Target;
use crate::push::{
    BearerToken, CredentialCache, CredentialError, PushGateway, PushMessage, PushPayload,
    SendError,
};
use crate::telemetry::token_prefix;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("no bearer credential for the push gateway")]
    Credential(#[from] CredentialError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryFailure {
    pub token: String,
    pub reason: String,
}

/// Per-target outcome of one dispatch. `succeeded + failed + skipped` always
/// equals the number of targets handed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl DispatchReport {
    pub fn success(&self) -> bool {
        self.succeeded > 0
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    fn record_failure(&mut self, token: &str, reason: String) {
        self.failed += 1;
        self.failures.push(DeliveryFailure {
            token: token_prefix(token),
            reason,
        });
    }
}

pub struct Dispatcher {
    gateway: Arc<dyn PushGateway>,
    credentials: Arc<CredentialCache>,
    max_in_flight: usize,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        gateway: Arc<dyn PushGateway>,
        credentials: Arc<CredentialCache>,
        max_in_flight: usize,
        send_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            credentials,
            max_in_flight: max_in_flight.max(1),
            send_timeout,
        }
    }

    /// Sends `payload` to every target with a token. A failing device never
    /// stops the others; only a missing credential aborts the dispatch.
    #[tracing::instrument(
        name = "Dispatch push notification",
        skip(self, targets, payload),
        fields(targets = targets.len(), title = %payload.title)
    )]
    pub async fn dispatch(
        &self,
        targets: &[Target],
        payload: &PushPayload,
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();
        let mut messages = Vec::with_capacity(targets.len());
        for target in targets {
            if target.has_token() {
                messages.push(PushMessage::for_target(payload, target));
            } else {
                report.skipped += 1;
            }
        }
        if messages.is_empty() {
            tracing::info!(skipped = report.skipped, "Nothing to send");
            return Ok(report);
        }

        let bearer = self.credentials.get_bearer_token().await?;
        let mut pending = messages.into_iter();
        let mut in_flight = JoinSet::new();
        loop {
            while in_flight.len() < self.max_in_flight {
                match pending.next() {
                    Some(message) => {
                        in_flight.spawn(self.send_one(bearer.clone(), message));
                    }
                    None => break,
                }
            }
            match in_flight.join_next().await {
                Some(Ok((_, Ok(_)))) => report.succeeded += 1,
                Some(Ok((token, Err(e)))) => {
                    match &e {
                        SendError::Unregistered => tracing::warn!(
                            token = %token_prefix(&token),
                            "The device token is no longer registered"
                        ),
                        _ => tracing::warn!(
                            token = %token_prefix(&token),
                            error.message = %e,
                            "Failed to deliver a push message"
                        ),
                    }
                    report.record_failure(&token, e.to_string());
                }
                Some(Err(e)) => {
                    tracing::error!(error.cause_chain = ?e, "A send task did not complete");
                    report.record_failure("", e.to_string());
                }
                None => break,
            }
        }

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "Dispatch finished"
        );
        Ok(report)
    }

    fn send_one(
        &self,
        bearer: BearerToken,
        message: PushMessage,
    ) -> impl std::future::Future<Output = (String, Result<String, SendError>)> + Send + 'static
    {
        let gateway = self.gateway.clone();
        let send_timeout = self.send_timeout;
        async move {
            let outcome = tokio::time::timeout(send_timeout, gateway.send(&bearer, &message))
                .await
                .unwrap_or(Err(SendError::Timeout));
            (message.token, outcome)
        }
    }
}
