mod devices;
mod dispatch_attempts;
mod events;
mod health_check;
mod notifications;

pub use devices::*;
pub use dispatch_attempts::*;
pub use events::*;
pub use health_check::*;
pub use notifications::*;

use crate::notifier::{DeliveryAborted, NotifyError};
use rocket::http::Status;
use rocket::response::{status, Responder};
use rocket::serde::json::Json;
use rocket::Request;

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

#[derive(thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    DeliveryAborted(Box<DeliveryAborted>),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<NotifyError> for ApiError {
    fn from(e: NotifyError) -> Self {
        match e {
            NotifyError::Validation(e) => ApiError::BadRequest(e.to_string()),
            NotifyError::Registration(e) => ApiError::BadRequest(e.to_string()),
            NotifyError::EventNotFound(_) | NotifyError::NoActiveToken(_) => {
                ApiError::NotFound(e.to_string())
            }
            NotifyError::Store(e) => ApiError::UnexpectedError(
                anyhow::Error::new(e).context("The event store is unavailable"),
            ),
            NotifyError::Aborted(e) => ApiError::DeliveryAborted(e),
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        let status = match self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::DeliveryAborted(_) | ApiError::UnexpectedError(_) => {
                Status::InternalServerError
            }
        };
        let body = match &self {
            ApiError::UnexpectedError(_) => serde_json::json!({ "error": "internal server error" }),
            // The event (if any) is already stored; tell the caller which one.
            ApiError::DeliveryAborted(aborted) => serde_json::json!({
                "error": "notification delivery was aborted",
                "event_id": aborted.event_id,
                "delivery": aborted.summary,
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        };
        if status == Status::InternalServerError {
            tracing::error!("ApiError: {:?}", self);
        } else {
            tracing::warn!("ApiError: {:?}", self);
        }
        status::Custom(status, Json(body)).respond_to(request)
    }
}

/// Rejects blank notification text before anything is resolved or sent.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!(
            "missing required field `{}`",
            field
        )));
    }
    Ok(())
}
