use crate::ledger::{DispatchAttempt, DispatchStats};
use crate::notifier::Notifier;
use crate::routes::ApiError;
use anyhow::Context;
use rocket::serde::json::Json;
use rocket::State;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

/// Most recent ledger rows, newest first.
#[tracing::instrument(name = "Listing dispatch attempts", skip(notifier))]
#[get("/dispatch_attempts?<limit>")]
pub async fn list_dispatch_attempts(
    limit: Option<usize>,
    notifier: &State<Notifier>,
) -> Result<Json<Vec<DispatchAttempt>>, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let attempts = notifier
        .store()
        .recent_dispatch_attempts(limit)
        .await
        .context("Failed to read the delivery ledger")?;
    Ok(Json(attempts))
}

#[tracing::instrument(name = "Summarising dispatch attempts", skip(notifier))]
#[get("/dispatch_attempts/stats")]
pub async fn dispatch_stats(notifier: &State<Notifier>) -> Result<Json<DispatchStats>, ApiError> {
    Ok(Json(notifier.dispatch_stats().await?))
}
