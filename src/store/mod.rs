//! Persistence for events, subscribers, device tokens and the delivery ledger.

mod memory;
mod postgres;

use crate::domain::{DeviceToken, Event, Scope, Subscriber, Target};
use crate::ledger::{DispatchAttempt, DispatchStats};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("failed to get a database connection")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("database query failed")]
    Query(#[from] diesel::result::Error),
    #[error("database task did not complete")]
    Task(#[from] tokio::task::JoinError),
    #[error("store rejected the write: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_event(&self, event: &Event) -> Result<(), StoreError>;

    /// Overwrites the editable fields of an existing event. Returns `false`
    /// when no event has that id.
    async fn update_event(&self, event: &Event) -> Result<bool, StoreError>;

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    /// Id of an event with exactly this title, time and location, if any.
    async fn find_duplicate_event(
        &self,
        title: &str,
        scheduled_at: NaiveDateTime,
        location: &str,
    ) -> Result<Option<Uuid>, StoreError>;

    async fn save_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError>;

    async fn save_device_token(&self, token: &DeviceToken) -> Result<(), StoreError>;

    /// Active, non-empty tokens of subscribers with a recorded locality that
    /// falls inside `scope`.
    async fn targets(&self, scope: &Scope) -> Result<Vec<Target>, StoreError>;

    /// Active, non-empty tokens of one subscriber, wherever they live.
    async fn subscriber_targets(&self, subscriber_id: &str) -> Result<Vec<Target>, StoreError>;

    async fn append_dispatch_attempt(&self, attempt: &DispatchAttempt) -> Result<(), StoreError>;

    /// Newest first.
    async fn recent_dispatch_attempts(&self, limit: usize)
        -> Result<Vec<DispatchAttempt>, StoreError>;

    /// Ledger totals; `last_24h` counts attempts created at or after `since`.
    async fn dispatch_stats(&self, since: DateTime<Utc>) -> Result<DispatchStats, StoreError>;
}
