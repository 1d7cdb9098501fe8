use crate::domain::{NotificationKind, ScopeKind};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// One audit row per dispatch attempt. Rows are only ever appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchAttempt {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub notification_kind: String,
    pub scope_kind: String,
    pub scope_value: String,
    pub tokens_sent: usize,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DispatchAttempt {
    pub fn new(
        event_id: Option<Uuid>,
        kind: NotificationKind,
        scope_kind: ScopeKind,
        scope_value: impl Into<String>,
    ) -> Self {
        DispatchAttempt {
            id: Uuid::new_v4(),
            event_id,
            notification_kind: kind.as_str().to_string(),
            scope_kind: scope_kind.as_str().to_string(),
            scope_value: scope_value.into(),
            tokens_sent: 0,
            success: false,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

/// Totals over the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchStats {
    pub total: i64,
    pub succeeded: i64,
    pub failed: i64,
    /// Percentage of successful attempts, rounded to one decimal place.
    pub success_rate: f64,
    pub tokens_sent: i64,
    pub last_24h: i64,
    pub by_notification_kind: BTreeMap<String, i64>,
    pub by_scope_kind: BTreeMap<String, i64>,
}

impl DispatchStats {
    pub fn with_success_rate(mut self) -> Self {
        self.success_rate = if self.total > 0 {
            (self.succeeded as f64 * 1000.0 / self.total as f64).round() / 10.0
        } else {
            0.0
        };
        self
    }
}

pub struct DeliveryLedger {
    store: Arc<dyn Store>,
}

impl DeliveryLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Appends `attempt`. A failed write is logged and dropped so it never
    /// changes the outcome reported for the dispatch itself.
    #[tracing::instrument(
        name = "Record dispatch attempt",
        skip(self, attempt),
        fields(
            notification_kind = %attempt.notification_kind,
            scope_value = %attempt.scope_value,
            tokens_sent = attempt.tokens_sent,
            success = attempt.success
        )
    )]
    pub async fn record(&self, attempt: DispatchAttempt) {
        if let Err(e) = self.store.append_dispatch_attempt(&attempt).await {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "Failed to write the dispatch attempt to the ledger"
            );
        }
    }
}
