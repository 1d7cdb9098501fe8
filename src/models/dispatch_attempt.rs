use crate::ledger::DispatchAttempt;
use crate::schema::dispatch_attempts;
use chrono::offset::Utc;
use chrono::DateTime;
use diesel::{Insertable, Queryable};

#[derive(Queryable)]
pub struct DispatchAttemptRow {
    pub id: uuid::Uuid,
    pub event_id: Option<uuid::Uuid>,
    pub notification_kind: String,
    pub scope_kind: String,
    pub scope_value: String,
    pub tokens_sent: i32,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = dispatch_attempts)]
pub struct NewDispatchAttemptRow<'a> {
    pub id: &'a uuid::Uuid,
    pub event_id: Option<&'a uuid::Uuid>,
    pub notification_kind: &'a str,
    pub scope_kind: &'a str,
    pub scope_value: &'a str,
    pub tokens_sent: i32,
    pub success: bool,
    pub error_message: Option<&'a str>,
    pub created_at: &'a DateTime<Utc>,
}

impl<'a> From<&'a DispatchAttempt> for NewDispatchAttemptRow<'a> {
    fn from(attempt: &'a DispatchAttempt) -> Self {
        NewDispatchAttemptRow {
            id: &attempt.id,
            event_id: attempt.event_id.as_ref(),
            notification_kind: &attempt.notification_kind,
            scope_kind: &attempt.scope_kind,
            scope_value: &attempt.scope_value,
            tokens_sent: i32::try_from(attempt.tokens_sent).unwrap_or(i32::MAX),
            success: attempt.success,
            error_message: attempt.error_message.as_deref(),
            created_at: &attempt.created_at,
        }
    }
}

impl From<DispatchAttemptRow> for DispatchAttempt {
    fn from(row: DispatchAttemptRow) -> Self {
        DispatchAttempt {
            id: row.id,
            event_id: row.event_id,
            notification_kind: row.notification_kind,
            scope_kind: row.scope_kind,
            scope_value: row.scope_value,
            tokens_sent: usize::try_from(row.tokens_sent).unwrap_or_default(),
            success: row.success,
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}
