use crate::dispatcher::{DispatchError, DispatchReport, Dispatcher};
use crate::domain::{
    human_time, DeviceRegistration, Event, EventFields, NewEvent, NotificationKind,
    RegistrationError, RegistrationFields, Scope, ScopeKind, Subscriber, Target,
};
use crate::import::{ImportPipeline, ImportRow, ImportSummary};
use crate::ledger::{DeliveryLedger, DispatchAttempt, DispatchStats};
use crate::push::{CredentialError, PushPayload};
use crate::resolver::LocationResolver;
use crate::store::{Store, StoreError};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error(transparent)]
    Validation(#[from] crate::domain::EventValidationError),
    #[error("no event with id {0}")]
    EventNotFound(Uuid),
    #[error("subscriber {0} has no active device token")]
    NoActiveToken(String),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Aborted(Box<DeliveryAborted>),
}

impl From<DeliveryAborted> for NotifyError {
    fn from(e: DeliveryAborted) -> Self {
        NotifyError::Aborted(Box::new(e))
    }
}

/// Why a dispatch stopped before any device was tried.
#[derive(thiserror::Error, Debug)]
pub enum AbortCause {
    #[error("push credential unavailable")]
    Credential(#[source] CredentialError),
    #[error("failed to resolve targets")]
    Resolution(#[source] StoreError),
}

/// A dispatch that could not go ahead. Its ledger row is already written and
/// any event it was announcing stays persisted.
#[derive(thiserror::Error, Debug)]
#[error("delivery to {} `{}` was aborted", .summary.scope_kind, .summary.scope_value)]
pub struct DeliveryAborted {
    pub event_id: Option<Uuid>,
    pub summary: DeliverySummary,
    #[source]
    pub cause: AbortCause,
}

/// What happened to one dispatch, as reported back to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliverySummary {
    pub scope_kind: String,
    pub scope_value: String,
    pub recipients: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub success: bool,
    pub error: Option<String>,
}

impl DeliverySummary {
    pub fn users_notified(&self) -> usize {
        self.succeeded
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventCreated {
    pub event_id: Uuid,
    /// `false` when an identical event already existed.
    pub created: bool,
    pub delivery: Option<DeliverySummary>,
}

/// The operations the HTTP front end exposes, wired over one store, resolver,
/// dispatcher and ledger.
pub struct Notifier {
    store: Arc<dyn Store>,
    resolver: LocationResolver,
    dispatcher: Dispatcher,
    ledger: DeliveryLedger,
}

impl Notifier {
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher) -> Self {
        Self {
            resolver: LocationResolver::new(store.clone()),
            ledger: DeliveryLedger::new(store.clone()),
            store,
            dispatcher,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    #[tracing::instrument(name = "Create event", skip(self, fields), fields(title = %fields.title))]
    pub async fn create_event(&self, fields: EventFields) -> Result<EventCreated, NotifyError> {
        let new_event = NewEvent::try_from(fields)?;
        if let Some(existing) = self
            .store
            .find_duplicate_event(
                new_event.title.as_ref(),
                new_event.scheduled_at.into_inner(),
                &new_event.location,
            )
            .await?
        {
            tracing::info!(event_id = %existing, "An identical event already exists");
            return Ok(EventCreated {
                event_id: existing,
                created: false,
                delivery: None,
            });
        }

        let event = new_event.into_event(Uuid::new_v4(), Utc::now());
        self.store.insert_event(&event).await?;

        let body = format!(
            "New event: {} at {} on {}",
            event.title,
            Scope::parse(&event.location).place(),
            human_time(&event.scheduled_at)
        );
        let payload = event_payload(&event, NotificationKind::NewEvent, body);
        let delivery = self
            .deliver(Some(event.id), NotificationKind::NewEvent, &event.location, payload)
            .await?;
        Ok(EventCreated {
            event_id: event.id,
            created: true,
            delivery: Some(delivery),
        })
    }

    #[tracing::instrument(name = "Update event", skip(self, fields))]
    pub async fn update_event(
        &self,
        id: Uuid,
        fields: EventFields,
    ) -> Result<DeliverySummary, NotifyError> {
        let current = self
            .store
            .find_event(id)
            .await?
            .ok_or(NotifyError::EventNotFound(id))?;
        let event = NewEvent::try_from(fields)?.into_event(id, current.created_at);
        if !self.store.update_event(&event).await? {
            return Err(NotifyError::EventNotFound(id));
        }

        let body = format!(
            "Event updated: {} at {} on {}",
            event.title,
            Scope::parse(&event.location).place(),
            human_time(&event.scheduled_at)
        );
        let payload = event_payload(&event, NotificationKind::EventUpdated, body);
        Ok(self
            .deliver(Some(id), NotificationKind::EventUpdated, &event.location, payload)
            .await?)
    }

    /// Sends straight to one subscriber's devices, whatever their home area.
    #[tracing::instrument(name = "Send ad hoc notification", skip(self, title, body))]
    pub async fn send_ad_hoc_notification(
        &self,
        subscriber_id: &str,
        title: &str,
        body: &str,
    ) -> Result<DeliverySummary, NotifyError> {
        let targets = self.store.subscriber_targets(subscriber_id).await?;
        if targets.is_empty() {
            return Err(NotifyError::NoActiveToken(subscriber_id.to_string()));
        }
        let payload = PushPayload::new(title, body)
            .with_data("notification_type", NotificationKind::Personal.as_str())
            .with_data("click_action", CLICK_ACTION);
        let attempt = DispatchAttempt::new(
            None,
            NotificationKind::Personal,
            ScopeKind::Subscriber,
            subscriber_id,
        );
        Ok(self.dispatch_and_record(attempt, &targets, &payload).await?)
    }

    #[tracing::instrument(name = "Send location notification", skip(self, title, body))]
    pub async fn send_location_notification(
        &self,
        scope: &str,
        title: &str,
        body: &str,
    ) -> Result<DeliverySummary, NotifyError> {
        let payload = PushPayload::new(title, body)
            .with_data("notification_type", NotificationKind::LocationAlert.as_str())
            .with_data("target_location", scope.trim())
            .with_data("click_action", CLICK_ACTION);
        Ok(self
            .deliver(None, NotificationKind::LocationAlert, scope, payload)
            .await?)
    }

    /// Records a device token together with its owner and home area. A token
    /// seen before is moved to the new owner and reactivated.
    #[tracing::instrument(
        name = "Register device token",
        skip(self, fields),
        fields(subscriber_id = %fields.subscriber_id)
    )]
    pub async fn register_device(
        &self,
        fields: RegistrationFields,
    ) -> Result<Subscriber, NotifyError> {
        let DeviceRegistration { subscriber, token } = DeviceRegistration::try_from(fields)?;
        self.store.save_subscriber(&subscriber).await?;
        self.store.save_device_token(&token).await?;
        tracing::info!(
            token = %crate::telemetry::token_prefix(&token.token),
            locality = %subscriber.area.locality,
            "Device token registered"
        );
        Ok(subscriber)
    }

    /// Aggregates the delivery ledger; `last_24h` counts attempts made in the
    /// past day.
    #[tracing::instrument(name = "Summarise dispatch attempts", skip(self))]
    pub async fn dispatch_stats(&self) -> Result<DispatchStats, NotifyError> {
        let since = Utc::now() - chrono::Duration::hours(24);
        Ok(self.store.dispatch_stats(since).await?)
    }

    /// Persists every acceptable row first, then notifies each accepted
    /// event's location in file order.
    #[tracing::instrument(name = "Import events", skip(self, rows), fields(rows = rows.len()))]
    pub async fn import_events(&self, rows: Vec<ImportRow>) -> ImportSummary {
        let mut summary = ImportPipeline::new(self.store.as_ref()).stage(rows).await;
        for accepted in summary.accepted.iter_mut() {
            let event = &accepted.event;
            let body = format!(
                "New event imported: {} at {} on {}",
                event.title,
                Scope::parse(&event.location).place(),
                human_time(&event.scheduled_at)
            );
            let payload = event_payload(event, NotificationKind::ImportedEvent, body)
                .with_data("notification_type", accepted.details.notification_kind.as_str())
                .with_data("recipient_group", accepted.details.recipient_group.as_str());
            let delivery = match self
                .deliver(
                    Some(event.id),
                    NotificationKind::ImportedEvent,
                    &event.location,
                    payload,
                )
                .await
            {
                Ok(delivery) => delivery,
                // Already logged and recorded; the row keeps its outcome.
                Err(aborted) => aborted.summary,
            };
            accepted.delivery = Some(delivery);
        }
        summary
    }

    async fn deliver(
        &self,
        event_id: Option<Uuid>,
        kind: NotificationKind,
        raw_scope: &str,
        payload: PushPayload,
    ) -> Result<DeliverySummary, DeliveryAborted> {
        let scope = Scope::parse(raw_scope);
        let attempt = DispatchAttempt::new(event_id, kind, scope.kind(), scope.value());
        match self.resolver.resolve_targets(&scope).await {
            Ok(targets) => self.dispatch_and_record(attempt, &targets, &payload).await,
            Err(e) => Err(self.abort(attempt, 0, AbortCause::Resolution(e)).await),
        }
    }

    async fn dispatch_and_record(
        &self,
        mut attempt: DispatchAttempt,
        targets: &[Target],
        payload: &PushPayload,
    ) -> Result<DeliverySummary, DeliveryAborted> {
        let report = match self.dispatcher.dispatch(targets, payload).await {
            Ok(report) => report,
            Err(DispatchError::Credential(e)) => {
                let cause = AbortCause::Credential(e);
                return Err(self.abort(attempt, targets.len(), cause).await);
            }
        };

        attempt.tokens_sent = report.attempted();
        attempt.success = report.success();
        attempt.error_message = failure_message(&report);
        let summary = summarise(&attempt, targets.len(), &report);
        self.ledger.record(attempt).await;
        Ok(summary)
    }

    async fn abort(
        &self,
        mut attempt: DispatchAttempt,
        recipients: usize,
        cause: AbortCause,
    ) -> DeliveryAborted {
        tracing::error!(error.cause_chain = ?cause, "Dispatch aborted");
        let detail = match &cause {
            AbortCause::Credential(e) => e.to_string(),
            AbortCause::Resolution(e) => e.to_string(),
        };
        attempt.success = false;
        attempt.error_message = Some(format!("{}: {}", cause, detail));
        let event_id = attempt.event_id;
        let summary = summarise(&attempt, recipients, &DispatchReport::default());
        self.ledger.record(attempt).await;
        DeliveryAborted {
            event_id,
            summary,
            cause,
        }
    }
}

fn failure_message(report: &DispatchReport) -> Option<String> {
    if report.success() || report.attempted() == 0 {
        None
    } else {
        Some(format!(
            "all {} deliveries failed; first error: {}",
            report.failed,
            report
                .failures
                .first()
                .map(|f| f.reason.as_str())
                .unwrap_or("unknown")
        ))
    }
}

fn summarise(attempt: &DispatchAttempt, recipients: usize, report: &DispatchReport) -> DeliverySummary {
    DeliverySummary {
        scope_kind: attempt.scope_kind.clone(),
        scope_value: attempt.scope_value.clone(),
        recipients,
        succeeded: report.succeeded,
        failed: report.failed,
        skipped: report.skipped,
        success: attempt.success,
        error: attempt.error_message.clone(),
    }
}

fn event_payload(event: &Event, kind: NotificationKind, body: String) -> PushPayload {
    PushPayload::new(event.title.clone(), body)
        .with_data("event_id", event.id.to_string())
        .with_data("event_title", event.title.clone())
        .with_data("event_type", event.category.clone())
        .with_data("event_description", event.description.clone())
        .with_data(
            "event_date",
            event.scheduled_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
        .with_data("event_location", event.location.clone())
        .with_data("event_organizer", event.organizer.clone())
        .with_data("notification_type", kind.as_str())
        .with_data("click_action", CLICK_ACTION)
}
