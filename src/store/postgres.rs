use crate::configuration::DatabaseSettings;
use crate::domain::{DeviceToken, Event, HomeArea, Scope, Subscriber, Target};
use crate::ledger::{DispatchAttempt, DispatchStats};
use crate::models::{
    DispatchAttemptRow, EventChanges, EventRow, NewDeviceTokenRow, NewDispatchAttemptRow,
    NewEventRow, NewSubscriberRow,
};
use crate::store::{Store, StoreError};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::dsl::{count_star, sum};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use secrecy::ExposeSecret;
use std::time::Duration;
use uuid::Uuid;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Postgres-backed `Store`. Diesel is synchronous, so every query runs on the
/// blocking pool with a pooled connection.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

type TargetRow = (String, String, String, String);

/// Caps how long the server may spend on any one statement of a pooled
/// connection.
#[derive(Debug)]
struct StatementTimeout(Duration);

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, connection: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        diesel::sql_query(statement_timeout_sql(self.0))
            .execute(connection)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

fn statement_timeout_sql(timeout: Duration) -> String {
    format!("SET statement_timeout = {}", timeout.as_millis())
}

impl PgStore {
    pub fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let manager =
            ConnectionManager::<PgConnection>::new(settings.connection_string().expose_secret());
        let pool = Pool::builder()
            .max_size(settings.max_connections)
            .connection_timeout(settings.connect_timeout())
            .connection_customizer(Box::new(StatementTimeout(settings.query_timeout())))
            .build(manager)?;
        Ok(Self { pool })
    }

    #[tracing::instrument(name = "Running database migrations", skip(self))]
    pub fn run_migrations(&self) -> Result<(), anyhow::Error> {
        let mut connection = self.pool.get()?;
        let applied = connection
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!("Failed to run database migrations: {}", e))?;
        tracing::info!(applied = applied.len(), "Database schema is up to date");
        Ok(())
    }

    async fn run<F, T>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, diesel::result::Error> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get()?;
            query(&mut *connection).map_err(StoreError::from)
        })
        .await?
    }
}

/// Escapes `%`, `_` and `\` so user data is matched literally by `ILIKE`.
fn like_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn into_target((token, subscriber_id, locality, region): TargetRow) -> Target {
    Target {
        token,
        subscriber_id,
        area: HomeArea::new(locality, region),
    }
}

#[async_trait]
impl Store for PgStore {
    #[tracing::instrument(name = "Saving new event", skip(self, event), fields(event_id = %event.id))]
    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        use crate::schema::events;
        let event = event.clone();
        self.run(move |c| {
            diesel::insert_into(events::table)
                .values(NewEventRow::from(&event))
                .execute(c)
                .map(|_| ())
        })
        .await
    }

    #[tracing::instrument(name = "Updating event", skip(self, event), fields(event_id = %event.id))]
    async fn update_event(&self, event: &Event) -> Result<bool, StoreError> {
        use crate::schema::events;
        let event = event.clone();
        self.run(move |c| {
            diesel::update(events::table.find(event.id))
                .set(EventChanges::from(&event))
                .execute(c)
                .map(|updated| updated > 0)
        })
        .await
    }

    #[tracing::instrument(name = "Fetching event", skip(self))]
    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        use crate::schema::events;
        self.run(move |c| {
            events::table
                .find(id)
                .first::<EventRow>(c)
                .optional()
                .map(|row| row.map(Event::from))
        })
        .await
    }

    #[tracing::instrument(name = "Looking up duplicate event", skip(self))]
    async fn find_duplicate_event(
        &self,
        title: &str,
        scheduled_at: NaiveDateTime,
        location: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        use crate::schema::events;
        let title = title.to_string();
        let location = location.to_string();
        self.run(move |c| {
            events::table
                .filter(events::title.eq(title))
                .filter(events::scheduled_at.eq(scheduled_at))
                .filter(events::location.eq(location))
                .select(events::id)
                .first::<Uuid>(c)
                .optional()
        })
        .await
    }

    #[tracing::instrument(name = "Saving subscriber", skip(self, subscriber), fields(subscriber_id = %subscriber.id))]
    async fn save_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError> {
        use crate::schema::subscribers;
        let id = subscriber.id.clone();
        let area = subscriber.area.normalised();
        self.run(move |c| {
            let row = NewSubscriberRow {
                id: &id,
                locality: &area.locality,
                region: &area.region,
            };
            diesel::insert_into(subscribers::table)
                .values(&row)
                .on_conflict(subscribers::id)
                .do_update()
                .set((
                    subscribers::locality.eq(row.locality),
                    subscribers::region.eq(row.region),
                ))
                .execute(c)
                .map(|_| ())
        })
        .await
    }

    #[tracing::instrument(name = "Saving device token", skip(self, token), fields(subscriber_id = %token.subscriber_id))]
    async fn save_device_token(&self, token: &DeviceToken) -> Result<(), StoreError> {
        use crate::schema::device_tokens;
        let token = token.clone();
        self.run(move |c| {
            let row = NewDeviceTokenRow {
                token: &token.token,
                subscriber_id: &token.subscriber_id,
                active: token.active,
            };
            diesel::insert_into(device_tokens::table)
                .values(&row)
                .on_conflict(device_tokens::token)
                .do_update()
                .set((
                    device_tokens::subscriber_id.eq(row.subscriber_id),
                    device_tokens::active.eq(row.active),
                ))
                .execute(c)
                .map(|_| ())
        })
        .await
    }

    #[tracing::instrument(name = "Querying targets for scope", skip(self), fields(scope = %scope))]
    async fn targets(&self, scope: &Scope) -> Result<Vec<Target>, StoreError> {
        use crate::schema::{device_tokens, subscribers};
        let scope = scope.clone();
        self.run(move |c| {
            let mut query = device_tokens::table
                .inner_join(subscribers::table)
                .select((
                    device_tokens::token,
                    subscribers::id,
                    subscribers::locality,
                    subscribers::region,
                ))
                .filter(device_tokens::active.eq(true))
                .filter(device_tokens::token.ne(""))
                .filter(subscribers::locality.ne(""))
                .order((subscribers::id, device_tokens::token))
                .into_boxed::<Pg>();
            match &scope {
                Scope::All => {}
                Scope::Region { name, token } => {
                    query = query.filter(
                        subscribers::region
                            .ilike(like_literal(name))
                            .or(subscribers::locality.ilike(like_literal(token)))
                            .or(subscribers::locality.ilike(format!("{}%", like_literal(name)))),
                    );
                }
                Scope::Area(name) => {
                    query = query.filter(subscribers::locality.ilike(like_literal(name)));
                }
            }
            query
                .load::<TargetRow>(c)
                .map(|rows| rows.into_iter().map(into_target).collect())
        })
        .await
    }

    #[tracing::instrument(name = "Querying targets for subscriber", skip(self))]
    async fn subscriber_targets(&self, subscriber_id: &str) -> Result<Vec<Target>, StoreError> {
        use crate::schema::{device_tokens, subscribers};
        let subscriber_id = subscriber_id.to_string();
        self.run(move |c| {
            device_tokens::table
                .inner_join(subscribers::table)
                .select((
                    device_tokens::token,
                    subscribers::id,
                    subscribers::locality,
                    subscribers::region,
                ))
                .filter(subscribers::id.eq(subscriber_id))
                .filter(device_tokens::active.eq(true))
                .filter(device_tokens::token.ne(""))
                .order(device_tokens::token)
                .load::<TargetRow>(c)
                .map(|rows| rows.into_iter().map(into_target).collect())
        })
        .await
    }

    #[tracing::instrument(
        name = "Appending dispatch attempt",
        skip(self, attempt),
        fields(attempt_id = %attempt.id)
    )]
    async fn append_dispatch_attempt(&self, attempt: &DispatchAttempt) -> Result<(), StoreError> {
        use crate::schema::dispatch_attempts;
        let attempt = attempt.clone();
        self.run(move |c| {
            diesel::insert_into(dispatch_attempts::table)
                .values(NewDispatchAttemptRow::from(&attempt))
                .execute(c)
                .map(|_| ())
        })
        .await
    }

    #[tracing::instrument(name = "Fetching recent dispatch attempts", skip(self))]
    async fn recent_dispatch_attempts(
        &self,
        limit: usize,
    ) -> Result<Vec<DispatchAttempt>, StoreError> {
        use crate::schema::dispatch_attempts;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run(move |c| {
            dispatch_attempts::table
                .order(dispatch_attempts::created_at.desc())
                .limit(limit)
                .load::<DispatchAttemptRow>(c)
                .map(|rows| rows.into_iter().map(DispatchAttempt::from).collect())
        })
        .await
    }

    #[tracing::instrument(name = "Summarising dispatch attempts", skip(self))]
    async fn dispatch_stats(&self, since: DateTime<Utc>) -> Result<DispatchStats, StoreError> {
        use crate::schema::dispatch_attempts::dsl::*;
        self.run(move |c| {
            let total = dispatch_attempts.select(count_star()).first::<i64>(c)?;
            let succeeded = dispatch_attempts
                .filter(success.eq(true))
                .select(count_star())
                .first::<i64>(c)?;
            let sent = dispatch_attempts
                .select(sum(tokens_sent))
                .first::<Option<i64>>(c)?;
            let last_24h = dispatch_attempts
                .filter(created_at.ge(since))
                .select(count_star())
                .first::<i64>(c)?;
            let by_notification_kind = dispatch_attempts
                .group_by(notification_kind)
                .select((notification_kind, count_star()))
                .load::<(String, i64)>(c)?;
            let by_scope_kind = dispatch_attempts
                .group_by(scope_kind)
                .select((scope_kind, count_star()))
                .load::<(String, i64)>(c)?;
            Ok(DispatchStats {
                total,
                succeeded,
                failed: total - succeeded,
                tokens_sent: sent.unwrap_or(0),
                last_24h,
                by_notification_kind: by_notification_kind.into_iter().collect(),
                by_scope_kind: by_scope_kind.into_iter().collect(),
                ..Default::default()
            }
            .with_success_rate())
        })
        .await
    }
}
