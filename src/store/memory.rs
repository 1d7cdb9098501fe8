use crate::domain::{DeviceToken, Event, Scope, Subscriber, Target};
use crate::ledger::{DispatchAttempt, DispatchStats};
use crate::store::{Store, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// A `Store` kept in process memory. Used by tests and local demos; it can be
/// told to reject writes to exercise failure paths.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    events: Vec<Event>,
    subscribers: HashMap<String, Subscriber>,
    tokens: Vec<DeviceToken>,
    attempts: Vec<DispatchAttempt>,
    rejected_titles: HashSet<String>,
    ledger_offline: bool,
}

impl InMemoryStore {
    fn state(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Rejected("in-memory store lock was poisoned".into()))
    }

    /// Inserts of events with this title fail from now on.
    pub fn reject_events_titled(&self, title: &str) {
        if let Ok(mut state) = self.state() {
            state.rejected_titles.insert(title.to_string());
        }
    }

    /// Ledger appends fail from now on.
    pub fn take_ledger_offline(&self) {
        if let Ok(mut state) = self.state() {
            state.ledger_offline = true;
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().map(|s| s.events.clone()).unwrap_or_default()
    }

    /// Oldest first.
    pub fn dispatch_attempts(&self) -> Vec<DispatchAttempt> {
        self.state().map(|s| s.attempts.clone()).unwrap_or_default()
    }

    fn collect_targets<F>(state: &State, keep: F) -> Vec<Target>
    where
        F: Fn(&Subscriber) -> bool,
    {
        state
            .tokens
            .iter()
            .filter(|token| token.active && !token.token.trim().is_empty())
            .filter_map(|token| {
                let subscriber = state.subscribers.get(&token.subscriber_id)?;
                keep(subscriber).then(|| Target {
                    token: token.token.clone(),
                    subscriber_id: subscriber.id.clone(),
                    area: subscriber.area.clone(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.rejected_titles.contains(&event.title) {
            return Err(StoreError::Rejected(format!("event '{}'", event.title)));
        }
        state.events.push(event.clone());
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> Result<bool, StoreError> {
        let mut state = self.state()?;
        match state.events.iter_mut().find(|stored| stored.id == event.id) {
            Some(stored) => {
                *stored = Event {
                    created_at: stored.created_at,
                    ..event.clone()
                };
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let state = self.state()?;
        Ok(state.events.iter().find(|event| event.id == id).cloned())
    }

    async fn find_duplicate_event(
        &self,
        title: &str,
        scheduled_at: NaiveDateTime,
        location: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        let state = self.state()?;
        Ok(state
            .events
            .iter()
            .find(|event| {
                event.title == title
                    && event.scheduled_at == scheduled_at
                    && event.location == location
            })
            .map(|event| event.id))
    }

    async fn save_subscriber(&self, subscriber: &Subscriber) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let subscriber = Subscriber {
            id: subscriber.id.clone(),
            area: subscriber.area.normalised(),
        };
        state.subscribers.insert(subscriber.id.clone(), subscriber);
        Ok(())
    }

    async fn save_device_token(&self, token: &DeviceToken) -> Result<(), StoreError> {
        let mut state = self.state()?;
        match state.tokens.iter_mut().find(|stored| stored.token == token.token) {
            Some(stored) => *stored = token.clone(),
            None => state.tokens.push(token.clone()),
        }
        Ok(())
    }

    async fn targets(&self, scope: &Scope) -> Result<Vec<Target>, StoreError> {
        let state = self.state()?;
        Ok(Self::collect_targets(&state, |subscriber| {
            scope.matches(&subscriber.area)
        }))
    }

    async fn subscriber_targets(&self, subscriber_id: &str) -> Result<Vec<Target>, StoreError> {
        let state = self.state()?;
        Ok(Self::collect_targets(&state, |subscriber| {
            subscriber.id == subscriber_id
        }))
    }

    async fn append_dispatch_attempt(&self, attempt: &DispatchAttempt) -> Result<(), StoreError> {
        let mut state = self.state()?;
        if state.ledger_offline {
            return Err(StoreError::Rejected("the ledger is offline".into()));
        }
        state.attempts.push(attempt.clone());
        Ok(())
    }

    async fn recent_dispatch_attempts(
        &self,
        limit: usize,
    ) -> Result<Vec<DispatchAttempt>, StoreError> {
        let state = self.state()?;
        Ok(state.attempts.iter().rev().take(limit).cloned().collect())
    }

    async fn dispatch_stats(&self, since: DateTime<Utc>) -> Result<DispatchStats, StoreError> {
        let state = self.state()?;
        let mut stats = DispatchStats::default();
        for attempt in &state.attempts {
            stats.total += 1;
            if attempt.success {
                stats.succeeded += 1;
            } else {
                stats.failed += 1;
            }
            stats.tokens_sent += attempt.tokens_sent as i64;
            if attempt.created_at >= since {
                stats.last_24h += 1;
            }
            *stats
                .by_notification_kind
                .entry(attempt.notification_kind.clone())
                .or_default() += 1;
            *stats
                .by_scope_kind
                .entry(attempt.scope_kind.clone())
                .or_default() += 1;
        }
        Ok(stats.with_success_rate())
    }
}
