use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

/// Accepted layouts for a scheduled time, tried in order. The first layout
/// that consumes the whole input wins, so `01-02-2024 10:00` reads as
/// day-month-year.
const SCHEDULE_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M",
    "%m-%d-%Y %H:%M",
    "%m/%d/%Y %H:%M",
];

const DEFAULT_CATEGORY: &str = "Event";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("{0} is not a valid event title")]
    InvalidTitle(String),
    #[error("`{0}` is not a recognised date and time, use YYYY-MM-DD HH:MM")]
    InvalidScheduledTime(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTitle(String);

impl EventTitle {
    pub fn parse(s: String) -> Result<EventTitle, EventValidationError> {
        let s = s.trim().to_string();
        if s.is_empty() {
            return Err(EventValidationError::MissingField("title"));
        }
        if s.graphemes(true).count() > 256 {
            return Err(EventValidationError::InvalidTitle(format!(
                "a title of {} characters",
                s.graphemes(true).count()
            )));
        }
        Ok(Self(s))
    }
}

impl AsRef<str> for EventTitle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Wall-clock time an event takes place at, stored without a zone and with
/// second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTime(NaiveDateTime);

impl ScheduledTime {
    pub fn parse(s: &str) -> Result<ScheduledTime, EventValidationError> {
        let cleaned = s.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');
        if cleaned.is_empty() {
            return Err(EventValidationError::MissingField("scheduled_at"));
        }
        SCHEDULE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(cleaned, format).ok())
            .map(ScheduledTime)
            .ok_or_else(|| EventValidationError::InvalidScheduledTime(cleaned.to_string()))
    }

    pub fn into_inner(self) -> NaiveDateTime {
        self.0
    }
}

/// Formats a scheduled time the way notification bodies show it,
/// e.g. `Sep 15, 2025 6:30 PM`.
pub fn human_time(at: &NaiveDateTime) -> String {
    at.format("%b %-d, %Y %-I:%M %p").to_string()
}

/// Raw event fields as an operator submits them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFields {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "type")]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scheduled_at: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub organizer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: EventTitle,
    pub category: String,
    pub description: String,
    pub scheduled_at: ScheduledTime,
    pub location: String,
    pub organizer: String,
}

impl TryFrom<EventFields> for NewEvent {
    type Error = EventValidationError;

    fn try_from(fields: EventFields) -> Result<Self, Self::Error> {
        let title = EventTitle::parse(fields.title)?;
        let scheduled_at = ScheduledTime::parse(&fields.scheduled_at)?;
        let location = fields.location.trim().to_string();
        if location.is_empty() {
            return Err(EventValidationError::MissingField("location"));
        }
        let category = match fields.category.trim() {
            "" => DEFAULT_CATEGORY.to_string(),
            category => category.to_string(),
        };
        Ok(NewEvent {
            title,
            category,
            description: fields.description.trim().to_string(),
            scheduled_at,
            location,
            organizer: fields.organizer.trim().to_string(),
        })
    }
}

impl NewEvent {
    pub fn into_event(self, id: Uuid, created_at: DateTime<Utc>) -> Event {
        Event {
            id,
            title: self.title.as_ref().to_string(),
            category: self.category,
            description: self.description,
            scheduled_at: self.scheduled_at.into_inner(),
            location: self.location,
            organizer: self.organizer,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub scheduled_at: NaiveDateTime,
    pub location: String,
    pub organizer: String,
    pub created_at: DateTime<Utc>,
}
