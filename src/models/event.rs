use crate::domain::Event;
use crate::schema::events;
use chrono::offset::Utc;
use chrono::{DateTime, NaiveDateTime};
use diesel::{AsChangeset, Insertable, Queryable};

#[derive(Queryable)]
pub struct EventRow {
    pub id: uuid::Uuid,
    pub title: String,
    pub category: String,
    pub description: String,
    pub scheduled_at: NaiveDateTime,
    pub location: String,
    pub organizer: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable)]
#[diesel(table_name = events)]
pub struct NewEventRow<'a> {
    pub id: &'a uuid::Uuid,
    pub title: &'a str,
    pub category: &'a str,
    pub description: &'a str,
    pub scheduled_at: &'a NaiveDateTime,
    pub location: &'a str,
    pub organizer: &'a str,
    pub created_at: &'a DateTime<Utc>,
}

/// Columns an operator edit may change; id and creation time stay put.
#[derive(AsChangeset)]
#[diesel(table_name = events)]
pub struct EventChanges<'a> {
    pub title: &'a str,
    pub category: &'a str,
    pub description: &'a str,
    pub scheduled_at: &'a NaiveDateTime,
    pub location: &'a str,
    pub organizer: &'a str,
}

impl<'a> From<&'a Event> for NewEventRow<'a> {
    fn from(event: &'a Event) -> Self {
        NewEventRow {
            id: &event.id,
            title: &event.title,
            category: &event.category,
            description: &event.description,
            scheduled_at: &event.scheduled_at,
            location: &event.location,
            organizer: &event.organizer,
            created_at: &event.created_at,
        }
    }
}

impl<'a> From<&'a Event> for EventChanges<'a> {
    fn from(event: &'a Event) -> Self {
        EventChanges {
            title: &event.title,
            category: &event.category,
            description: &event.description,
            scheduled_at: &event.scheduled_at,
            location: &event.location,
            organizer: &event.organizer,
        }
    }
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            title: row.title,
            category: row.category,
            description: row.description,
            scheduled_at: row.scheduled_at,
            location: row.location,
            organizer: row.organizer,
            created_at: row.created_at,
        }
    }
}
