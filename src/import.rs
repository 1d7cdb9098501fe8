//! Bulk event import: delimited rows in, persisted events out.
//!
//! Every row walks parse, validate, duplicate check and persist on its own;
//! a bad row is reported and the next one is processed. Notifications for the
//! accepted rows are sent by the caller once the whole file has been staged.

use crate::domain::{Event, EventFields, EventValidationError, NewEvent, NotificationKind};
use crate::notifier::DeliverySummary;
use crate::store::{Store, StoreError};
use chrono::Utc;
use serde::Serialize;
use std::io::Read;
use uuid::Uuid;

/// title, type, scheduled time, location, organizer, description,
/// notification kind, recipient group
pub const COLUMN_COUNT: usize = 8;

/// One data row of an import file. `number` counts data rows from 1, so the
/// header line does not shift it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub number: usize,
    pub fields: Vec<String>,
}

impl ImportRow {
    pub fn new(number: usize, fields: Vec<&str>) -> Self {
        Self {
            number,
            fields: fields.into_iter().map(String::from).collect(),
        }
    }
}

/// Reads comma separated rows. Rows may have any number of columns; short
/// ones are rejected later, per row. The first line is always the header,
/// whatever its column names, and is dropped.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<ImportRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in reader.records().skip(1) {
        let record = record?;
        rows.push(ImportRow {
            number: rows.len() + 1,
            fields: record.iter().map(String::from).collect(),
        });
    }
    Ok(rows)
}

#[derive(thiserror::Error, Debug)]
pub enum RowError {
    #[error("expected {} columns, found {0}", COLUMN_COUNT)]
    TooFewColumns(usize),
    #[error(transparent)]
    Invalid(#[from] EventValidationError),
    #[error("failed to check for an existing event")]
    Lookup(#[source] StoreError),
    #[error("failed to save the event")]
    Persist(#[source] StoreError),
}

/// The import-only columns that ride along in the push data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDetails {
    pub notification_kind: String,
    pub recipient_group: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptedRow {
    pub row: usize,
    pub event: Event,
    pub details: ImportDetails,
    pub delivery: Option<DeliverySummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRow {
    pub row: usize,
    pub title: String,
    pub existing_event_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub row: usize,
    pub error: String,
}

/// Three disjoint buckets: every input row lands in exactly one.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub accepted_count: usize,
    pub accepted: Vec<AcceptedRow>,
    pub duplicates: Vec<DuplicateRow>,
    pub errors: Vec<RowFailure>,
}

impl ImportSummary {
    fn accept(&mut self, row: AcceptedRow) {
        self.accepted_count += 1;
        self.accepted.push(row);
    }
}

enum Staged {
    Accepted(Event, ImportDetails),
    Duplicate { title: String, existing: Uuid },
}

pub struct ImportPipeline<'a> {
    store: &'a dyn Store,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Validates, deduplicates and persists every row. Accepted rows come
    /// back without a delivery outcome.
    #[tracing::instrument(name = "Stage imported rows", skip(self, rows), fields(rows = rows.len()))]
    pub async fn stage(&self, rows: Vec<ImportRow>) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for row in rows {
            let number = row.number;
            match self.stage_row(row).await {
                Ok(Staged::Accepted(event, details)) => summary.accept(AcceptedRow {
                    row: number,
                    event,
                    details,
                    delivery: None,
                }),
                Ok(Staged::Duplicate { title, existing }) => {
                    tracing::info!(row = number, existing_event_id = %existing, "Skipping duplicate row");
                    summary.duplicates.push(DuplicateRow {
                        row: number,
                        title,
                        existing_event_id: existing,
                    });
                }
                Err(e) => {
                    tracing::warn!(row = number, error.cause_chain = ?e, "Rejected import row");
                    summary.errors.push(RowFailure {
                        row: number,
                        error: describe(&e),
                    });
                }
            }
        }
        tracing::info!(
            accepted = summary.accepted_count,
            duplicates = summary.duplicates.len(),
            errors = summary.errors.len(),
            "Import staged"
        );
        summary
    }

    async fn stage_row(&self, row: ImportRow) -> Result<Staged, RowError> {
        if row.fields.len() < COLUMN_COUNT {
            return Err(RowError::TooFewColumns(row.fields.len()));
        }
        let mut columns = row.fields.into_iter();
        let mut next = || columns.next().unwrap_or_default();
        let fields = EventFields {
            title: next(),
            category: next(),
            scheduled_at: next(),
            location: next(),
            organizer: next(),
            description: next(),
        };
        let notification_kind = match next().trim() {
            "" => NotificationKind::ImportedEvent.as_str().to_string(),
            kind => kind.to_string(),
        };
        let details = ImportDetails {
            notification_kind,
            recipient_group: next().trim().to_string(),
        };
        let new_event = NewEvent::try_from(fields)?;

        let scheduled_at = new_event.scheduled_at.into_inner();
        if let Some(existing) = self
            .store
            .find_duplicate_event(new_event.title.as_ref(), scheduled_at, &new_event.location)
            .await
            .map_err(RowError::Lookup)?
        {
            return Ok(Staged::Duplicate {
                title: new_event.title.as_ref().to_string(),
                existing,
            });
        }

        let event = new_event.into_event(Uuid::new_v4(), Utc::now());
        self.store
            .insert_event(&event)
            .await
            .map_err(RowError::Persist)?;
        Ok(Staged::Accepted(event, details))
    }
}

/// Full message including the source, for operators reading the summary.
fn describe(e: &RowError) -> String {
    match e {
        RowError::Lookup(source) | RowError::Persist(source) => format!("{}: {}", e, source),
        _ => e.to_string(),
    }
}
