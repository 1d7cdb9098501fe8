use serde::Serialize;

/// Why a dispatch happened, as recorded in the delivery ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewEvent,
    EventUpdated,
    ImportedEvent,
    LocationAlert,
    Personal,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewEvent => "new_event",
            NotificationKind::EventUpdated => "event_updated",
            NotificationKind::ImportedEvent => "imported_event",
            NotificationKind::LocationAlert => "location_alert",
            NotificationKind::Personal => "personal",
        }
    }
}
