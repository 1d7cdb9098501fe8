use serde::{Deserialize, Serialize};

/// Where a subscriber lives: a locality inside a parent region. Empty strings
/// mean "not recorded".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HomeArea {
    pub locality: String,
    pub region: String,
}

impl HomeArea {
    /// Surrounding whitespace is dropped so stored areas compare the same way
    /// in every store.
    pub fn new(locality: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            locality: locality.into().trim().to_string(),
            region: region.into().trim().to_string(),
        }
    }

    pub fn normalised(&self) -> Self {
        Self::new(self.locality.as_str(), self.region.as_str())
    }

    pub fn is_recorded(&self) -> bool {
        !self.locality.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub id: String,
    pub area: HomeArea,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceToken {
    pub token: String,
    pub subscriber_id: String,
    pub active: bool,
}

/// One device a notification will be delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub token: String,
    pub subscriber_id: String,
    pub area: HomeArea,
}

impl Target {
    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

/// A device announcing its push token, as sent by the mobile app.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationFields {
    pub subscriber_id: String,
    pub token: String,
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub region: String,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("missing required field `{0}`")]
    Missing(&'static str),
    #[error("device tokens may only contain letters, digits, `:`, `_`, `-` and `.`")]
    MalformedToken,
}

#[derive(Debug)]
pub struct DeviceRegistration {
    pub subscriber: Subscriber,
    pub token: DeviceToken,
}

impl TryFrom<RegistrationFields> for DeviceRegistration {
    type Error = RegistrationError;

    fn try_from(fields: RegistrationFields) -> Result<Self, Self::Error> {
        let subscriber_id = fields.subscriber_id.trim();
        if subscriber_id.is_empty() {
            return Err(RegistrationError::Missing("subscriber_id"));
        }
        let token = fields.token.trim();
        if token.is_empty() {
            return Err(RegistrationError::Missing("token"));
        }
        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-' | '.');
        if !token.chars().all(allowed) {
            return Err(RegistrationError::MalformedToken);
        }
        Ok(Self {
            subscriber: Subscriber {
                id: subscriber_id.to_string(),
                area: HomeArea::new(fields.locality, fields.region),
            },
            token: DeviceToken {
                token: token.to_string(),
                subscriber_id: subscriber_id.to_string(),
                active: true,
            },
        })
    }
}
