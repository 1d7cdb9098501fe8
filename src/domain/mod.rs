mod event;
mod notification;
mod scope;
mod subscriber;

pub use event::*;
pub use notification::NotificationKind;
pub use scope::{Scope, ScopeKind};
pub use subscriber::{
    DeviceRegistration, DeviceToken, HomeArea, RegistrationError, RegistrationFields, Subscriber,
    Target,
};
