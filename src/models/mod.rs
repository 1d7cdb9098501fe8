mod dispatch_attempt;
mod event;
mod subscriber;

pub use dispatch_attempt::*;
pub use event::*;
pub use subscriber::*;
