mod unknown_route;
mod unprocessable_entity;

pub use unknown_route::*;
pub use unprocessable_entity::*;
