#[macro_use]
extern crate rocket;

pub mod catchers;
pub mod configuration;
pub mod dispatcher;
pub mod domain;
pub mod import;
pub mod ledger;
pub mod models;
pub mod notifier;
pub mod port_saver;
pub mod push;
pub mod resolver;
pub mod routes;
pub mod schema;
pub mod startup;
pub mod store;
pub mod telemetry;
