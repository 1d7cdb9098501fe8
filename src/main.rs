use anyhow::Context;
use event_alerts::configuration::get_configuration;
use event_alerts::startup::{build_notifier, Application};
use event_alerts::store::PgStore;
use event_alerts::telemetry::{get_subscriber, init_subscriber};
use std::sync::Arc;

#[rocket::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("event_alerts".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let configuration = get_configuration().context("Failed to read configuration")?;
    let store = PgStore::connect(&configuration.database)
        .context("Failed to connect to Postgres")?;
    store.run_migrations()?;

    let notifier = build_notifier(&configuration.push, Arc::new(store))?;
    let application = Application::build(&configuration.application, notifier).await?;
    application.server.launch().await?;
    Ok(())
}
