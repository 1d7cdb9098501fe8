use crate::catchers::*;
use crate::configuration::{ApplicationSettings, PushSettings};
use crate::dispatcher::Dispatcher;
use crate::notifier::Notifier;
use crate::port_saver;
use crate::port_saver::Port;
use crate::push::{
    AssertionSigner, CredentialCache, FcmGateway, OAuthExchange, ServiceAccountKey,
    ServiceAccountTokenSource, SystemClock,
};
use crate::routes::*;
use crate::store::Store;
use anyhow::Context;
use rocket::data::{Limits, ToByteUnit};
use rocket::{Config, Ignite, Rocket};
use std::sync::Arc;

pub struct Application {
    pub server: Rocket<Ignite>,
    pub port: Port,
}

impl Application {
    pub async fn build(
        settings: &ApplicationSettings,
        notifier: Notifier,
    ) -> Result<Application, rocket::Error> {
        let (port_saver, port) = port_saver::create_pair();
        let limits = Limits::default()
            .limit("string", 5.mebibytes())
            .limit("json", 5.mebibytes());
        rocket::custom(Config {
            port: settings.port.unwrap_or(0),
            address: settings.host,
            limits,
            ..Config::debug_default()
        })
        .attach(port_saver)
        .manage(notifier)
        .mount(
            "/",
            routes![
                health,
                create_event,
                update_event,
                import_events,
                notify_subscriber,
                notify_location,
                register_device,
                list_dispatch_attempts,
                dispatch_stats
            ],
        )
        .register("/", catchers![unprocessable_entity_to_bad_request, not_found])
        .ignite()
        .await
        .map(|server| Application { server, port })
    }
}

/// Wires the production push stack from the service account file: a
/// credential cache over the JWT-bearer exchange and an FCM gateway.
pub fn build_notifier(settings: &PushSettings, store: Arc<dyn Store>) -> Result<Notifier, anyhow::Error> {
    let key = ServiceAccountKey::from_file(&settings.service_account_path)
        .context("Failed to load the service account")?;
    let token_uri = settings
        .token_uri
        .clone()
        .unwrap_or_else(|| key.token_uri.clone());
    let http_client = reqwest::Client::builder()
        .timeout(settings.timeout())
        .build()
        .context("Failed to build the HTTP client")?;

    let signer = AssertionSigner::new(&key, &token_uri)
        .context("Failed to prepare the assertion signer")?;
    let source = ServiceAccountTokenSource::new(signer, OAuthExchange::new(http_client, token_uri));
    let credentials = CredentialCache::new(
        Box::new(source),
        Arc::new(SystemClock),
        chrono::Duration::seconds(settings.token_refresh_margin_seconds),
    );
    let gateway = FcmGateway::new(&settings.fcm_base_url, &key.project_id, settings.timeout())
        .context("Failed to build the push gateway client")?;

    let dispatcher = Dispatcher::new(
        Arc::new(gateway),
        Arc::new(credentials),
        settings.max_concurrent_sends,
        settings.timeout(),
    );
    Ok(Notifier::new(store, dispatcher))
}
