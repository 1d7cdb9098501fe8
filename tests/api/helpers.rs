use event_alerts::configuration::get_configuration;
use event_alerts::domain::{DeviceToken, HomeArea, Subscriber};
use event_alerts::port_saver;
use event_alerts::startup::{build_notifier, Application};
use event_alerts::store::{InMemoryStore, Store};
use event_alerts::telemetry::{get_subscriber, init_subscriber};
use once_cell::sync::Lazy;
use rocket::form::Form;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Config, Request, State};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".into();
    let subscriber_name = "test".into();
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

pub const ACCESS_TOKEN: &str = "ya29.fake-access-token";

/// Stand-in for the OAuth token endpoint and the FCM send endpoint.
#[derive(Default)]
pub struct FakeFcm {
    pub token_requests: AtomicUsize,
    pub sent: Mutex<Vec<Value>>,
    refuse_tokens: AtomicBool,
    unregistered: Mutex<HashSet<String>>,
    silent: Mutex<HashSet<String>>,
}

impl FakeFcm {
    /// The token endpoint answers 401 from now on.
    pub fn refuse_token_requests(&self) {
        self.refuse_tokens.store(true, Ordering::SeqCst);
    }

    /// The gateway answers 404 UNREGISTERED for this device token.
    pub fn unregister(&self, token: &str) {
        self.unregistered.lock().unwrap().insert(token.to_string());
    }

    /// The gateway answers 200 without a message name for this device token.
    pub fn acknowledge_without_name(&self, token: &str) {
        self.silent.lock().unwrap().insert(token.to_string());
    }

    pub fn sent_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|body| body["message"]["token"].as_str().map(String::from))
            .collect();
        tokens.sort();
        tokens
    }
}

#[derive(rocket::FromForm)]
struct TokenRequest {
    grant_type: String,
    assertion: String,
}

#[rocket::post("/token", data = "<form>")]
fn issue_token(form: Form<TokenRequest>, fcm: &State<Arc<FakeFcm>>) -> status::Custom<Json<Value>> {
    fcm.token_requests.fetch_add(1, Ordering::SeqCst);
    if fcm.refuse_tokens.load(Ordering::SeqCst) {
        return status::Custom(Status::Unauthorized, Json(json!({ "error": "invalid_client" })));
    }
    if form.grant_type != "urn:ietf:params:oauth:grant-type:jwt-bearer"
        || form.assertion.split('.').count() != 3
    {
        return status::Custom(Status::BadRequest, Json(json!({ "error": "invalid_grant" })));
    }
    status::Custom(
        Status::Ok,
        Json(json!({ "access_token": ACCESS_TOKEN, "expires_in": 3599, "token_type": "Bearer" })),
    )
}

struct Authorization(Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Authorization {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(Authorization(
            request.headers().get_one("Authorization").map(String::from),
        ))
    }
}

#[rocket::post("/v1/projects/<project>/<action>", data = "<body>")]
fn send_message(
    project: &str,
    action: &str,
    body: Json<Value>,
    authorization: Authorization,
    fcm: &State<Arc<FakeFcm>>,
) -> status::Custom<Json<Value>> {
    if action != "messages:send" {
        return status::Custom(Status::NotFound, Json(json!({})));
    }
    let expected = format!("Bearer {}", ACCESS_TOKEN);
    if authorization.0.as_deref() != Some(expected.as_str()) {
        return status::Custom(Status::Unauthorized, Json(json!({ "error": "UNAUTHENTICATED" })));
    }
    let token = body["message"]["token"].as_str().unwrap_or_default().to_string();
    let mut sent = fcm.sent.lock().unwrap();
    sent.push(body.into_inner());
    if fcm.unregistered.lock().unwrap().contains(&token) {
        return status::Custom(
            Status::NotFound,
            Json(json!({ "error": { "status": "NOT_FOUND", "details": [{ "errorCode": "UNREGISTERED" }] } })),
        );
    }
    if fcm.silent.lock().unwrap().contains(&token) {
        return status::Custom(Status::Ok, Json(json!({})));
    }
    status::Custom(
        Status::Ok,
        Json(json!({ "name": format!("projects/{}/messages/{}", project, sent.len()) })),
    )
}

async fn spawn_fake_fcm(fcm: Arc<FakeFcm>) -> String {
    let (port_saver, port) = port_saver::create_pair();
    let server = rocket::custom(Config {
        port: 0,
        address: std::net::Ipv4Addr::LOCALHOST.into(),
        log_level: rocket::config::LogLevel::Off,
        ..Config::debug_default()
    })
    .attach(port_saver)
    .manage(fcm)
    .mount("/", rocket::routes![issue_token, send_message])
    .ignite()
    .await
    .expect("Failed to build the fake gateway");
    let _ = tokio::spawn(server.launch());
    let port = port.get().await.expect("The fake gateway did not start");
    format!("http://127.0.0.1:{}", port)
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub fcm: Arc<FakeFcm>,
    pub api_client: reqwest::Client,
}

pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let fcm = Arc::new(FakeFcm::default());
    let fcm_address = spawn_fake_fcm(fcm.clone()).await;

    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        c.application.port = None;
        c.push.service_account_path = "tests/fixtures/service_account.json".into();
        c.push.fcm_base_url = fcm_address.clone();
        c.push.token_uri = Some(format!("{}/token", fcm_address));
        c.push.timeout_milliseconds = 2_000;
        c
    };

    let store = Arc::new(InMemoryStore::default());
    let notifier =
        build_notifier(&configuration.push, store.clone()).expect("Failed to build the notifier");
    let app = Application::build(&configuration.application, notifier)
        .await
        .expect("Failed to build the application");
    let _ = tokio::spawn(app.server.launch());
    let port = app.port.get().await.expect("The application did not start");

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        fcm,
        api_client: reqwest::Client::new(),
    }
}

impl TestApp {
    /// Registers a subscriber living in `locality` with one active device.
    pub async fn add_subscriber(&self, id: &str, locality: &str, region: &str, token: &str) {
        self.store
            .save_subscriber(&Subscriber {
                id: id.into(),
                area: HomeArea::new(locality, region),
            })
            .await
            .unwrap();
        self.store
            .save_device_token(&DeviceToken {
                token: token.into(),
                subscriber_id: id.into(),
                active: true,
            })
            .await
            .unwrap();
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .post(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_json(&self, path: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}{}", &self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn put_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .put(&format!("{}{}", &self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_import(&self, csv: &str) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/events/import", &self.address))
            .header("Content-Type", "text/csv")
            .body(csv.to_string())
            .send()
            .await
            .expect("Failed to execute request.")
    }
}
