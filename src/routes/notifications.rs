use crate::notifier::{DeliverySummary, Notifier};
use crate::routes::{require_text, ApiError};
use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct AdHocNotification {
    subscriber_id: String,
    title: String,
    body: String,
}

#[tracing::instrument(
    name = "Sending an ad hoc notification",
    skip(body, notifier),
    fields(request_id = %Uuid::new_v4(), subscriber_id = %body.subscriber_id)
)]
#[post("/notifications/subscriber", data = "<body>")]
pub async fn notify_subscriber(
    body: Json<AdHocNotification>,
    notifier: &State<Notifier>,
) -> Result<Json<DeliverySummary>, ApiError> {
    require_text("subscriber_id", &body.subscriber_id)?;
    require_text("title", &body.title)?;
    require_text("body", &body.body)?;
    let delivery = notifier
        .send_ad_hoc_notification(body.subscriber_id.trim(), &body.title, &body.body)
        .await?;
    Ok(Json(delivery))
}

#[derive(Deserialize)]
pub struct LocationNotification {
    /// Empty means everyone.
    #[serde(default)]
    scope: String,
    title: String,
    body: String,
}

#[derive(Serialize)]
pub struct LocationNotified {
    users_notified: usize,
    delivery: DeliverySummary,
}

#[tracing::instrument(
    name = "Sending a location notification",
    skip(body, notifier),
    fields(request_id = %Uuid::new_v4(), scope = %body.scope)
)]
#[post("/notifications/location", data = "<body>")]
pub async fn notify_location(
    body: Json<LocationNotification>,
    notifier: &State<Notifier>,
) -> Result<Json<LocationNotified>, ApiError> {
    require_text("title", &body.title)?;
    require_text("body", &body.body)?;
    let delivery = notifier
        .send_location_notification(&body.scope, &body.title, &body.body)
        .await?;
    Ok(Json(LocationNotified {
        users_notified: delivery.users_notified(),
        delivery,
    }))
}
