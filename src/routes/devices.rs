use crate::domain::{HomeArea, RegistrationFields};
use crate::notifier::Notifier;
use crate::routes::ApiError;
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
pub struct DeviceRegistered {
    subscriber_id: String,
    area: HomeArea,
}

#[tracing::instrument(
    name = "Registering a device token",
    skip(body, notifier),
    fields(request_id = %Uuid::new_v4(), subscriber_id = %body.subscriber_id)
)]
#[post("/device_tokens", data = "<body>")]
pub async fn register_device(
    body: Json<RegistrationFields>,
    notifier: &State<Notifier>,
) -> Result<Json<DeviceRegistered>, ApiError> {
    let subscriber = notifier.register_device(body.into_inner()).await?;
    Ok(Json(DeviceRegistered {
        subscriber_id: subscriber.id,
        area: subscriber.area,
    }))
}
