use crate::domain::EventFields;
use crate::import::{read_rows, ImportSummary};
use crate::notifier::{DeliverySummary, EventCreated, Notifier};
use crate::routes::ApiError;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

#[tracing::instrument(
    name = "Creating a new event",
    skip(body, notifier),
    fields(
        request_id = %Uuid::new_v4(),
        event_title = %body.title,
        event_location = %body.location
    )
)]
#[post("/events", data = "<body>")]
pub async fn create_event(
    body: Json<EventFields>,
    notifier: &State<Notifier>,
) -> Result<status::Custom<Json<EventCreated>>, ApiError> {
    let created = notifier.create_event(body.into_inner()).await?;
    let status = if created.created {
        Status::Created
    } else {
        Status::Ok
    };
    Ok(status::Custom(status, Json(created)))
}

#[tracing::instrument(
    name = "Updating an event",
    skip(body, notifier),
    fields(request_id = %Uuid::new_v4())
)]
#[put("/events/<id>", data = "<body>")]
pub async fn update_event(
    id: &str,
    body: Json<EventFields>,
    notifier: &State<Notifier>,
) -> Result<Json<DeliverySummary>, ApiError> {
    let id = Uuid::parse_str(id)
        .map_err(|_| ApiError::BadRequest(format!("`{}` is not a valid event id", id)))?;
    let delivery = notifier.update_event(id, body.into_inner()).await?;
    Ok(Json(delivery))
}

#[tracing::instrument(
    name = "Importing events",
    skip(body, notifier),
    fields(request_id = %Uuid::new_v4(), bytes = body.len())
)]
#[post("/events/import", data = "<body>")]
pub async fn import_events(
    body: String,
    notifier: &State<Notifier>,
) -> Result<Json<ImportSummary>, ApiError> {
    let rows = read_rows(body.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("the file could not be read: {}", e)))?;
    if rows.is_empty() {
        return Err(ApiError::BadRequest("the file has no data rows".into()));
    }
    Ok(Json(notifier.import_events(rows).await))
}
