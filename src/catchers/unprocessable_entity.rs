use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{json, Json, Value};
use rocket::Request;

/// Bodies rocket could not deserialize are the caller's fault: answer 400.
#[catch(422)]
pub fn unprocessable_entity_to_bad_request(req: &Request) -> status::Custom<Json<Value>> {
    tracing::warn!(uri = %req.uri(), "Rejected a malformed request body");
    status::Custom(
        Status::BadRequest,
        Json(json!({ "error": "the request body is malformed or misses required fields" })),
    )
}
