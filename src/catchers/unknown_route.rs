use rocket::serde::json::{json, Json, Value};
use rocket::Request;

#[catch(404)]
pub fn not_found(req: &Request) -> Json<Value> {
    Json(json!({ "error": format!("no route for {}", req.uri()) }))
}
