use crate::helpers::spawn_app;
use serde_json::{json, Value};

#[tokio::test]
async fn a_registered_device_receives_alerts_for_its_area() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = app
        .post_json(
            "/device_tokens",
            &json!({
                "subscriber_id": "ana@example.com",
                "token": "dGVzdA:APA91b-token_ana",
                "locality": "Hermosa ",
                "region": "Bataan"
            }),
        )
        .await;
    app.post_json(
        "/notifications/location",
        &json!({ "scope": "Hermosa", "title": "Weighing day", "body": "Friday at 9" }),
    )
    .await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["area"]["locality"], "Hermosa");
    assert_eq!(app.fcm.sent_tokens(), vec!["dGVzdA:APA91b-token_ana"]);
}

#[tokio::test]
async fn re_registering_a_token_moves_it_to_the_new_owner() {
    // arrange
    let app = spawn_app().await;
    let register = |owner: &str| {
        json!({ "subscriber_id": owner, "token": "shared-device", "locality": "Bangkal" })
    };
    app.post_json("/device_tokens", &register("ana@example.com")).await;

    // act
    app.post_json("/device_tokens", &register("ben@example.com")).await;
    let response = app
        .post_json(
            "/notifications/subscriber",
            &json!({ "subscriber_id": "ana@example.com", "title": "Hi", "body": "Hello" }),
        )
        .await;

    // assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn invalid_registrations_are_rejected() {
    // arrange
    let app = spawn_app().await;
    let test_cases = vec![
        (json!({ "subscriber_id": "", "token": "abc" }), "an empty subscriber id"),
        (json!({ "subscriber_id": "ana@example.com", "token": " " }), "a blank token"),
        (
            json!({ "subscriber_id": "ana@example.com", "token": "abc def" }),
            "a token with a space",
        ),
        (json!({ "subscriber_id": "ana@example.com" }), "no token"),
    ];

    for (body, description) in test_cases {
        // act
        let response = app.post_json("/device_tokens", &body).await;

        // assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload had {}.",
            description
        );
    }
    assert!(app.store.dispatch_attempts().is_empty());
}
