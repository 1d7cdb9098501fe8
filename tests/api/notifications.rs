use crate::helpers::spawn_app;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;

fn alert(scope: &str) -> Value {
    json!({
        "scope": scope,
        "title": "Weighing day",
        "body": "Bring your child to the health center on Friday"
    })
}

#[tokio::test]
async fn a_region_alert_reaches_only_that_region() {
    // arrange
    let app = spawn_app().await;
    app.add_subscriber("ana@example.com", "Almacen", "Hermosa", "token-almacen").await;
    app.add_subscriber("ben@example.com", "Bacong", "Hermosa", "token-bacong").await;
    app.add_subscriber("cy@example.com", "Limay", "Limay", "token-limay").await;

    // act
    let response = app
        .post_json("/notifications/location", &alert("REGION_HERMOSA"))
        .await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["users_notified"], 2);
    assert_eq!(app.fcm.sent_tokens(), vec!["token-almacen", "token-bacong"]);

    let attempts = app.store.dispatch_attempts();
    assert_eq!(attempts[0].scope_kind, "region");
    assert_eq!(attempts[0].scope_value, "REGION_HERMOSA");
    assert_eq!(attempts[0].notification_kind, "location_alert");
}

#[tokio::test]
async fn an_alert_nobody_can_receive_is_still_recorded() {
    // arrange
    let app = spawn_app().await;
    app.add_subscriber("ana@example.com", "", "", "token-ana").await;

    // act
    let response = app.post_json("/notifications/location", &alert("")).await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["users_notified"], 0);
    assert_eq!(body["delivery"]["success"], false);
    assert_eq!(body["delivery"]["error"], Value::Null);
    assert!(app.fcm.sent_tokens().is_empty());
    assert_eq!(app.fcm.token_requests.load(Ordering::SeqCst), 0);

    let attempts = app.store.dispatch_attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].tokens_sent, 0);
    assert!(!attempts[0].success);
}

#[tokio::test]
async fn unregistered_and_unacknowledged_devices_count_as_failures() {
    // arrange
    let app = spawn_app().await;
    app.add_subscriber("ana@example.com", "Bangkal", "Abucay", "token-gone").await;
    app.add_subscriber("ben@example.com", "Bangkal", "Abucay", "token-silent").await;
    app.fcm.unregister("token-gone");
    app.fcm.acknowledge_without_name("token-silent");

    // act
    let response = app.post_json("/notifications/location", &alert("Bangkal")).await;

    // assert
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["users_notified"], 0);
    assert_eq!(body["delivery"]["failed"], 2);
    let attempts = app.store.dispatch_attempts();
    assert_eq!(attempts[0].tokens_sent, 2);
    assert!(!attempts[0].success);
    assert!(attempts[0].error_message.is_some());
}

#[tokio::test]
async fn one_good_device_makes_the_dispatch_a_success() {
    // arrange
    let app = spawn_app().await;
    app.add_subscriber("ana@example.com", "Bangkal", "Abucay", "token-gone").await;
    app.add_subscriber("ben@example.com", "Bangkal", "Abucay", "token-good").await;
    app.fcm.unregister("token-gone");

    // act
    let response = app.post_json("/notifications/location", &alert("bangkal")).await;

    // assert
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["users_notified"], 1);
    assert_eq!(body["delivery"]["success"], true);
}

#[tokio::test]
async fn the_bearer_token_is_reused_across_dispatches() {
    // arrange
    let app = spawn_app().await;
    app.add_subscriber("ana@example.com", "Bangkal", "Abucay", "token-ana").await;

    // act
    app.post_json("/notifications/location", &alert("all")).await;
    app.post_json("/notifications/location", &alert("All Locations")).await;

    // assert
    assert_eq!(app.fcm.token_requests.load(Ordering::SeqCst), 1);
    assert_eq!(app.fcm.sent_tokens().len(), 2);
}

#[tokio::test]
async fn blank_alert_text_is_rejected() {
    // arrange
    let app = spawn_app().await;
    let test_cases = vec![
        (json!({ "scope": "all", "title": " ", "body": "Hello" }), "a blank title"),
        (json!({ "scope": "all", "title": "Hello", "body": "" }), "an empty body"),
    ];

    for (body, description) in test_cases {
        // act
        let response = app.post_json("/notifications/location", &body).await;

        // assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload had {}.",
            description
        );
    }
}

#[tokio::test]
async fn ad_hoc_notifications_go_to_every_device_of_the_subscriber() {
    // arrange
    let app = spawn_app().await;
    app.add_subscriber("ana@example.com", "", "", "token-phone").await;
    app.add_subscriber("ana@example.com", "", "", "token-tablet").await;
    app.add_subscriber("ben@example.com", "Bangkal", "Abucay", "token-ben").await;

    // act
    let response = app
        .post_json(
            "/notifications/subscriber",
            &json!({
                "subscriber_id": "ana@example.com",
                "title": "Follow-up",
                "body": "Your child is due for a weighing"
            }),
        )
        .await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["succeeded"], 2);
    assert_eq!(body["scope_kind"], "subscriber");
    assert_eq!(app.fcm.sent_tokens(), vec!["token-phone", "token-tablet"]);
}

#[tokio::test]
async fn ad_hoc_notifications_to_a_subscriber_without_devices_return_404() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = app
        .post_json(
            "/notifications/subscriber",
            &json!({
                "subscriber_id": "ghost@example.com",
                "title": "Follow-up",
                "body": "Hello"
            }),
        )
        .await;

    // assert
    assert_eq!(response.status().as_u16(), 404);
    assert!(app.store.dispatch_attempts().is_empty());
}

#[tokio::test]
async fn dispatch_attempts_are_listed_newest_first() {
    // arrange
    let app = spawn_app().await;
    app.post_json("/notifications/location", &alert("Bangkal")).await;
    app.post_json("/notifications/location", &alert("Limay")).await;

    // act
    let response = app.get_json("/dispatch_attempts?limit=1").await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let attempts: Vec<Value> = response.json().await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["scope_value"], "Limay");
}

#[tokio::test]
async fn a_refused_credential_is_a_server_error_that_is_still_recorded() {
    // arrange
    let app = spawn_app().await;
    app.add_subscriber("ana@example.com", "Bangkal", "Abucay", "token-ana").await;
    app.fcm.refuse_token_requests();

    // act
    let response = app.post_json("/notifications/location", &alert("Bangkal")).await;

    // assert
    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["delivery"]["success"], false);
    assert_eq!(body["delivery"]["recipients"], 1);
    assert!(app.fcm.sent_tokens().is_empty());

    let attempts = app.store.dispatch_attempts();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].success);
    assert_eq!(attempts[0].tokens_sent, 0);
    assert!(attempts[0].error_message.is_some());
}

#[tokio::test]
async fn stats_summarise_the_delivery_ledger() {
    // arrange
    let app = spawn_app().await;
    app.add_subscriber("ana@example.com", "Bangkal", "Abucay", "token-ana").await;
    app.post_json("/notifications/location", &alert("Bangkal")).await;
    app.post_json("/notifications/location", &alert("Limay")).await;

    // act
    let response = app.get_json("/dispatch_attempts/stats").await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let stats: Value = response.json().await.unwrap();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["succeeded"], 1);
    assert_eq!(stats["failed"], 1);
    assert_eq!(stats["success_rate"], 50.0);
    assert_eq!(stats["tokens_sent"], 1);
    assert_eq!(stats["last_24h"], 2);
    assert_eq!(stats["by_notification_kind"]["location_alert"], 2);
    assert_eq!(stats["by_scope_kind"]["area"], 2);
}
