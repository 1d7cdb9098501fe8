use crate::helpers::spawn_app;
use serde_json::Value;

const HEADER: &str =
    "title,type,date_time,location,organizer,description,notification_type,recipient_group\n";

fn four_rows_with_a_short_third() -> String {
    format!(
        "{}\
         Weighing day,Health,2024-03-01 09:00,Bangkal,MHO,Monthly weighing,,Parents\n\
         Cooking demo,Nutrition,2024/03/02 14:30,REGION_HERMOSA,BNS,Local recipes,,All\n\
         Broken row,Health,2024-03-03 09:00,Bangkal,MHO\n\
         Vitamin A,Health,15-03-2024 08:00,Bangkal,RHU,Supplementation,,Parents\n",
        HEADER
    )
}

#[tokio::test]
async fn a_short_row_is_reported_and_the_rest_are_imported() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = app.post_import(&four_rows_with_a_short_third()).await;

    // assert
    assert_eq!(response.status().as_u16(), 200);
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["accepted_count"], 3);
    let errors = summary["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["row"], 3);
    assert_eq!(app.store.events().len(), 3);
}

#[tokio::test]
async fn accepted_rows_are_announced_to_their_location() {
    // arrange
    let app = spawn_app().await;
    app.add_subscriber("ana@example.com", "Bangkal", "Abucay", "token-bangkal").await;
    app.add_subscriber("ben@example.com", "Bacong", "Hermosa", "token-bacong").await;

    // act
    let response = app.post_import(&four_rows_with_a_short_third()).await;

    // assert
    let summary: Value = response.json().await.unwrap();
    let accepted = summary["accepted"].as_array().unwrap();
    assert!(accepted
        .iter()
        .all(|row| row["delivery"]["success"] == Value::Bool(true)));
    assert_eq!(
        app.fcm.sent_tokens(),
        vec!["token-bacong", "token-bangkal", "token-bangkal"]
    );

    let sent = app.fcm.sent.lock().unwrap();
    let first = &sent[0]["message"];
    assert_eq!(
        first["notification"]["body"],
        "New event imported: Weighing day at Bangkal on Mar 1, 2024 9:00 AM"
    );
    assert_eq!(first["data"]["notification_type"], "imported_event");
    assert_eq!(first["data"]["recipient_group"], "Parents");

    let attempts = app.store.dispatch_attempts();
    assert_eq!(attempts.len(), 3);
    assert!(attempts
        .iter()
        .all(|a| a.notification_kind == "imported_event" && a.event_id.is_some()));
}

#[tokio::test]
async fn importing_the_same_file_twice_only_yields_duplicates() {
    // arrange
    let app = spawn_app().await;
    app.post_import(&four_rows_with_a_short_third()).await;

    // act
    let response = app.post_import(&four_rows_with_a_short_third()).await;

    // assert
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["accepted_count"], 0);
    let duplicate_rows: Vec<u64> = summary["duplicates"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["row"].as_u64())
        .collect();
    assert_eq!(duplicate_rows, vec![1, 2, 4]);
    assert_eq!(app.store.events().len(), 3);
}

#[tokio::test]
async fn a_file_without_data_rows_is_a_bad_request() {
    // arrange
    let app = spawn_app().await;
    let test_cases = vec![("", "an empty file"), (HEADER, "only a header")];

    for (file, description) in test_cases {
        // act
        let response = app.post_import(file).await;

        // assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request for {}.",
            description
        );
    }
}
