diesel::table! {
    events (id) {
        id -> Uuid,
        title -> Text,
        category -> Text,
        description -> Text,
        scheduled_at -> Timestamp,
        location -> Text,
        organizer -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    subscribers (id) {
        id -> Text,
        locality -> Text,
        region -> Text,
    }
}

diesel::table! {
    device_tokens (token) {
        token -> Text,
        subscriber_id -> Text,
        active -> Bool,
    }
}

diesel::table! {
    dispatch_attempts (id) {
        id -> Uuid,
        event_id -> Nullable<Uuid>,
        notification_kind -> Text,
        scope_kind -> Text,
        scope_value -> Text,
        tokens_sent -> Int4,
        success -> Bool,
        error_message -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(device_tokens -> subscribers (subscriber_id));

diesel::allow_tables_to_appear_in_same_query!(events, subscribers, device_tokens, dispatch_attempts);
