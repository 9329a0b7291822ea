// Table definitions for the SQLite store. Timestamps are kept as ISO-8601
// text, matching what the gateway delivers.

diesel::table! {
    servers (id) {
        id -> BigInt,
        platform_id -> Text,
        name -> Text,
        created_at -> Nullable<Text>,
        member_count -> Nullable<BigInt>,
        owner_platform_id -> Nullable<Text>,
    }
}

diesel::table! {
    channels (id) {
        id -> BigInt,
        platform_id -> Text,
        name -> Text,
        server_id -> BigInt,
    }
}

diesel::table! {
    users (id) {
        id -> BigInt,
        platform_id -> Text,
        username -> Text,
        discriminator -> Nullable<Text>,
    }
}

diesel::table! {
    messages (id) {
        id -> BigInt,
        platform_id -> Text,
        created_at -> Text,
        content -> Text,
        author_id -> BigInt,
        channel_id -> BigInt,
        server_id -> BigInt,
        is_edited -> Bool,
        attachments_url -> Nullable<Text>,
    }
}

diesel::joinable!(channels -> servers (server_id));
diesel::joinable!(messages -> users (author_id));
diesel::joinable!(messages -> channels (channel_id));
diesel::joinable!(messages -> servers (server_id));

diesel::allow_tables_to_appear_in_same_query!(servers, channels, users, messages);
