table! {
    memos (password) {
        password -> Varchar,
        content -> Text,
        duration_minutes -> Int4,
        expires_at -> Timestamp,
        last_updated -> Timestamp,
    }
}
