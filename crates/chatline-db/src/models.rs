//! Raw SQLite rows. The store converts them to `chatline_types` records.

pub struct CredentialRow {
    pub id: String,
    pub email: String,
    pub password: String,
}

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
}

pub struct MessageRow {
    pub seq: i64,
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    pub created_at: String,
}
