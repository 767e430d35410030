use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of the singular `user` table. No timestamp columns.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,              // assigned by the database on insert
    pub username: String,     // display name, not unique
    pub email: String,        // unique
    #[serde(skip_serializing)]
    pub password: String,     // Argon2 PHC string, never the plaintext
}

/// Candidate row for an insert. `password` is plaintext until `before_create` runs.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Partial update. `None` leaves the column as it is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password.is_none()
    }
}
