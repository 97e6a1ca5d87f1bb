use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pet::Pet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub pet_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            username,
            email,
            password_hash,
            pet_id: None,
            created_at,
        }
    }

    pub fn has_pet(&self) -> bool {
        self.pet_id.is_some()
    }
}

/// A user as shown to callers: no credential material, pet populated.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub pet: Option<Pet>,
}

/// Normalise an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
