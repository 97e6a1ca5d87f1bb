use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PetError, Result};

/// A contact-form submission as received from a visitor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    pub interest: String,
    pub message: String,
    pub newsletter: bool,
}

impl NewContact {
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(PetError::Validation("A valid email is required".to_string()));
        }
        if self.message.trim().is_empty() {
            return Err(PetError::Validation("Message must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub interest: String,
    pub message: String,
    pub newsletter: bool,
    pub created_at: DateTime<Utc>,
}
