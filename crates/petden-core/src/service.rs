//! Game operations: accounts, pet assignment, stats and interactions.
//!
//! `PetService` owns everything an operation needs (store, catalog,
//! authenticator, clock) and is passed around explicitly.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::auth::{self, Authenticator};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::data::{CatalogEntry, PetCatalog};
use crate::db::{Database, PetListing};
use crate::engine::{self, Action, PetState, StatsView};
use crate::error::{PetError, Result};
use crate::models::*;

/// Returned by `pet_stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PetStatsView {
    pub hunger: i64,
    pub happiness: i64,
    pub energy: i64,
    #[serde(rename = "lastInteraction")]
    pub last_interaction: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub kind: PetKind,
    pub photo: String,
}

impl PetStatsView {
    fn new(view: StatsView, pet: &Pet) -> Self {
        Self {
            hunger: view.hunger,
            happiness: view.happiness,
            energy: view.energy,
            last_interaction: view.last_interaction,
            kind: pet.kind,
            photo: pet.photo.clone(),
        }
    }
}

/// Returned by `interact`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionView {
    pub message: String,
    pub hunger: i64,
    pub happiness: i64,
    pub energy: i64,
    #[serde(rename = "lastInteraction")]
    pub last_interaction: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginToken {
    pub token: String,
    #[serde(rename = "userId")]
    pub user_id: i64,
}

pub struct PetService {
    db: Database,
    catalog: PetCatalog,
    auth: Authenticator,
    clock: Arc<dyn Clock>,
    max_write_retries: u32,
}

impl PetService {
    pub fn new(
        db: Database,
        catalog: PetCatalog,
        auth: Authenticator,
        clock: Arc<dyn Clock>,
        max_write_retries: u32,
    ) -> Self {
        Self {
            db,
            catalog,
            auth,
            clock,
            max_write_retries: max_write_retries.max(1),
        }
    }

    /// Open the configured database with the bundled catalog and the system clock.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db = Database::open(&config.db_path)?;
        let auth = Authenticator::new(
            config.token_secret().as_bytes().to_vec(),
            Duration::seconds(config.token_ttl_secs),
        );
        Ok(Self::new(
            db,
            PetCatalog::bundled()?,
            auth,
            Arc::new(SystemClock),
            config.max_write_retries,
        ))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn catalog(&self) -> &[CatalogEntry] {
        self.catalog.entries()
    }

    // === Accounts ===

    pub fn signup(&self, username: &str, email: &str, password: &str) -> Result<User> {
        let username = username.trim();
        let email = normalize_email(email);
        if username.is_empty() {
            return Err(PetError::Validation("Username is required".to_string()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(PetError::Validation("A valid email is required".to_string()));
        }
        if password.chars().count() < auth::MIN_PASSWORD_LEN {
            return Err(PetError::Validation(format!(
                "Password must be at least {} characters",
                auth::MIN_PASSWORD_LEN
            )));
        }

        let hash = auth::hash_password(password)?;
        let user = User::new(username.to_string(), email, hash, self.clock.now());
        let id = self.db.create_user(&user)?;
        log::info!("Created user {} ({})", id, user.email);
        Ok(User { id: Some(id), ..user })
    }

    pub fn login(&self, email: &str, password: &str) -> Result<LoginToken> {
        let rejected = || PetError::Unauthorized("Email or password is wrong".to_string());
        let user = self.db.get_user_by_email(email)?.ok_or_else(|| {
            log::warn!("Login attempt for unknown email");
            rejected()
        })?;
        if !auth::verify_password(password, &user.password_hash) {
            log::warn!("Failed login for user {:?}", user.id);
            return Err(rejected());
        }
        let user_id = user
            .id
            .ok_or_else(|| PetError::Data("Stored user has no id".to_string()))?;
        let token = self.auth.issue(user_id, self.clock.now())?;
        Ok(LoginToken { token, user_id })
    }

    /// Resolve a bearer token to a user ID.
    pub fn authenticate(&self, token: &str) -> Result<i64> {
        self.auth.verify(token, self.clock.now())
    }

    pub fn get_user(&self, user_id: i64) -> Result<UserProfile> {
        let user = self
            .db
            .get_user(user_id)?
            .ok_or_else(|| PetError::NotFound("User not found".to_string()))?;
        let pet = self.db.get_pet_by_user(user_id)?;
        Ok(UserProfile {
            id: user_id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            pet,
        })
    }

    // === Pets ===

    pub fn assign_pet(&self, user_id: i64, choice: &str) -> Result<Pet> {
        let entry = self
            .catalog
            .get(choice)
            .ok_or_else(|| PetError::Validation("Invalid pet choice".to_string()))?;
        let pet = self
            .db
            .create_pet_for_user(user_id, entry.kind, &entry.photo, self.clock.now())?;
        log::info!("Assigned {} to user {}", pet.kind, user_id);
        Ok(pet)
    }

    fn owned_pet(&self, user_id: i64) -> Result<Pet> {
        self.db
            .get_pet_by_user(user_id)?
            .ok_or_else(|| PetError::NotFound("Pet not found".to_string()))
    }

    fn pet_id(pet: &Pet) -> Result<i64> {
        pet.id
            .ok_or_else(|| PetError::Data("Stored pet has no id".to_string()))
    }

    /// Current stats with lazy decay. Writes back only past the persist threshold.
    pub fn pet_stats(&self, user_id: i64) -> Result<PetStatsView> {
        let pet = self.owned_pet(user_id)?;
        let now = self.clock.now();
        let current = PetState {
            stats: pet.stats,
            last_interaction: pet.last_interaction,
        };
        let outcome = engine::read_stats(&current, now);

        if let Some(new_state) = outcome.persist {
            let pet_id = Self::pet_id(&pet)?;
            if !self.db.update_pet_if_version(pet_id, pet.version, &new_state)? {
                // Someone else wrote in between; their state is at least as fresh.
                log::warn!("Stats write-back for pet {} lost a race; re-reading", pet_id);
                let fresh = self.owned_pet(user_id)?;
                let shown = PetState {
                    stats: fresh.stats,
                    last_interaction: fresh.last_interaction,
                };
                return Ok(PetStatsView::new(StatsView::from_state(&shown), &fresh));
            }
            log::debug!("Persisted decay for pet {}", pet_id);
        }

        Ok(PetStatsView::new(outcome.view, &pet))
    }

    /// Apply feed/play/care. The tag is validated before anything is loaded.
    pub fn interact(&self, user_id: i64, action: &str) -> Result<InteractionView> {
        let action: Action = action.parse()?;

        for attempt in 1..=self.max_write_retries {
            let pet = self.owned_pet(user_id)?;
            let pet_id = Self::pet_id(&pet)?;
            let current = PetState {
                stats: pet.stats,
                last_interaction: pet.last_interaction,
            };
            let outcome = engine::interact(&current, action, self.clock.now());

            if self.db.update_pet_if_version(pet_id, pet.version, &outcome.state)? {
                log::info!("User {} ran {} on pet {}", user_id, action, pet_id);
                return Ok(InteractionView {
                    message: outcome.message,
                    hunger: outcome.view.hunger,
                    happiness: outcome.view.happiness,
                    energy: outcome.view.energy,
                    last_interaction: outcome.view.last_interaction,
                });
            }
            log::warn!(
                "Concurrent update on pet {} (attempt {}/{}); retrying",
                pet_id,
                attempt,
                self.max_write_retries
            );
        }

        Err(PetError::Contention(format!(
            "Pet for user {} kept changing; gave up after {} attempts",
            user_id, self.max_write_retries
        )))
    }

    pub fn list_pets(&self) -> Result<Vec<PetListing>> {
        self.db.list_pets_with_owners()
    }

    // === Contact ===

    pub fn submit_contact(&self, contact: &NewContact) -> Result<ContactMessage> {
        contact.validate()?;
        let saved = self.db.insert_contact(contact, self.clock.now())?;
        log::info!("Stored contact message {}", saved.id);
        Ok(saved)
    }

    pub fn list_contacts(&self) -> Result<Vec<ContactMessage>> {
        self.db.list_contacts()
    }
}
