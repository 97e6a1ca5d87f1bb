use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::engine::PetState;
use crate::error::{PetError, Result};
use crate::models::*;

/// A pet together with its owner's public identity.
#[derive(Debug, Clone, Serialize)]
pub struct PetListing {
    pub pet: Pet,
    pub username: String,
    pub email: String,
}

/// Database wrapper with CRUD operations.
pub struct Database {
    conn: Connection,
}

const PET_COLUMNS: &str =
    "id, user_id, kind, photo, hunger, happiness, energy, last_interaction, version";

const USER_COLUMNS: &str = "id, username, email, password_hash, pet_id, created_at";

fn row_to_pet(row: &Row<'_>) -> rusqlite::Result<Pet> {
    let kind_str: String = row.get(2)?;
    let kind = PetKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown pet kind '{}'", kind_str).into(),
        )
    })?;
    Ok(Pet {
        id: Some(row.get(0)?),
        user_id: row.get(1)?,
        kind,
        photo: row.get(3)?,
        stats: Stats {
            hunger: row.get(4)?,
            happiness: row.get(5)?,
            energy: row.get(6)?,
        },
        last_interaction: row.get(7)?,
        version: row.get(8)?,
    })
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: Some(row.get(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        pet_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Database {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        crate::db::schema::configure_connection(&conn)?;
        crate::db::schema::create_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::db::schema::configure_connection(&conn)?;
        crate::db::schema::create_tables(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction, taking the database write lock up front.
    pub fn begin_immediate(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    pub fn commit_transaction(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    pub fn rollback_transaction(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.begin_immediate()?;
        match f(self) {
            Ok(v) => {
                // A failed COMMIT (e.g. SQLITE_BUSY) leaves the transaction open.
                if let Err(e) = self.commit_transaction() {
                    let _ = self.rollback_transaction();
                    return Err(e);
                }
                Ok(v)
            }
            Err(e) => {
                let _ = self.rollback_transaction();
                Err(e)
            }
        }
    }

    // === Users ===

    /// Insert a new user. The email must not already be registered.
    /// Returns the new user ID.
    pub fn create_user(&self, user: &User) -> Result<i64> {
        let email = normalize_email(&user.email);
        self.in_transaction(|db| {
            if db.get_user_by_email(&email)?.is_some() {
                return Err(PetError::Conflict("User already exists".to_string()));
            }
            let inserted = db.conn.execute(
                "INSERT INTO users (username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user.username, email, user.password_hash, user.created_at],
            );
            match inserted {
                Ok(_) => Ok(db.conn.last_insert_rowid()),
                Err(e) if PetError::is_unique_violation(&e) => {
                    Err(PetError::Conflict("User already exists".to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![user_id], row_to_user)
            .optional()?)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![normalize_email(email)], row_to_user)
            .optional()?)
    }

    pub fn user_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    // === Pets ===

    /// Create a pet for a user and link it, atomically.
    /// Fails with `NotFound` if the user is missing and `Conflict` if they already own a pet.
    pub fn create_pet_for_user(
        &self,
        user_id: i64,
        kind: PetKind,
        photo: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Pet> {
        self.in_transaction(|db| {
            let user = db
                .get_user(user_id)?
                .ok_or_else(|| PetError::NotFound("User not found".to_string()))?;
            if user.has_pet() || db.get_pet_by_user(user_id)?.is_some() {
                return Err(PetError::Conflict("User already has a pet".to_string()));
            }

            let pet = Pet::new(user_id, kind, photo.to_string(), created_at);
            let inserted = db.conn.execute(
                "INSERT INTO pets
                     (user_id, kind, photo, hunger, happiness, energy, last_interaction, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    pet.user_id,
                    pet.kind.as_str(),
                    pet.photo,
                    pet.stats.hunger,
                    pet.stats.happiness,
                    pet.stats.energy,
                    pet.last_interaction,
                    pet.version,
                ],
            );
            if let Err(e) = inserted {
                if PetError::is_unique_violation(&e) {
                    return Err(PetError::Conflict("User already has a pet".to_string()));
                }
                return Err(e.into());
            }
            let pet_id = db.conn.last_insert_rowid();

            let linked = db.conn.execute(
                "UPDATE users SET pet_id = ?1 WHERE id = ?2 AND pet_id IS NULL",
                params![pet_id, user_id],
            )?;
            if linked != 1 {
                return Err(PetError::Conflict("User already has a pet".to_string()));
            }

            Ok(Pet {
                id: Some(pet_id),
                ..pet
            })
        })
    }

    pub fn get_pet(&self, pet_id: i64) -> Result<Option<Pet>> {
        let sql = format!("SELECT {} FROM pets WHERE id = ?1", PET_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![pet_id], row_to_pet)
            .optional()?)
    }

    pub fn get_pet_by_user(&self, user_id: i64) -> Result<Option<Pet>> {
        let sql = format!("SELECT {} FROM pets WHERE user_id = ?1", PET_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![user_id], row_to_pet)
            .optional()?)
    }

    /// Write new stats only if the stored version still matches `expected_version`.
    /// Returns `false` when another writer got there first.
    pub fn update_pet_if_version(
        &self,
        pet_id: i64,
        expected_version: i64,
        state: &PetState,
    ) -> Result<bool> {
        let stats = state.stats.clamped();
        let changed = self.conn.execute(
            "UPDATE pets
             SET hunger = ?1, happiness = ?2, energy = ?3, last_interaction = ?4,
                 version = version + 1
             WHERE id = ?5 AND version = ?6",
            params![
                stats.hunger,
                stats.happiness,
                stats.energy,
                state.last_interaction,
                pet_id,
                expected_version,
            ],
        )?;
        Ok(changed == 1)
    }

    pub fn pet_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM pets", [], |row| row.get(0))?)
    }

    /// All pets with their owners, ordered by pet ID.
    pub fn list_pets_with_owners(&self) -> Result<Vec<PetListing>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.user_id, p.kind, p.photo, p.hunger, p.happiness, p.energy,
                    p.last_interaction, p.version, u.username, u.email
             FROM pets p JOIN users u ON u.id = p.user_id
             ORDER BY p.id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(PetListing {
                pet: row_to_pet(row)?,
                username: row.get(9)?,
                email: row.get(10)?,
            })
        })?;

        let mut listings = Vec::new();
        for row in rows {
            listings.push(row?);
        }
        Ok(listings)
    }

    // === Contacts ===

    pub fn insert_contact(
        &self,
        contact: &NewContact,
        created_at: DateTime<Utc>,
    ) -> Result<ContactMessage> {
        self.conn.execute(
            "INSERT INTO contacts (name, email, interest, message, newsletter, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                contact.name.trim(),
                contact.email.trim(),
                contact.interest.trim(),
                contact.message,
                contact.newsletter,
                created_at,
            ],
        )?;
        Ok(ContactMessage {
            id: self.conn.last_insert_rowid(),
            name: contact.name.trim().to_string(),
            email: contact.email.trim().to_string(),
            interest: contact.interest.trim().to_string(),
            message: contact.message.clone(),
            newsletter: contact.newsletter,
            created_at,
        })
    }

    /// Contact messages, newest first.
    pub fn list_contacts(&self) -> Result<Vec<ContactMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, interest, message, newsletter, created_at
             FROM contacts ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ContactMessage {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                interest: row.get(3)?,
                message: row.get(4)?,
                newsletter: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut contacts = Vec::new();
        for row in rows {
            contacts.push(row?);
        }
        Ok(contacts)
    }
}
