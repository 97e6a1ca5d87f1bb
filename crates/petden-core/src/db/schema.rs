use rusqlite::Connection;

use crate::error::Result;

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            pet_id INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY (pet_id) REFERENCES pets(id)
        );

        CREATE TABLE IF NOT EXISTS pets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL UNIQUE,
            kind TEXT NOT NULL,
            photo TEXT NOT NULL DEFAULT '',
            hunger REAL NOT NULL DEFAULT 100 CHECK (hunger BETWEEN 0 AND 100),
            happiness REAL NOT NULL DEFAULT 100 CHECK (happiness BETWEEN 0 AND 100),
            energy REAL NOT NULL DEFAULT 100 CHECK (energy BETWEEN 0 AND 100),
            last_interaction TEXT,
            version INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (user_id) REFERENCES users(id)
        );

        CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL,
            interest TEXT NOT NULL DEFAULT '',
            message TEXT NOT NULL,
            newsletter INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Connection settings applied on every open.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}
