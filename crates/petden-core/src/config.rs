use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PetError, Result};

/// Used when no secret is configured. Fine for local play, never for a shared deployment.
pub const DEV_TOKEN_SECRET: &str = "petden-dev-secret";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: String,
    /// HMAC key for bearer tokens.
    pub token_secret: Option<String>,
    pub token_ttl_secs: i64,
    /// Attempts at a conditional pet write before giving up.
    pub max_write_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "petden.db".to_string(),
            token_secret: None,
            token_ttl_secs: 3600,
            max_write_retries: 5,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Defaults, then the file (if any), then `PETDEN_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_overrides_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(val) = lookup("PETDEN_DB") {
            self.db_path = val;
        }
        if let Some(val) = lookup("PETDEN_SECRET") {
            self.token_secret = Some(val);
        }
        if let Some(val) = lookup("PETDEN_TOKEN_TTL") {
            self.token_ttl_secs = val
                .parse()
                .map_err(|_| PetError::Validation("Invalid PETDEN_TOKEN_TTL".to_string()))?;
        }
        if let Some(val) = lookup("PETDEN_MAX_WRITE_RETRIES") {
            self.max_write_retries = val
                .parse()
                .map_err(|_| PetError::Validation("Invalid PETDEN_MAX_WRITE_RETRIES".to_string()))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(PetError::Validation("db_path must not be empty".to_string()));
        }
        if self.token_ttl_secs <= 0 {
            return Err(PetError::Validation("token_ttl_secs must be positive".to_string()));
        }
        if self.max_write_retries == 0 {
            return Err(PetError::Validation("max_write_retries must be at least 1".to_string()));
        }
        if matches!(&self.token_secret, Some(s) if s.is_empty()) {
            return Err(PetError::Validation("token_secret must not be empty".to_string()));
        }
        Ok(())
    }

    /// The configured secret, or the development fallback.
    pub fn token_secret(&self) -> &str {
        match &self.token_secret {
            Some(s) => s,
            None => {
                log::warn!("No token secret configured; using the development default");
                DEV_TOKEN_SECRET
            }
        }
    }
}
