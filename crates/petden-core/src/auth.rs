//! Credential hashing and bearer tokens.
//!
//! Passwords are stored as PBKDF2-HMAC-SHA256 with a random 16-byte salt:
//! `pbkdf2-sha256$<iterations>$<salt>$<hash>` (base64, no padding).
//!
//! Tokens are `<claims>.<tag>` where `claims` is base64url JSON
//! `{ sub, iat, exp }` and `tag` is `HMAC-SHA256(secret, claims)`.
//! Crypto comes from the `hmac-sha256` crate.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac_sha256::HMAC;
use serde::{Deserialize, Serialize};

use crate::error::{PetError, Result};

const SCHEME: &str = "pbkdf2-sha256";
pub const DEFAULT_ITERATIONS: u32 = 20_000;
const SALT_LEN: usize = 16;

pub const MIN_PASSWORD_LEN: usize = 6;

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    getrandom::fill(&mut buf)
        .map_err(|e| PetError::Data(format!("entropy source unavailable: {}", e)))?;
    Ok(buf)
}

/// PBKDF2 with a single 32-byte output block.
fn pbkdf2_block(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut first = Vec::with_capacity(salt.len() + 4);
    first.extend_from_slice(salt);
    first.extend_from_slice(&1u32.to_be_bytes());

    let mut u = HMAC::mac(&first, password);
    let mut out = u;
    for _ in 1..iterations {
        u = HMAC::mac(u, password);
        for (o, b) in out.iter_mut().zip(u.iter()) {
            *o ^= b;
        }
    }
    out
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn hash_password(password: &str) -> Result<String> {
    hash_password_with(password, DEFAULT_ITERATIONS)
}

pub fn hash_password_with(password: &str, iterations: u32) -> Result<String> {
    let salt: [u8; SALT_LEN] = random_bytes()?;
    let hash = pbkdf2_block(password.as_bytes(), &salt, iterations.max(1));
    Ok(format!(
        "{}${}${}${}",
        SCHEME,
        iterations.max(1),
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    ))
}

/// Check a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iters), Some(salt), Some(hash), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let Ok(iterations) = iters.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (STANDARD_NO_PAD.decode(salt), STANDARD_NO_PAD.decode(hash))
    else {
        return false;
    };
    let computed = pbkdf2_block(password.as_bytes(), &salt, iterations.max(1));
    constant_time_eq(&computed, &expected)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: i64,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Issues and verifies signed bearer tokens.
#[derive(Clone)]
pub struct Authenticator {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Authenticator {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let tag = HMAC::mac(payload.as_bytes(), &self.secret);
        Ok(format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(tag)))
    }

    /// Resolve a token to its user ID.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<i64> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            return Err(PetError::Unauthorized("No token provided".to_string()));
        }
        let invalid = || PetError::Unauthorized("Invalid token".to_string());

        let (payload, tag) = token.split_once('.').ok_or_else(invalid)?;
        let tag = URL_SAFE_NO_PAD.decode(tag).map_err(|_| invalid())?;
        let tag: [u8; 32] = tag.as_slice().try_into().map_err(|_| invalid())?;
        if !HMAC::verify(payload.as_bytes(), &self.secret, &tag) {
            log::warn!("auth: token signature mismatch");
            return Err(invalid());
        }

        let raw = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
        let claims: Claims = serde_json::from_slice(&raw).map_err(|_| invalid())?;
        if now.timestamp() >= claims.exp {
            return Err(PetError::Unauthorized("Token expired".to_string()));
        }
        Ok(claims.sub)
    }
}
