//! The shared access token.
//!
//! One secret per process, generated at startup unless configured. Clients
//! present it as the `token` query parameter.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

/// Random bytes in a generated token.
const TOKEN_BYTES: usize = 16;

/// The access token.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// A fresh URL-safe token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Use `configured` when present, otherwise generate one.
    pub fn from_config(configured: Option<&str>) -> Self {
        match configured {
            Some(token) if !token.is_empty() => Self(token.to_string()),
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact comparison against a client-supplied credential.
    pub fn verify(&self, candidate: Option<&str>) -> bool {
        candidate.is_some_and(|c| c == self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}
