//! Core types used throughout the system
//!
//! Every node and every user is identified by a [`Principal`]: the raw
//! Ed25519 public key of its [`Identity`]. Principals are self-authenticating,
//! so a signed request proves who the caller is without a key registry.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of a principal in bytes (Ed25519 public key).
pub const PRINCIPAL_LEN: usize = 32;

/// Nanoseconds since the Unix epoch. Batch timestamps use this unit.
pub type TimestampNanos = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("principal must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("principal is not valid hex: {0}")]
    InvalidHex(String),

    #[error("principal is not a valid Ed25519 public key")]
    InvalidKey,
}

/// Caller / service identifier.
///
/// Serialized as 64 lowercase hex characters in both JSON and bincode.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Principal([u8; PRINCIPAL_LEN]);

impl Principal {
    pub fn from_bytes(bytes: [u8; PRINCIPAL_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PRINCIPAL_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex principal and check that it is a usable Ed25519 key.
    pub fn from_hex(s: &str) -> Result<Self, PrincipalError> {
        if s.len() != PRINCIPAL_LEN * 2 {
            return Err(PrincipalError::InvalidLength {
                expected: PRINCIPAL_LEN * 2,
                actual: s.len(),
            });
        }
        let mut bytes = [0u8; PRINCIPAL_LEN];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| PrincipalError::InvalidHex(e.to_string()))?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| PrincipalError::InvalidKey)?;
        Ok(Self(bytes))
    }

    /// Verify `signature` over `message` against this principal's key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
            return false;
        };
        key.verify(message, &Signature::from_bytes(&sig_bytes)).is_ok()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Principal({}..)", &hex[..10])
    }
}

impl FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Principal::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A signing identity. Cloning shares the same key and nonce clock.
#[derive(Clone)]
pub struct Identity {
    key: SigningKey,
    last_nonce: Arc<AtomicI64>,
}

impl Identity {
    /// Fresh random identity.
    pub fn generate() -> Self {
        Self::from_key(SigningKey::generate(&mut OsRng))
    }

    /// Restore an identity from a 32-byte hex seed.
    pub fn from_seed_hex(seed: &str) -> Result<Self, PrincipalError> {
        let mut bytes = [0u8; 32];
        if seed.len() != 64 {
            return Err(PrincipalError::InvalidLength {
                expected: 64,
                actual: seed.len(),
            });
        }
        hex::decode_to_slice(seed, &mut bytes)
            .map_err(|e| PrincipalError::InvalidHex(e.to_string()))?;
        Ok(Self::from_key(SigningKey::from_bytes(&bytes)))
    }

    fn from_key(key: SigningKey) -> Self {
        Self {
            key,
            last_nonce: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn seed_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }

    pub fn principal(&self) -> Principal {
        Principal(self.key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.key.sign(message).to_bytes()
    }

    /// Millisecond timestamp nonce, unique for this identity.
    ///
    /// Requests signed in the same millisecond get consecutive values.
    pub fn next_nonce(&self) -> i64 {
        let now = now_millis();
        let mut current = self.last_nonce.load(Ordering::Acquire);
        loop {
            let next = now.max(current + 1);
            match self.last_nonce.compare_exchange(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("principal", &self.principal())
            .finish_non_exhaustive()
    }
}

pub fn now_nanos() -> TimestampNanos {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
