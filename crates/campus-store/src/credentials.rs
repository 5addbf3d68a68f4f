//! Password credential material: salted scrypt records and constant-time
//! verification.

use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::error::StoreError;

/// Salt length in bytes before hex encoding (128 bits).
const SALT_LEN: usize = 16;
/// Derived hash length in bytes before hex encoding.
const HASH_LEN: usize = 64;
/// scrypt cost parameters: N = 2^14, r = 8, p = 1.
const LOG_N: u8 = 14;
const R: u32 = 8;
const P: u32 = 1;

/// Hex-encoded hash + salt pair as stored in the `accounts` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordRecord {
    pub hash: String,
    pub salt: String,
}

/// Derive a fresh credential pair. Empty passwords are rejected here; any
/// richer policy (minimum length) belongs to the caller.
pub fn create_password_record(password: &str) -> Result<PasswordRecord, StoreError> {
    if password.is_empty() {
        return Err(StoreError::Credential("password must not be empty".into()));
    }
    let mut salt_bytes = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = hex::encode(salt_bytes);
    let hash = derive(password, &salt, HASH_LEN)
        .ok_or_else(|| StoreError::Credential("key derivation failed".into()))?;
    Ok(PasswordRecord {
        hash: hex::encode(hash),
        salt,
    })
}

/// scrypt over the bytes of the hex-encoded salt string.
fn derive(password: &str, salt: &str, len: usize) -> Option<Vec<u8>> {
    if len == 0 {
        return None;
    }
    let params = scrypt::Params::new(LOG_N, R, P, HASH_LEN).ok()?;
    let mut out = vec![0u8; len];
    scrypt::scrypt(password.as_bytes(), salt.as_bytes(), &params, &mut out).ok()?;
    Some(out)
}

/// Check a plaintext password against a stored pair. Missing or malformed
/// material is a normal "cannot authenticate" outcome, never an error. The
/// byte comparison is constant time; the candidate is derived at the stored
/// hash's length, so no content-dependent timing leaks out of the compare.
pub fn verify_password(password: &str, hash: Option<&str>, salt: Option<&str>) -> bool {
    let (Some(hash), Some(salt)) = (hash, salt) else {
        return false;
    };
    if password.is_empty() || hash.is_empty() || salt.is_empty() {
        return false;
    }
    let Ok(stored) = hex::decode(hash) else {
        return false;
    };
    let Some(candidate) = derive(password, salt, stored.len()) else {
        return false;
    };
    stored.ct_eq(&candidate).into()
}
