use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{AppError, Res};

/// Hashes a password or token secret with argon2 and a random salt.
pub fn hash_str(value: &str) -> Res<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(value.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash value: {}", e)))
}

/// Checks `value` against a stored argon2 hash. A malformed hash never matches.
pub fn verify_hash(value: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(value.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored hash could not be parsed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_original_value() {
        let hash = hash_str("hunter2").unwrap();
        assert!(verify_hash("hunter2", &hash));
        assert!(!verify_hash("hunter3", &hash));
        assert!(!verify_hash("hunter2", "not-a-hash"));
    }
}
