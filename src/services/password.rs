use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),
    #[error("Invalid password")]
    InvalidPassword,
}

impl From<argon2::password_hash::Error> for PasswordError {
    fn from(err: argon2::password_hash::Error) -> Self {
        PasswordError::HashError(err.to_string())
    }
}

impl From<PasswordError> for crate::error::ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::InvalidPassword => crate::error::ApiError::InvalidCredentials,
            PasswordError::HashError(msg) => crate::error::ApiError::Internal(msg),
        }
    }
}

pub struct PasswordService;

impl PasswordService {
    /// Hash a password using Argon2
    pub fn hash_password(password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2.hash_password(password.as_bytes(), &salt)?.to_string();

        Ok(password_hash)
    }

    /// Verify a password against its hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash)?;
        let argon2 = Argon2::default();

        Ok(argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trip() {
        let hash = PasswordService::hash_password("s3cret-pass").unwrap();
        assert!(PasswordService::verify_password("s3cret-pass", &hash).unwrap());
        assert!(!PasswordService::verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = PasswordService::hash_password("same").unwrap();
        let b = PasswordService::hash_password("same").unwrap();
        assert_ne!(a, b);
    }
}
