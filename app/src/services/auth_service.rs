// app/src/services/auth_service.rs

//! Argon2id hashing for login and card passwords.

use crate::errors::AppError;
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Algorithm, Argon2, Params, Version,
};
use tracing::{debug, error, instrument};

/// Argon2id hasher with the cost parameters from `AppConfig`.
///
/// The async methods move the CPU-bound work onto tokio's blocking pool so a
/// hash never stalls an actix worker.
#[derive(Clone)]
pub struct Credentials {
  argon2: Argon2<'static>,
}

impl Credentials {
  pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, AppError> {
    let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
      .map_err(|e| AppError::Config(format!("Invalid argon2 parameters: {}", e)))?;
    Ok(Self {
      argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
    })
  }

  #[instrument(name = "auth_service::hash_password", skip_all, err(Display))]
  pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
    if password.is_empty() {
      return Err(AppError::Validation("Password cannot be empty.".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    match self.argon2.hash_password(password.as_bytes(), &salt) {
      Ok(password_hash) => Ok(password_hash.to_string()),
      Err(argon_err) => {
        error!(error = %argon_err, "Argon2 password hashing failed.");
        Err(AppError::Internal(format!("Password hashing failed: {}", argon_err)))
      }
    }
  }

  /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
  #[instrument(name = "auth_service::verify_password", skip_all, err(Display))]
  pub fn verify_password(&self, stored_hash: &str, provided_password: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(stored_hash).map_err(|parse_err| {
      error!(error = %parse_err, "Stored password hash could not be parsed.");
      AppError::Internal(format!("Invalid stored password hash: {}", parse_err))
    })?;

    match self.argon2.verify_password(provided_password.as_bytes(), &parsed_hash) {
      Ok(()) => Ok(true),
      Err(argon2::password_hash::Error::Password) => {
        debug!("Password mismatch.");
        Ok(false)
      }
      Err(other) => {
        error!(error = %other, "Argon2 verification failed.");
        Err(AppError::Internal(format!("Password verification failed: {}", other)))
      }
    }
  }

  pub async fn hash(&self, password: String) -> Result<String, AppError> {
    let this = self.clone();
    tokio::task::spawn_blocking(move || this.hash_password(&password))
      .await
      .map_err(|join_err| AppError::Internal(format!("Hashing task failed: {}", join_err)))?
  }

  pub async fn verify(&self, stored_hash: String, provided_password: String) -> Result<bool, AppError> {
    let this = self.clone();
    tokio::task::spawn_blocking(move || this.verify_password(&stored_hash, &provided_password))
      .await
      .map_err(|join_err| AppError::Internal(format!("Verification task failed: {}", join_err)))?
  }

  /// Verifies and turns a mismatch into `InvalidCredential`.
  pub async fn require_match(&self, stored_hash: String, provided_password: String) -> Result<(), AppError> {
    if self.verify(stored_hash, provided_password).await? {
      Ok(())
    } else {
      Err(AppError::InvalidCredential)
    }
  }
}
