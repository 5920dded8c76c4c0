// app/src/services/session.rs

//! Signed session tokens carried in the session cookie.
//!
//! Token layout: `<user_id>.<expires_at_unix>.<hex hmac-sha256>`, where the
//! MAC covers `<user_id>.<expires_at_unix>`.

use crate::errors::AppError;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub struct SessionKeys {
  secret: Vec<u8>,
  ttl: Duration,
  cookie_name: String,
}

impl SessionKeys {
  pub fn new(secret: &[u8], ttl_secs: i64, cookie_name: impl Into<String>) -> Result<Self, AppError> {
    let ttl = Duration::try_seconds(ttl_secs)
      .filter(|ttl| *ttl > Duration::zero())
      .ok_or_else(|| AppError::Config(format!("Session lifetime of {} seconds is out of range", ttl_secs)))?;
    Ok(Self {
      secret: secret.to_vec(),
      ttl,
      cookie_name: cookie_name.into(),
    })
  }

  pub fn cookie_name(&self) -> &str {
    &self.cookie_name
  }

  pub fn ttl_secs(&self) -> i64 {
    self.ttl.num_seconds()
  }

  pub fn issue(&self, user_id: Uuid) -> Result<String, AppError> {
    self.issue_at(user_id, Utc::now())
  }

  pub fn issue_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, AppError> {
    let expires_at = now
      .checked_add_signed(self.ttl)
      .ok_or_else(|| AppError::Internal("session expiry out of range".to_string()))?;
    let payload = format!("{}.{}", user_id, expires_at.timestamp());
    let signature = hex::encode(self.mac(&payload)?.finalize().into_bytes());
    Ok(format!("{}.{}", payload, signature))
  }

  pub fn verify(&self, token: &str) -> Result<Uuid, AppError> {
    self.verify_at(token, Utc::now())
  }

  pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, AppError> {
    let invalid = || AppError::Unauthenticated("invalid session".to_string());

    let (payload, signature_hex) = token.rsplit_once('.').ok_or_else(invalid)?;
    let (user_part, expiry_part) = payload.split_once('.').ok_or_else(invalid)?;

    let signature = hex::decode(signature_hex).map_err(|_| invalid())?;
    self.mac(payload)?.verify_slice(&signature).map_err(|_| {
      debug!("Session token signature mismatch.");
      invalid()
    })?;

    let expires_at: i64 = expiry_part.parse().map_err(|_| invalid())?;
    if now.timestamp() >= expires_at {
      return Err(AppError::Unauthenticated("session expired".to_string()));
    }
    Uuid::parse_str(user_part).map_err(|_| invalid())
  }

  fn mac(&self, payload: &str) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(&self.secret)
      .map_err(|e| AppError::Internal(format!("Session key rejected: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(mac)
  }
}
