// app/src/models/user.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
  pub id: Uuid,
  pub email: String,
  pub name: String,
  #[serde(skip_serializing)] // Never send password hash to client
  pub password_hash: String,
  pub is_admin: bool,
  pub created_at: DateTime<Utc>,
}

/// A validated sign-up with its password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub email: String,
  pub name: String,
  pub password_hash: String,
}
