// app/src/models/card.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// A user's stored-value card. `balance_cents` never goes below zero.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Card {
  pub id: Uuid,
  pub user_id: Uuid,
  /// 16 decimal digits, unique across cards.
  pub number: String,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub balance_cents: i64,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCard {
  pub user_id: Uuid,
  pub number: String,
  pub password_hash: String,
}
