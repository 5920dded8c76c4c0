// app/src/models/cart.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One per user. `total_price_cents` is a cache of the live item prices and is
/// rewritten by every store operation that changes the cart's items.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Cart {
  pub id: Uuid,
  pub user_id: Uuid,
  pub total_price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CartItem {
  pub id: Uuid,
  pub cart_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub added_at: DateTime<Utc>,
}

/// A cart item together with the user owning its cart.
#[derive(Debug, Clone, FromRow)]
pub struct OwnedCartItem {
  #[sqlx(flatten)]
  pub item: CartItem,
  pub owner_id: Uuid,
}

/// A cart row joined with the current product name and price.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartLine {
  pub cart_item_id: Uuid,
  pub product_id: Uuid,
  pub product_name: String,
  pub unit_price_cents: i64,
  pub quantity: i32,
  pub subtotal_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
  pub cart_id: Uuid,
  pub items: Vec<CartLine>,
  pub total_price_cents: i64,
}

impl CartView {
  pub fn new(cart_id: Uuid, items: Vec<CartLine>) -> Self {
    let total_price_cents = items.iter().map(|line| line.subtotal_cents).sum();
    Self {
      cart_id,
      items,
      total_price_cents,
    }
  }
}

/// Result of taking some quantity off a cart item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemReduction {
  Decreased { item: CartItem },
  Removed { cart_item_id: Uuid },
}
