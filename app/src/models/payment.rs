// app/src/models/payment.rs

use serde::Serialize;
use uuid::Uuid;

/// What a checkout pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentScope {
  SingleItem(Uuid),
  WholeCart,
}

impl PaymentScope {
  pub fn item_id(&self) -> Option<Uuid> {
    match self {
      PaymentScope::SingleItem(id) => Some(*id),
      PaymentScope::WholeCart => None,
    }
  }
}

/// Lifecycle of one checkout attempt. A rejected attempt changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
  #[default]
  Pending,
  Committed,
  Rejected,
}

/// Receipt of a committed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
  pub charged_cents: i64,
  pub remaining_balance_cents: i64,
  pub paid_items: Vec<Uuid>,
}
