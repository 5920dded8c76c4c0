// app/src/pipelines/contexts.rs

//! Data structs the pipelines run over. Handlers receive them wrapped in
//! `cardshop_flow::ContextData`; inputs are set by the web layer, `Option`
//! fields are filled in by the steps.

use crate::models::{Card, CartItem, CheckoutState, ItemReduction, PaymentScope, Settlement, User};
use crate::state::AppState;
use uuid::Uuid;

// --- accounts ---

#[derive(Clone)]
pub struct SignupCtxData {
  pub app_state: AppState,
  pub email: String,
  pub name: String,
  pub password: String,
  pub repeat_password: String,
  pub password_hash: Option<String>,
  pub created_user: Option<User>,
}

#[derive(Clone)]
pub struct SigninCtxData {
  pub app_state: AppState,
  pub email: String,
  pub password: String,
  pub user: Option<User>,
  pub session_token: Option<String>,
}

/// `target_user_id` is the account the request names; `None` means the caller's own.
#[derive(Clone)]
pub struct ChangeUserPasswordCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub target_user_id: Option<Uuid>,
  pub old_password: String,
  pub new_password: String,
  pub repeat_new_password: String,
  pub user: Option<User>,
}

#[derive(Clone)]
pub struct ChangeUserNameCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub target_user_id: Option<Uuid>,
  pub password: String,
  pub new_name: String,
  pub user: Option<User>,
  pub renamed_user: Option<User>,
}

#[derive(Clone)]
pub struct DeleteUserCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub target_user_id: Option<Uuid>,
  pub password: String,
  pub user: Option<User>,
}

// --- cards ---

#[derive(Clone)]
pub struct CreateCardCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub user_password: String,
  pub card_password: String,
  pub repeat_card_password: String,
  pub card: Option<Card>,
}

#[derive(Clone)]
pub struct DepositCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub card_password: String,
  pub amount_cents: i64,
  pub card: Option<Card>,
  pub new_balance_cents: Option<i64>,
}

#[derive(Clone)]
pub struct ChangeCardPasswordCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub old_card_password: String,
  pub new_card_password: String,
  pub repeat_new_card_password: String,
  pub card: Option<Card>,
}

#[derive(Clone)]
pub struct DeleteCardCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub card_password: String,
  pub card: Option<Card>,
}

// --- cart ---

#[derive(Clone)]
pub struct AddToCartCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub cart_item: Option<CartItem>,
}

#[derive(Clone)]
pub struct ReduceCartItemCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub cart_item_id: Uuid,
  pub amount: i32,
  pub reduction: Option<ItemReduction>,
}

#[derive(Clone)]
pub struct RemoveCartItemCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub cart_item_id: Uuid,
}

#[derive(Clone)]
pub struct ClearCartCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub removed: Option<u64>,
}

// --- checkout ---

#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub scope: PaymentScope,
  pub state: CheckoutState,
  pub card: Option<Card>,
  pub settlement: Option<Settlement>,
}

impl CheckoutCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, scope: PaymentScope) -> Self {
    Self {
      app_state,
      user_id,
      scope,
      state: CheckoutState::Pending,
      card: None,
      settlement: None,
    }
  }
}
