// app/src/pipelines/common_steps.rs

//! Steps shared by more than one pipeline. Each is generic over a small trait
//! the context data implements, so one handler serves several pipelines.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Card, User};
use crate::pipelines::contexts::{
  ChangeCardPasswordCtxData, ChangeUserNameCtxData, ChangeUserPasswordCtxData, CheckoutCtxData, DeleteCardCtxData,
  DeleteUserCtxData, DepositCtxData, ReduceCartItemCtxData, RemoveCartItemCtxData,
};
use crate::state::AppState;
use crate::store::Store;
use cardshop_flow::{ContextData, PipelineControl};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Context of a pipeline that acts on the caller's existing card.
pub trait CardScoped: Send + Sync + 'static {
  fn app_state(&self) -> &AppState;
  fn user_id(&self) -> Uuid;
  /// The password the caller supplied to unlock the card.
  fn presented_card_password(&self) -> &str;
  fn card(&self) -> Option<&Card>;
  fn set_card(&mut self, card: Card);
}

/// Context of a pipeline that changes the caller's own account.
pub trait AccountScoped: Send + Sync + 'static {
  fn app_state(&self) -> &AppState;
  fn user_id(&self) -> Uuid;
  fn target_user_id(&self) -> Option<Uuid>;
  /// The login password the caller supplied to confirm the change.
  fn presented_password(&self) -> &str;
  fn account(&self) -> Option<&User>;
  fn set_account(&mut self, user: User);
}

/// Context of a pipeline that acts on one item of the caller's cart.
pub trait ItemScoped: Send + Sync + 'static {
  fn app_state(&self) -> &AppState;
  fn user_id(&self) -> Uuid;
  fn cart_item_id(&self) -> Option<Uuid>;
}

macro_rules! card_scoped {
  ($ty:ty, $password:ident) => {
    impl CardScoped for $ty {
      fn app_state(&self) -> &AppState {
        &self.app_state
      }
      fn user_id(&self) -> Uuid {
        self.user_id
      }
      fn presented_card_password(&self) -> &str {
        &self.$password
      }
      fn card(&self) -> Option<&Card> {
        self.card.as_ref()
      }
      fn set_card(&mut self, card: Card) {
        self.card = Some(card);
      }
    }
  };
}

macro_rules! account_scoped {
  ($ty:ty, $password:ident) => {
    impl AccountScoped for $ty {
      fn app_state(&self) -> &AppState {
        &self.app_state
      }
      fn user_id(&self) -> Uuid {
        self.user_id
      }
      fn target_user_id(&self) -> Option<Uuid> {
        self.target_user_id
      }
      fn presented_password(&self) -> &str {
        &self.$password
      }
      fn account(&self) -> Option<&User> {
        self.user.as_ref()
      }
      fn set_account(&mut self, user: User) {
        self.user = Some(user);
      }
    }
  };
}

account_scoped!(ChangeUserPasswordCtxData, old_password);
account_scoped!(ChangeUserNameCtxData, password);
account_scoped!(DeleteUserCtxData, password);

card_scoped!(DepositCtxData, card_password);
card_scoped!(DeleteCardCtxData, card_password);
card_scoped!(ChangeCardPasswordCtxData, old_card_password);

impl ItemScoped for ReduceCartItemCtxData {
  fn app_state(&self) -> &AppState {
    &self.app_state
  }
  fn user_id(&self) -> Uuid {
    self.user_id
  }
  fn cart_item_id(&self) -> Option<Uuid> {
    Some(self.cart_item_id)
  }
}

impl ItemScoped for RemoveCartItemCtxData {
  fn app_state(&self) -> &AppState {
    &self.app_state
  }
  fn user_id(&self) -> Uuid {
    self.user_id
  }
  fn cart_item_id(&self) -> Option<Uuid> {
    Some(self.cart_item_id)
  }
}

impl ItemScoped for CheckoutCtxData {
  fn app_state(&self) -> &AppState {
    &self.app_state
  }
  fn user_id(&self) -> Uuid {
    self.user_id
  }
  fn cart_item_id(&self) -> Option<Uuid> {
    self.scope.item_id()
  }
}

/// A request naming another account is refused before anything is read.
#[instrument(name = "common_step::ensure_own_account", skip(ctx_data), err)]
pub async fn ensure_own_account<T: AccountScoped>(ctx_data: ContextData<T>) -> AppResult<PipelineControl> {
  let (user_id, target) = ctx_data.with(|d| (d.user_id(), d.target_user_id()));
  match target {
    Some(target) if target != user_id => {
      warn!(%user_id, %target, "Account change aimed at another user.");
      Err(AppError::Unauthorized("You can only change your own data".to_string()))
    }
    _ => Ok(PipelineControl::Continue),
  }
}

/// Loads the caller's account. An account deleted since sign-in is `NotFound`.
#[instrument(name = "common_step::load_account", skip(ctx_data), err)]
pub async fn load_account<T: AccountScoped>(ctx_data: ContextData<T>) -> AppResult<PipelineControl> {
  let (store, user_id) = ctx_data.with(|d| (d.app_state().store.clone(), d.user_id()));

  let user = store.find_user(user_id).await?.ok_or(AppError::NotFound("user"))?;
  ctx_data.update(|d| d.set_account(user));
  Ok(PipelineControl::Continue)
}

#[instrument(name = "common_step::verify_account_password", skip(ctx_data), err)]
pub async fn verify_account_password<T: AccountScoped>(ctx_data: ContextData<T>) -> AppResult<PipelineControl> {
  let (credentials, stored_hash, presented) = ctx_data.with(|d| {
    (
      d.app_state().credentials.clone(),
      d.account().map(|u| u.password_hash.clone()),
      d.presented_password().to_string(),
    )
  });
  let stored_hash =
    stored_hash.ok_or_else(|| AppError::Internal("verify_account_password ran before load_account".to_string()))?;

  credentials.require_match(stored_hash, presented).await?;
  Ok(PipelineControl::Continue)
}

/// Same as [`card_update_missed`], for conditional writes to the user row.
pub async fn account_update_missed(store: &dyn Store, user_id: Uuid) -> AppError {
  match store.find_user(user_id).await {
    Ok(None) => AppError::NotFound("user"),
    Ok(Some(_)) => {
      warn!(%user_id, "Login password changed during the operation.");
      AppError::InvalidCredential
    }
    Err(e) => e,
  }
}

/// Loads the caller's card into the context. No card is `NotFound`.
#[instrument(name = "common_step::load_card", skip(ctx_data), err)]
pub async fn load_card<T: CardScoped>(ctx_data: ContextData<T>) -> AppResult<PipelineControl> {
  let (store, user_id) = ctx_data.with(|d| (d.app_state().store.clone(), d.user_id()));

  let card = store.find_card_by_user(user_id).await?.ok_or_else(|| {
    debug!(%user_id, "User has no card.");
    AppError::NotFound("card")
  })?;
  ctx_data.update(|d| d.set_card(card));
  Ok(PipelineControl::Continue)
}

/// Checks the presented card password against the loaded card's hash.
#[instrument(name = "common_step::verify_card_password", skip(ctx_data), err)]
pub async fn verify_card_password<T: CardScoped>(ctx_data: ContextData<T>) -> AppResult<PipelineControl> {
  let (credentials, stored_hash, presented) = ctx_data.with(|d| {
    (
      d.app_state().credentials.clone(),
      d.card().map(|c| c.password_hash.clone()),
      d.presented_card_password().to_string(),
    )
  });
  let stored_hash =
    stored_hash.ok_or_else(|| AppError::Internal("verify_card_password ran before load_card".to_string()))?;

  credentials.require_match(stored_hash, presented).await?;
  Ok(PipelineControl::Continue)
}

/// Explains why a conditional card update matched no row: the card is gone
/// (`NotFound`) or its password changed after it was verified.
pub async fn card_update_missed(store: &dyn Store, user_id: Uuid) -> AppError {
  match store.find_card_by_user(user_id).await {
    Ok(None) => AppError::NotFound("card"),
    Ok(Some(_)) => {
      warn!(%user_id, "Card password changed during the operation.");
      AppError::InvalidCredential
    }
    Err(e) => e,
  }
}

/// The item must exist (`NotFound`) and sit in the caller's cart (`Unauthorized`).
#[instrument(name = "common_step::ensure_item_owned", skip(ctx_data), err)]
pub async fn ensure_item_owned<T: ItemScoped>(ctx_data: ContextData<T>) -> AppResult<PipelineControl> {
  let (store, user_id, cart_item_id) =
    ctx_data.with(|d| (d.app_state().store.clone(), d.user_id(), d.cart_item_id()));
  let cart_item_id =
    cart_item_id.ok_or_else(|| AppError::Internal("ensure_item_owned needs a cart item id".to_string()))?;

  let owned = store
    .find_cart_item(cart_item_id)
    .await?
    .ok_or(AppError::NotFound("cart item"))?;
  if owned.owner_id != user_id {
    warn!(%user_id, %cart_item_id, "Cart item belongs to another user.");
    return Err(AppError::Unauthorized("This item is not in your cart".to_string()));
  }
  Ok(PipelineControl::Continue)
}
