// app/src/pipelines/checkout_pipeline.rs

//! Pays for one cart item or the whole cart from the caller's card.
//!
//! The read-only steps fail fast with a precise error; `settle_payment`
//! re-checks everything under the card and cart locks before debiting.
//! Every step is wrapped by `rejecting`, so a run that fails anywhere ends
//! `Rejected` and one that passes `settle_payment` ends `Committed`.

use crate::errors::AppError;
use crate::models::{CheckoutState, PaymentScope};
use crate::pipelines::common_steps;
use crate::pipelines::contexts::CheckoutCtxData;
use cardshop_flow::{skip_when, ContextData, HandlerFuture, Pipeline, PipelineControl, Registry};
use std::future::Future;
use tracing::{event, info, instrument, warn, Level};

/// Wraps a checkout step so that its failure marks the attempt `Rejected`.
fn rejecting<F, Fut>(step: F) -> impl Fn(ContextData<CheckoutCtxData>) -> HandlerFuture<AppError> + Send + Sync + 'static
where
  F: Fn(ContextData<CheckoutCtxData>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<PipelineControl, AppError>> + Send + 'static,
{
  move |ctx_data: ContextData<CheckoutCtxData>| -> HandlerFuture<AppError> {
    let attempt = step(ctx_data.clone());
    Box::pin(async move {
      let result = attempt.await;
      if result.is_err() {
        ctx_data.update(|d| d.state = CheckoutState::Rejected);
      }
      result
    })
  }
}

pub fn register_checkout_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(&[
    ("resolve_payer", false, None),
    (
      "verify_item_ownership",
      false,
      skip_when(|d: &CheckoutCtxData| d.scope == PaymentScope::WholeCart),
    ),
    (
      "ensure_cart_not_empty",
      false,
      skip_when(|d: &CheckoutCtxData| matches!(d.scope, PaymentScope::SingleItem(_))),
    ),
    ("resolve_card", false, None),
    ("settle_payment", false, None),
  ]);

  p.on_root(
    "resolve_payer",
    rejecting(|ctx_data: ContextData<CheckoutCtxData>| async move {
      let (store, user_id) = ctx_data.with(|d| (d.app_state.store.clone(), d.user_id));
      store.find_user(user_id).await?.ok_or(AppError::NotFound("user"))?;
      Ok::<_, AppError>(PipelineControl::Continue)
    }),
  );

  p.on_root(
    "verify_item_ownership",
    rejecting(common_steps::ensure_item_owned::<CheckoutCtxData>),
  );

  p.on_root("ensure_cart_not_empty", rejecting(|ctx_data: ContextData<CheckoutCtxData>| async move {
    let (store, user_id) = ctx_data.with(|d| (d.app_state.store.clone(), d.user_id));
    if store.cart_view(user_id).await?.items.is_empty() {
      event!(Level::DEBUG, %user_id, "Checkout of an empty cart.");
      return Err(AppError::EmptyCart);
    }
    Ok::<_, AppError>(PipelineControl::Continue)
  }));

  p.on_root("resolve_card", rejecting(|ctx_data: ContextData<CheckoutCtxData>| async move {
    let (store, user_id) = ctx_data.with(|d| (d.app_state.store.clone(), d.user_id));
    let card = store.find_card_by_user(user_id).await?.ok_or(AppError::NotFound("card"))?;
    ctx_data.update(|d| d.card = Some(card));
    Ok::<_, AppError>(PipelineControl::Continue)
  }));

  p.on_root("settle_payment", rejecting(settle_payment));

  p.after_root("settle_payment", |ctx_data: ContextData<CheckoutCtxData>| async move {
    ctx_data.update(|d| d.state = CheckoutState::Committed);
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  registry.register_pipeline(p);
  info!("Checkout pipeline registered.");
}

#[instrument(name = "checkout::settle_payment", skip(ctx_data), err)]
async fn settle_payment(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl, AppError> {
  let (store, user_id, scope) = ctx_data.with(|d| (d.app_state.store.clone(), d.user_id, d.scope));

  match store.settle(user_id, scope).await {
    Ok(settlement) => {
      info!(
        %user_id,
        charged_cents = settlement.charged_cents,
        remaining_balance_cents = settlement.remaining_balance_cents,
        paid_items = settlement.paid_items.len(),
        "Checkout settled."
      );
      ctx_data.update(|d| d.settlement = Some(settlement));
      Ok(PipelineControl::Continue)
    }
    Err(e) => {
      warn!(%user_id, scope = ?scope, error = %e, "Checkout rejected.");
      Err(e)
    }
  }
}
