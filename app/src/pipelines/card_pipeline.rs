// app/src/pipelines/card_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::NewCard;
use crate::pipelines::common_steps::{self, card_update_missed};
use crate::pipelines::contexts::{ChangeCardPasswordCtxData, CreateCardCtxData, DeleteCardCtxData, DepositCtxData};
use crate::services::{card_numbers, validation};
use cardshop_flow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{error, info, instrument, warn};

/// Draws of a fresh card number before giving up.
const CARD_NUMBER_ATTEMPTS: usize = 5;

pub fn register_create_card_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<CreateCardCtxData, AppError>::new(&[
    ("validate_card_passwords", false, None),
    ("verify_login_password", false, None),
    ("ensure_no_existing_card", false, None),
    ("issue_card", false, None),
  ]);

  p.on_root("validate_card_passwords", |ctx_data: ContextData<CreateCardCtxData>| async move {
    ctx_data.with(|d| {
      validation::password("card_password", &d.card_password)?;
      validation::passwords_match(&d.card_password, &d.repeat_card_password)
    })?;
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.on_root("verify_login_password", |ctx_data: ContextData<CreateCardCtxData>| async move {
    let (store, credentials, user_id, user_password) = ctx_data.with(|d| {
      (
        d.app_state.store.clone(),
        d.app_state.credentials.clone(),
        d.user_id,
        d.user_password.clone(),
      )
    });

    let user = store.find_user(user_id).await?.ok_or(AppError::NotFound("user"))?;
    credentials.require_match(user.password_hash, user_password).await?;
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.on_root("ensure_no_existing_card", |ctx_data: ContextData<CreateCardCtxData>| async move {
    let (store, user_id) = ctx_data.with(|d| (d.app_state.store.clone(), d.user_id));
    if store.find_card_by_user(user_id).await?.is_some() {
      warn!(%user_id, "User already owns a card.");
      return Err(AppError::Conflict("You already have a card".to_string()));
    }
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.on_root("issue_card", issue_card);

  registry.register_pipeline(p);
  info!("Create-card pipeline registered.");
}

#[instrument(name = "card::issue_card", skip(ctx_data), err)]
async fn issue_card(ctx_data: ContextData<CreateCardCtxData>) -> AppResult<PipelineControl> {
  let (store, credentials, user_id, card_password) = ctx_data.with(|d| {
    (
      d.app_state.store.clone(),
      d.app_state.credentials.clone(),
      d.user_id,
      d.card_password.clone(),
    )
  });

  let mut number = None;
  for _ in 0..CARD_NUMBER_ATTEMPTS {
    let candidate = card_numbers::generate(&mut rand::thread_rng());
    if !store.card_number_taken(&candidate).await? {
      number = Some(candidate);
      break;
    }
  }
  let number = number.ok_or_else(|| {
    error!("No free card number after {} attempts.", CARD_NUMBER_ATTEMPTS);
    AppError::Internal("could not allocate a card number".to_string())
  })?;

  let password_hash = credentials.hash(card_password).await?;
  let card = store
    .insert_card(NewCard {
      user_id,
      number,
      password_hash,
    })
    .await?;
  info!(card_id = %card.id, %user_id, "Card issued.");
  ctx_data.update(|d| d.card = Some(card));
  Ok(PipelineControl::Continue)
}

pub fn register_deposit_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<DepositCtxData, AppError>::new(&[
    ("validate_amount", false, None),
    ("load_card", false, None),
    ("verify_card_password", false, None),
    ("credit_balance", false, None),
  ]);

  // Checked before the store is touched.
  p.on_root("validate_amount", |ctx_data: ContextData<DepositCtxData>| async move {
    validation::deposit_amount(ctx_data.with(|d| d.amount_cents))?;
    Ok::<_, AppError>(PipelineControl::Continue)
  });
  p.on_root("load_card", common_steps::load_card::<DepositCtxData>);
  p.on_root("verify_card_password", common_steps::verify_card_password::<DepositCtxData>);

  p.on_root("credit_balance", |ctx_data: ContextData<DepositCtxData>| async move {
    let (store, user_id, amount_cents, card) =
      ctx_data.with(|d| (d.app_state.store.clone(), d.user_id, d.amount_cents, d.card.clone()));
    let card = card.ok_or_else(|| AppError::Internal("credit_balance ran before load_card".to_string()))?;

    match store.credit_card(card.id, &card.password_hash, amount_cents).await? {
      Some(new_balance) => {
        info!(card_id = %card.id, amount_cents, new_balance, "Card credited.");
        ctx_data.update(|d| d.new_balance_cents = Some(new_balance));
        Ok::<_, AppError>(PipelineControl::Continue)
      }
      None => Err(card_update_missed(store.as_ref(), user_id).await),
    }
  });

  registry.register_pipeline(p);
  info!("Deposit pipeline registered.");
}

pub fn register_change_card_password_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<ChangeCardPasswordCtxData, AppError>::new(&[
    ("validate_new_password", false, None),
    ("load_card", false, None),
    ("verify_card_password", false, None),
    ("replace_password", false, None),
  ]);

  p.on_root("validate_new_password", |ctx_data: ContextData<ChangeCardPasswordCtxData>| async move {
    ctx_data.with(|d| {
      validation::password("new_card_password", &d.new_card_password)?;
      validation::passwords_match(&d.new_card_password, &d.repeat_new_card_password)
    })?;
    Ok::<_, AppError>(PipelineControl::Continue)
  });
  p.on_root("load_card", common_steps::load_card::<ChangeCardPasswordCtxData>);
  p.on_root(
    "verify_card_password",
    common_steps::verify_card_password::<ChangeCardPasswordCtxData>,
  );

  p.on_root("replace_password", |ctx_data: ContextData<ChangeCardPasswordCtxData>| async move {
    let (store, credentials, user_id, card, new_password) = ctx_data.with(|d| {
      (
        d.app_state.store.clone(),
        d.app_state.credentials.clone(),
        d.user_id,
        d.card.clone(),
        d.new_card_password.clone(),
      )
    });
    let card = card.ok_or_else(|| AppError::Internal("replace_password ran before load_card".to_string()))?;

    let new_hash = credentials.hash(new_password).await?;
    if store.replace_card_password(card.id, &card.password_hash, &new_hash).await? {
      info!(card_id = %card.id, "Card password changed.");
      Ok::<_, AppError>(PipelineControl::Continue)
    } else {
      Err(card_update_missed(store.as_ref(), user_id).await)
    }
  });

  registry.register_pipeline(p);
  info!("Change-card-password pipeline registered.");
}

pub fn register_delete_card_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<DeleteCardCtxData, AppError>::new(&[
    ("load_card", false, None),
    ("verify_card_password", false, None),
    ("delete_card", false, None),
  ]);

  p.on_root("load_card", common_steps::load_card::<DeleteCardCtxData>);
  p.on_root("verify_card_password", common_steps::verify_card_password::<DeleteCardCtxData>);

  p.on_root("delete_card", |ctx_data: ContextData<DeleteCardCtxData>| async move {
    let (store, user_id, card) = ctx_data.with(|d| (d.app_state.store.clone(), d.user_id, d.card.clone()));
    let card = card.ok_or_else(|| AppError::Internal("delete_card ran before load_card".to_string()))?;

    if store.delete_card(card.id, &card.password_hash).await? {
      info!(card_id = %card.id, %user_id, "Card deleted.");
      Ok::<_, AppError>(PipelineControl::Continue)
    } else {
      Err(card_update_missed(store.as_ref(), user_id).await)
    }
  });

  registry.register_pipeline(p);
  info!("Delete-card pipeline registered.");
}
