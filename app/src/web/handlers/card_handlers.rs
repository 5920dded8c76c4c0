// app/src/web/handlers/card_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::{produced, run_flow};
use crate::errors::AppError;
use crate::pipelines::contexts::{ChangeCardPasswordCtxData, CreateCardCtxData, DeleteCardCtxData, DepositCtxData};
use crate::state::AppState;
use crate::web::AuthenticatedUser;
use cardshop_flow::ContextData;

#[derive(Deserialize)]
pub struct CreateCardRequestPayload {
  pub user_password: String,
  pub card_password: String,
  pub repeat_card_password: String,
}

#[derive(Deserialize)]
pub struct AddBalanceRequestPayload {
  /// In cents.
  pub amount: i64,
  pub card_password: String,
}

#[derive(Deserialize)]
pub struct ChangeCardPasswordRequestPayload {
  pub old_card_password: String,
  pub new_card_password: String,
  pub repeat_new_card_password: String,
}

#[derive(Deserialize)]
pub struct DeleteCardRequestPayload {
  pub card_password: String,
}

#[instrument(name = "handler::create_card", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn create_card_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateCardRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let ctx_data = ContextData::new(CreateCardCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    user_password: payload.user_password,
    card_password: payload.card_password,
    repeat_card_password: payload.repeat_card_password,
    card: None,
  });

  let ctx_data = run_flow(&app_state, ctx_data).await?;
  let card = produced(&ctx_data, "card", |d| d.card.clone())?;

  Ok(HttpResponse::Created().json(json!({
    "success": true,
    "message": "Card was created",
    "info": card,
  })))
}

#[instrument(
  name = "handler::add_balance",
  skip(app_state, payload, auth_user),
  fields(user_id = %auth_user.user_id, amount = payload.amount)
)]
pub async fn add_balance_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<AddBalanceRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let ctx_data = ContextData::new(DepositCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    card_password: payload.card_password,
    amount_cents: payload.amount,
    card: None,
    new_balance_cents: None,
  });

  let ctx_data = run_flow(&app_state, ctx_data).await?;
  let balance = produced(&ctx_data, "new balance", |d| d.new_balance_cents)?;

  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "message": "Balance was updated",
    "balance": balance,
  })))
}

#[instrument(name = "handler::get_balance", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_balance_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let card = app_state
    .store
    .find_card_by_user(auth_user.user_id)
    .await?
    .ok_or(AppError::NotFound("card"))?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "balance": card.balance_cents })))
}

#[instrument(name = "handler::get_card_info", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_card_info_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let card = app_state
    .store
    .find_card_by_user(auth_user.user_id)
    .await?
    .ok_or(AppError::NotFound("card"))?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "info": card })))
}

#[instrument(name = "handler::change_card_password", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn change_card_password_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<ChangeCardPasswordRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let ctx_data = ContextData::new(ChangeCardPasswordCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    old_card_password: payload.old_card_password,
    new_card_password: payload.new_card_password,
    repeat_new_card_password: payload.repeat_new_card_password,
    card: None,
  });

  run_flow(&app_state, ctx_data).await?;
  info!("Card password changed.");
  Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Password was changed" })))
}

#[instrument(name = "handler::delete_card", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn delete_card_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<DeleteCardRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let ctx_data = ContextData::new(DeleteCardCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    card_password: payload.into_inner().card_password,
    card: None,
  });

  run_flow(&app_state, ctx_data).await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Card was deleted" })))
}
