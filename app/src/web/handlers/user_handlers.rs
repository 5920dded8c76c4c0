// app/src/web/handlers/user_handlers.rs

use actix_web::cookie::Cookie;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{produced, run_flow};
use crate::errors::AppError;
use crate::pipelines::contexts::{ChangeUserNameCtxData, ChangeUserPasswordCtxData, DeleteUserCtxData};
use crate::state::AppState;
use crate::web::AuthenticatedUser;
use cardshop_flow::ContextData;

/// `?id=` naming the account to change. Only the caller's own id is accepted.
#[derive(Deserialize)]
pub struct AccountTarget {
  pub id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ChangeUserPasswordRequestPayload {
  pub old_password: String,
  pub new_password: String,
  pub repeat_new_password: String,
}

#[derive(Deserialize)]
pub struct ChangeUserNameRequestPayload {
  pub password: String,
  pub new_name: String,
}

#[derive(Deserialize)]
pub struct DeleteUserRequestPayload {
  pub password: String,
}

#[instrument(name = "handler::change_user_password", skip(app_state, target, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn change_user_password_handler(
  app_state: web::Data<AppState>,
  target: web::Query<AccountTarget>,
  payload: web::Json<ChangeUserPasswordRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let ctx_data = ContextData::new(ChangeUserPasswordCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    target_user_id: target.id,
    old_password: payload.old_password,
    new_password: payload.new_password,
    repeat_new_password: payload.repeat_new_password,
    user: None,
  });

  run_flow(&app_state, ctx_data).await?;
  Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Password was changed" })))
}

#[instrument(name = "handler::change_user_name", skip(app_state, target, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn change_user_name_handler(
  app_state: web::Data<AppState>,
  target: web::Query<AccountTarget>,
  payload: web::Json<ChangeUserNameRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let ctx_data = ContextData::new(ChangeUserNameCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    target_user_id: target.id,
    password: payload.password,
    new_name: payload.new_name,
    user: None,
    renamed_user: None,
  });

  let ctx_data = run_flow(&app_state, ctx_data).await?;
  let user = produced(&ctx_data, "renamed user", |d| d.renamed_user.clone())?;

  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "message": "Name was changed",
    "info": user,
  })))
}

/// Removes the account with its card and cart, and clears the session cookie.
#[instrument(name = "handler::delete_user", skip(app_state, target, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn delete_user_handler(
  app_state: web::Data<AppState>,
  target: web::Query<AccountTarget>,
  payload: web::Json<DeleteUserRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let ctx_data = ContextData::new(DeleteUserCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    target_user_id: target.id,
    password: payload.into_inner().password,
    user: None,
  });

  run_flow(&app_state, ctx_data).await?;
  info!("Account deleted.");

  let mut cookie = Cookie::build(app_state.sessions.cookie_name().to_string(), "")
    .path("/")
    .http_only(true)
    .finish();
  cookie.make_removal();

  Ok(HttpResponse::Ok().cookie(cookie).json(json!({
    "success": true,
    "message": "User was deleted",
  })))
}
