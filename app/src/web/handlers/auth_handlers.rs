// app/src/web/handlers/auth_handlers.rs

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::{produced, run_flow};
use crate::errors::AppError;
use crate::pipelines::contexts::{SigninCtxData, SignupCtxData};
use crate::state::AppState;
use cardshop_flow::ContextData;

#[derive(Deserialize)]
pub struct SignupRequestPayload {
  pub email: String,
  pub name: String,
  pub password: String,
  pub repeat_password: String,
}

#[derive(Deserialize)]
pub struct SigninRequestPayload {
  pub email: String,
  pub password: String,
}

#[instrument(name = "handler::sign_up", skip(app_state, payload), fields(email = %payload.email))]
pub async fn sign_up_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<SignupRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let ctx_data = ContextData::new(SignupCtxData {
    app_state: app_state.get_ref().clone(),
    email: payload.email,
    name: payload.name,
    password: payload.password,
    repeat_password: payload.repeat_password,
    password_hash: None,
    created_user: None,
  });

  let ctx_data = run_flow(&app_state, ctx_data).await?;
  let user = produced(&ctx_data, "created user", |d| d.created_user.clone())?;
  info!(user_id = %user.id, "Sign-up complete.");

  Ok(HttpResponse::Created().json(json!({
    "success": true,
    "message": "User was added",
    "info": user,
  })))
}

#[instrument(name = "handler::sign_in", skip(app_state, payload), fields(email = %payload.email))]
pub async fn sign_in_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<SigninRequestPayload>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let ctx_data = ContextData::new(SigninCtxData {
    app_state: app_state.get_ref().clone(),
    email: payload.email,
    password: payload.password,
    user: None,
    session_token: None,
  });

  let ctx_data = run_flow(&app_state, ctx_data).await?;
  let token = produced(&ctx_data, "session token", |d| d.session_token.clone())?;

  let cookie = Cookie::build(app_state.sessions.cookie_name().to_string(), token.clone())
    .path("/")
    .http_only(true)
    .same_site(SameSite::Lax)
    .max_age(CookieDuration::seconds(app_state.sessions.ttl_secs()))
    .finish();

  Ok(HttpResponse::Ok().cookie(cookie).json(json!({
    "success": true,
    "message": "Login successful",
    "token": token,
  })))
}
