// app/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{CheckoutState, PaymentScope};
use crate::pipelines::contexts::CheckoutCtxData;
use crate::state::AppState;
use crate::web::AuthenticatedUser;
use cardshop_flow::{ContextData, PipelineResult};

#[derive(Deserialize)]
pub struct PayItemRequestPayload {
  pub cart_item_id: Uuid,
}

#[instrument(
  name = "handler::pay_for_one_item",
  skip(app_state, payload, auth_user),
  fields(user_id = %auth_user.user_id, cart_item_id = %payload.cart_item_id)
)]
pub async fn pay_for_one_item_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<PayItemRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  checkout(&app_state, auth_user.user_id, PaymentScope::SingleItem(payload.cart_item_id)).await
}

#[instrument(name = "handler::pay_for_all_items", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn pay_for_all_items_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  checkout(&app_state, auth_user.user_id, PaymentScope::WholeCart).await
}

async fn checkout(app_state: &AppState, user_id: Uuid, scope: PaymentScope) -> Result<HttpResponse, AppError> {
  let ctx_data = ContextData::new(CheckoutCtxData::new(app_state.clone(), user_id, scope));

  match app_state.flows.run(ctx_data.clone()).await {
    Ok(PipelineResult::Completed) => {
      let (state, settlement) = ctx_data.with(|d| (d.state, d.settlement.clone()));
      let settlement = match (state, settlement) {
        (CheckoutState::Committed, Some(settlement)) => settlement,
        (state, _) => {
          warn!(?state, "Checkout completed without a committed settlement.");
          return Err(AppError::Internal("checkout finished in an inconsistent state".to_string()));
        }
      };
      info!(charged_cents = settlement.charged_cents, "Checkout committed.");

      Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Paid {} for the product", settlement.charged_cents),
        "state": CheckoutState::Committed,
        "receipt": settlement,
      })))
    }
    Ok(PipelineResult::Stopped) => {
      warn!("Checkout pipeline was stopped by a handler.");
      Err(AppError::Internal("checkout was halted".to_string()))
    }
    Err(app_err) => {
      info!(error = %app_err, "Checkout rejected; nothing was charged.");
      Err(app_err)
    }
  }
}
