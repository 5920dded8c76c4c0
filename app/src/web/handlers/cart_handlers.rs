// app/src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{produced, run_flow};
use crate::errors::AppError;
use crate::pipelines::contexts::{AddToCartCtxData, ClearCartCtxData, ReduceCartItemCtxData, RemoveCartItemCtxData};
use crate::state::AppState;
use crate::web::AuthenticatedUser;
use cardshop_flow::ContextData;

#[derive(Deserialize)]
pub struct AddToCartRequestPayload {
  pub product_id: Uuid,
  pub quantity: i32,
}

#[derive(Deserialize)]
pub struct ReduceItemRequestPayload {
  pub cart_item_id: Uuid,
  pub amount: i32,
}

#[derive(Deserialize)]
pub struct CartItemRequestPayload {
  pub cart_item_id: Uuid,
}

#[instrument(
  name = "handler::add_to_cart",
  skip(app_state, payload, auth_user),
  fields(user_id = %auth_user.user_id, product_id = %payload.product_id, quantity = payload.quantity)
)]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<AddToCartRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let ctx_data = ContextData::new(AddToCartCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    product_id: payload.product_id,
    quantity: payload.quantity,
    cart_item: None,
  });

  let ctx_data = run_flow(&app_state, ctx_data).await?;
  let cart_item = produced(&ctx_data, "cart item", |d| d.cart_item.clone())?;

  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "message": "Product was added",
    "cart_item": cart_item,
  })))
}

/// Items are joined with the current product data and the total is
/// recomputed, so the response never shows a stale total.
#[instrument(name = "handler::get_cart", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let view = app_state.store.cart_view(auth_user.user_id).await?;
  info!(items = view.items.len(), total_price_cents = view.total_price_cents, "Cart read.");
  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "cart_id": view.cart_id,
    "items": view.items,
    "total_price": view.total_price_cents,
  })))
}

#[instrument(
  name = "handler::remove_one_item",
  skip(app_state, payload, auth_user),
  fields(user_id = %auth_user.user_id, cart_item_id = %payload.cart_item_id, amount = payload.amount)
)]
pub async fn reduce_item_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<ReduceItemRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let ctx_data = ContextData::new(ReduceCartItemCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    cart_item_id: payload.cart_item_id,
    amount: payload.amount,
    reduction: None,
  });

  let ctx_data = run_flow(&app_state, ctx_data).await?;
  let reduction = produced(&ctx_data, "item reduction", |d| d.reduction.clone())?;

  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "message": "Product quantity decreased",
    "result": reduction,
  })))
}

#[instrument(
  name = "handler::delete_product",
  skip(app_state, payload, auth_user),
  fields(user_id = %auth_user.user_id, cart_item_id = %payload.cart_item_id)
)]
pub async fn delete_item_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CartItemRequestPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let ctx_data = ContextData::new(RemoveCartItemCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    cart_item_id: payload.cart_item_id,
  });

  run_flow(&app_state, ctx_data).await?;
  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "message": "Product was deleted from your cart",
  })))
}

#[instrument(name = "handler::delete_all_items", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn delete_all_items_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let ctx_data = ContextData::new(ClearCartCtxData {
    app_state: app_state.get_ref().clone(),
    user_id: auth_user.user_id,
    removed: None,
  });

  let ctx_data = run_flow(&app_state, ctx_data).await?;
  let removed = produced(&ctx_data, "removed count", |d| d.removed)?;

  Ok(HttpResponse::Ok().json(json!({
    "success": true,
    "message": "All products was deleted",
    "removed": removed,
  })))
}
