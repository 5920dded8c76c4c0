// app/src/web/routes.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::error;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::handlers::{
  auth_handlers, card_handlers, cart_handlers, checkout_handlers, product_handlers, user_handlers,
};

/// Reports ok only when the store answers.
async fn health_check_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  app_state.store.ping().await.map_err(|e| {
    error!(error = %e, "Health check failed.");
    e
  })?;
  Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .route("/health", web::get().to(health_check_handler))
    .service(
      web::scope("/users")
        .route("/sign_up", web::post().to(auth_handlers::sign_up_handler))
        .route("/sign_in", web::post().to(auth_handlers::sign_in_handler))
        .route("/change_password", web::put().to(user_handlers::change_user_password_handler))
        .route("/change_name", web::put().to(user_handlers::change_user_name_handler))
        .route("/delete_user", web::delete().to(user_handlers::delete_user_handler)),
    )
    .service(
      web::scope("/category")
        .route("/get_category", web::get().to(product_handlers::list_categories_handler))
        .route("/product/get_products", web::get().to(product_handlers::list_products_handler)),
    )
    .service(
      web::scope("/card")
        .route("/create", web::post().to(card_handlers::create_card_handler))
        .route("/add_balance", web::put().to(card_handlers::add_balance_handler))
        .route("/get_balance", web::get().to(card_handlers::get_balance_handler))
        .route("/get_info", web::get().to(card_handlers::get_card_info_handler))
        .route("/change_password", web::put().to(card_handlers::change_card_password_handler))
        .route("/delete_card", web::delete().to(card_handlers::delete_card_handler)),
    )
    .service(
      web::scope("/cart")
        .route("/add_product_to_cart", web::post().to(cart_handlers::add_to_cart_handler))
        .route("/get_info", web::get().to(cart_handlers::get_cart_handler))
        .route("/remove_one_item", web::put().to(cart_handlers::reduce_item_handler))
        .route("/delete_product", web::delete().to(cart_handlers::delete_item_handler))
        .route("/delete_all_items", web::delete().to(cart_handlers::delete_all_items_handler)),
    )
    .service(
      web::scope("/payment")
        .route("/pay_for_one_item", web::put().to(checkout_handlers::pay_for_one_item_handler))
        .route("/pay_for_all_items", web::put().to(checkout_handlers::pay_for_all_items_handler)),
    );
}
