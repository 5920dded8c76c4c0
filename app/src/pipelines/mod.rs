// app/src/pipelines/mod.rs

//! Every state-changing operation runs as a pipeline over its own context
//! type; `register_all_pipelines` wires them into the registry once at startup.

use crate::errors::AppError;
use cardshop_flow::Registry;

pub mod common_steps;
pub mod contexts;

pub mod account_pipeline;
pub mod card_pipeline;
pub mod cart_pipeline;
pub mod checkout_pipeline;

pub fn register_all_pipelines(registry: &Registry<AppError>) {
  tracing::info!("Registering pipelines...");

  account_pipeline::register_signup_pipeline(registry);
  account_pipeline::register_signin_pipeline(registry);
  account_pipeline::register_change_user_password_pipeline(registry);
  account_pipeline::register_change_user_name_pipeline(registry);
  account_pipeline::register_delete_user_pipeline(registry);

  card_pipeline::register_create_card_pipeline(registry);
  card_pipeline::register_deposit_pipeline(registry);
  card_pipeline::register_change_card_password_pipeline(registry);
  card_pipeline::register_delete_card_pipeline(registry);

  cart_pipeline::register_add_to_cart_pipeline(registry);
  cart_pipeline::register_reduce_cart_item_pipeline(registry);
  cart_pipeline::register_remove_cart_item_pipeline(registry);
  cart_pipeline::register_clear_cart_pipeline(registry);

  checkout_pipeline::register_checkout_pipeline(registry);

  tracing::info!("All pipelines registered.");
}
