// app/src/pipelines/cart_pipeline.rs

use crate::errors::AppError;
use crate::pipelines::common_steps;
use crate::pipelines::contexts::{AddToCartCtxData, ClearCartCtxData, ReduceCartItemCtxData, RemoveCartItemCtxData};
use crate::services::validation;
use cardshop_flow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{info, warn};

pub fn register_add_to_cart_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<AddToCartCtxData, AppError>::new(&[
    ("validate_quantity", false, None),
    ("ensure_product_exists", false, None),
    ("add_or_merge_item", false, None),
  ]);

  p.on_root("validate_quantity", |ctx_data: ContextData<AddToCartCtxData>| async move {
    validation::cart_quantity(ctx_data.with(|d| d.quantity))?;
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  p.on_root("ensure_product_exists", |ctx_data: ContextData<AddToCartCtxData>| async move {
    let (store, product_id) = ctx_data.with(|d| (d.app_state.store.clone(), d.product_id));
    if store.find_product(product_id).await?.is_none() {
      warn!(%product_id, "Add to cart for unknown product.");
      return Err(AppError::NotFound("product"));
    }
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  // Merges into an existing row for the same product; the total is
  // recomputed inside the same store transaction.
  p.on_root("add_or_merge_item", |ctx_data: ContextData<AddToCartCtxData>| async move {
    let (store, user_id, product_id, quantity) =
      ctx_data.with(|d| (d.app_state.store.clone(), d.user_id, d.product_id, d.quantity));

    let item = store.add_cart_item(user_id, product_id, quantity).await?;
    info!(%user_id, cart_item_id = %item.id, quantity = item.quantity, "Cart item added.");
    ctx_data.update(|d| d.cart_item = Some(item));
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  registry.register_pipeline(p);
  info!("Add-to-cart pipeline registered.");
}

pub fn register_reduce_cart_item_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<ReduceCartItemCtxData, AppError>::new(&[
    ("validate_amount", false, None),
    ("ensure_item_owned", false, None),
    ("reduce_quantity", false, None),
  ]);

  p.on_root("validate_amount", |ctx_data: ContextData<ReduceCartItemCtxData>| async move {
    validation::reduce_amount(ctx_data.with(|d| d.amount))?;
    Ok::<_, AppError>(PipelineControl::Continue)
  });
  p.on_root("ensure_item_owned", common_steps::ensure_item_owned::<ReduceCartItemCtxData>);

  p.on_root("reduce_quantity", |ctx_data: ContextData<ReduceCartItemCtxData>| async move {
    let (store, user_id, cart_item_id, amount) =
      ctx_data.with(|d| (d.app_state.store.clone(), d.user_id, d.cart_item_id, d.amount));

    let reduction = store.reduce_cart_item(user_id, cart_item_id, amount).await?;
    info!(%user_id, %cart_item_id, amount, outcome = ?reduction, "Cart item reduced.");
    ctx_data.update(|d| d.reduction = Some(reduction));
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  registry.register_pipeline(p);
  info!("Reduce-cart-item pipeline registered.");
}

pub fn register_remove_cart_item_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<RemoveCartItemCtxData, AppError>::new(&[
    ("ensure_item_owned", false, None),
    ("delete_item", false, None),
  ]);

  p.on_root("ensure_item_owned", common_steps::ensure_item_owned::<RemoveCartItemCtxData>);
  p.on_root("delete_item", |ctx_data: ContextData<RemoveCartItemCtxData>| async move {
    let (store, user_id, cart_item_id) = ctx_data.with(|d| (d.app_state.store.clone(), d.user_id, d.cart_item_id));
    store.delete_cart_item(user_id, cart_item_id).await?;
    info!(%user_id, %cart_item_id, "Cart item deleted.");
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  registry.register_pipeline(p);
  info!("Remove-cart-item pipeline registered.");
}

pub fn register_clear_cart_pipeline(registry: &Registry<AppError>) {
  let mut p = Pipeline::<ClearCartCtxData, AppError>::new(&[("clear_items", false, None)]);

  p.on_root("clear_items", |ctx_data: ContextData<ClearCartCtxData>| async move {
    let (store, user_id) = ctx_data.with(|d| (d.app_state.store.clone(), d.user_id));
    let removed = store.clear_cart(user_id).await?;
    info!(%user_id, removed, "Cart cleared.");
    ctx_data.update(|d| d.removed = Some(removed));
    Ok::<_, AppError>(PipelineControl::Continue)
  });

  registry.register_pipeline(p);
  info!("Clear-cart pipeline registered.");
}
