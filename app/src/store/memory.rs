// app/src/store/memory.rs

//! `Store` kept in process memory, used by the test suite and for
//! database-less runs (`STORE_BACKEND=memory`).
//!
//! All state sits behind one mutex. Each trait method takes the lock once,
//! checks every precondition, and only then mutates, so a failing call leaves
//! nothing behind. The lock is never held across an await point.

use crate::errors::{AppError, Result};
use crate::models::{
  Card, Cart, CartItem, CartLine, CartView, Category, ItemReduction, NewCard, NewUser, OwnedCartItem, PaymentScope,
  Product, Settlement, User,
};
use crate::store::{seed, Store};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Default)]
struct State {
  users: HashMap<Uuid, User>,
  user_by_email: HashMap<String, Uuid>,
  categories: Vec<Category>,
  products: HashMap<Uuid, Product>,
  cards: HashMap<Uuid, Card>,
  carts: HashMap<Uuid, Cart>,
  cart_by_user: HashMap<Uuid, Uuid>,
  items: HashMap<Uuid, CartItem>,
}

impl State {
  fn card_id_for_user(&self, user_id: Uuid) -> Option<Uuid> {
    self.cards.values().find(|c| c.user_id == user_id).map(|c| c.id)
  }

  fn ensure_cart(&mut self, user_id: Uuid) -> Result<Uuid> {
    if let Some(cart_id) = self.cart_by_user.get(&user_id) {
      return Ok(*cart_id);
    }
    if !self.users.contains_key(&user_id) {
      return Err(AppError::NotFound("user"));
    }
    let cart = Cart {
      id: Uuid::new_v4(),
      user_id,
      total_price_cents: 0,
    };
    let cart_id = cart.id;
    self.cart_by_user.insert(user_id, cart_id);
    self.carts.insert(cart_id, cart);
    Ok(cart_id)
  }

  fn line_for(&self, item: &CartItem) -> Option<CartLine> {
    let product = self.products.get(&item.product_id)?;
    Some(CartLine {
      cart_item_id: item.id,
      product_id: product.id,
      product_name: product.name.clone(),
      unit_price_cents: product.price_cents,
      quantity: item.quantity,
      subtotal_cents: product.price_cents * i64::from(item.quantity),
    })
  }

  fn lines(&self, cart_id: Uuid) -> Vec<CartLine> {
    let mut items: Vec<&CartItem> = self.items.values().filter(|i| i.cart_id == cart_id).collect();
    items.sort_by(|a, b| a.added_at.cmp(&b.added_at).then(a.id.cmp(&b.id)));
    items.into_iter().filter_map(|item| self.line_for(item)).collect()
  }

  fn recompute_total(&mut self, cart_id: Uuid) -> i64 {
    let total = self.lines(cart_id).iter().map(|l| l.subtotal_cents).sum();
    if let Some(cart) = self.carts.get_mut(&cart_id) {
      cart.total_price_cents = total;
    }
    total
  }

  fn owned_item(&self, user_id: Uuid, cart_item_id: Uuid) -> Result<(Uuid, CartItem)> {
    let item = self.items.get(&cart_item_id).ok_or(AppError::NotFound("cart item"))?;
    match self.cart_by_user.get(&user_id) {
      Some(cart_id) if *cart_id == item.cart_id => Ok((*cart_id, item.clone())),
      _ => Err(AppError::Unauthorized("cart item belongs to another user".to_string())),
    }
  }
}

#[derive(Default)]
pub struct MemoryStore {
  state: Mutex<State>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the existing category with this name or creates it.
  pub fn insert_category(&self, name: &str) -> Category {
    let mut state = self.state.lock();
    if let Some(existing) = state.categories.iter().find(|c| c.name == name) {
      return existing.clone();
    }
    let category = Category {
      id: Uuid::new_v4(),
      name: name.to_string(),
    };
    state.categories.push(category.clone());
    category
  }

  /// Returns the existing product with this name or creates it.
  pub fn insert_product(&self, name: &str, price_cents: i64, category_id: Uuid) -> Product {
    let mut state = self.state.lock();
    if let Some(existing) = state.products.values().find(|p| p.name == name) {
      return existing.clone();
    }
    let product = Product {
      id: Uuid::new_v4(),
      name: name.to_string(),
      price_cents,
      image_path: seed::image_path(name),
      category_id,
      created_at: Utc::now(),
    };
    state.products.insert(product.id, product.clone());
    product
  }

  /// Changes a product price. Cart totals pick it up on their next recompute.
  pub fn set_product_price(&self, product_id: Uuid, price_cents: i64) -> bool {
    match self.state.lock().products.get_mut(&product_id) {
      Some(product) => {
        product.price_cents = price_cents;
        true
      }
      None => false,
    }
  }

  /// The cached `total_price_cents` as last written, without recomputing.
  pub fn cached_cart_total(&self, user_id: Uuid) -> Option<i64> {
    let state = self.state.lock();
    let cart_id = state.cart_by_user.get(&user_id)?;
    state.carts.get(cart_id).map(|c| c.total_price_cents)
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn ping(&self) -> Result<()> {
    Ok(())
  }

  async fn insert_user(&self, new_user: NewUser) -> Result<User> {
    let mut state = self.state.lock();
    if state.user_by_email.contains_key(&new_user.email) {
      return Err(AppError::Conflict("This email is already registered".to_string()));
    }
    let user = User {
      id: Uuid::new_v4(),
      email: new_user.email,
      name: new_user.name,
      password_hash: new_user.password_hash,
      is_admin: false,
      created_at: Utc::now(),
    };
    state.user_by_email.insert(user.email.clone(), user.id);
    state.users.insert(user.id, user.clone());
    state.ensure_cart(user.id)?;
    Ok(user)
  }

  async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
    Ok(self.state.lock().users.get(&user_id).cloned())
  }

  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
    let state = self.state.lock();
    Ok(state.user_by_email.get(email).and_then(|id| state.users.get(id)).cloned())
  }

  async fn replace_user_password(&self, user_id: Uuid, expected_hash: &str, new_hash: &str) -> Result<bool> {
    let mut state = self.state.lock();
    match state.users.get_mut(&user_id) {
      Some(user) if user.password_hash == expected_hash => {
        user.password_hash = new_hash.to_string();
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn rename_user(&self, user_id: Uuid, expected_hash: &str, name: &str) -> Result<Option<User>> {
    let mut state = self.state.lock();
    match state.users.get_mut(&user_id) {
      Some(user) if user.password_hash == expected_hash => {
        user.name = name.to_string();
        Ok(Some(user.clone()))
      }
      _ => Ok(None),
    }
  }

  async fn delete_user(&self, user_id: Uuid, expected_hash: &str) -> Result<bool> {
    let mut state = self.state.lock();
    let matches = state
      .users
      .get(&user_id)
      .is_some_and(|user| user.password_hash == expected_hash);
    if !matches {
      return Ok(false);
    }

    if let Some(user) = state.users.remove(&user_id) {
      state.user_by_email.remove(&user.email);
    }
    state.cards.retain(|_, card| card.user_id != user_id);
    if let Some(cart_id) = state.cart_by_user.remove(&user_id) {
      state.carts.remove(&cart_id);
      state.items.retain(|_, item| item.cart_id != cart_id);
    }
    Ok(true)
  }

  async fn list_categories(&self) -> Result<Vec<Category>> {
    let mut categories = self.state.lock().categories.clone();
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(categories)
  }

  async fn list_products(&self) -> Result<Vec<Product>> {
    let mut products: Vec<Product> = self.state.lock().products.values().cloned().collect();
    products.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(products)
  }

  async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>> {
    Ok(self.state.lock().products.get(&product_id).cloned())
  }

  async fn insert_card(&self, new_card: NewCard) -> Result<Card> {
    let mut state = self.state.lock();
    if !state.users.contains_key(&new_card.user_id) {
      return Err(AppError::NotFound("user"));
    }
    if state.card_id_for_user(new_card.user_id).is_some() {
      return Err(AppError::Conflict("You already have a card".to_string()));
    }
    if state.cards.values().any(|c| c.number == new_card.number) {
      return Err(AppError::Internal("card number collision".to_string()));
    }
    let card = Card {
      id: Uuid::new_v4(),
      user_id: new_card.user_id,
      number: new_card.number,
      password_hash: new_card.password_hash,
      balance_cents: 0,
      created_at: Utc::now(),
    };
    state.cards.insert(card.id, card.clone());
    Ok(card)
  }

  async fn card_number_taken(&self, number: &str) -> Result<bool> {
    Ok(self.state.lock().cards.values().any(|c| c.number == number))
  }

  async fn find_card_by_user(&self, user_id: Uuid) -> Result<Option<Card>> {
    let state = self.state.lock();
    Ok(state.card_id_for_user(user_id).and_then(|id| state.cards.get(&id)).cloned())
  }

  async fn credit_card(&self, card_id: Uuid, expected_hash: &str, amount_cents: i64) -> Result<Option<i64>> {
    let mut state = self.state.lock();
    match state.cards.get_mut(&card_id) {
      Some(card) if card.password_hash == expected_hash => {
        card.balance_cents = card
          .balance_cents
          .checked_add(amount_cents)
          .ok_or_else(|| AppError::InvalidAmount("balance would overflow".to_string()))?;
        Ok(Some(card.balance_cents))
      }
      _ => Ok(None),
    }
  }

  async fn replace_card_password(&self, card_id: Uuid, expected_hash: &str, new_hash: &str) -> Result<bool> {
    let mut state = self.state.lock();
    match state.cards.get_mut(&card_id) {
      Some(card) if card.password_hash == expected_hash => {
        card.password_hash = new_hash.to_string();
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn delete_card(&self, card_id: Uuid, expected_hash: &str) -> Result<bool> {
    let mut state = self.state.lock();
    let matches = state
      .cards
      .get(&card_id)
      .is_some_and(|card| card.password_hash == expected_hash);
    if matches {
      state.cards.remove(&card_id);
    }
    Ok(matches)
  }

  async fn cart_for_user(&self, user_id: Uuid) -> Result<Cart> {
    let mut state = self.state.lock();
    let cart_id = state.ensure_cart(user_id)?;
    state.recompute_total(cart_id);
    state
      .carts
      .get(&cart_id)
      .cloned()
      .ok_or_else(|| AppError::Internal("cart vanished".to_string()))
  }

  async fn find_cart_item(&self, cart_item_id: Uuid) -> Result<Option<OwnedCartItem>> {
    let state = self.state.lock();
    Ok(state.items.get(&cart_item_id).and_then(|item| {
      state.carts.get(&item.cart_id).map(|cart| OwnedCartItem {
        item: item.clone(),
        owner_id: cart.user_id,
      })
    }))
  }

  async fn add_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartItem> {
    let mut state = self.state.lock();
    if !state.products.contains_key(&product_id) {
      return Err(AppError::NotFound("product"));
    }
    let cart_id = state.ensure_cart(user_id)?;

    let existing_id = state
      .items
      .values()
      .find(|i| i.cart_id == cart_id && i.product_id == product_id)
      .map(|i| i.id);
    let item = match existing_id.and_then(|id| state.items.get_mut(&id)) {
      Some(item) => {
        item.quantity = item
          .quantity
          .checked_add(quantity)
          .ok_or_else(|| AppError::Validation("quantity too large".to_string()))?;
        item.clone()
      }
      None => {
        let item = CartItem {
          id: Uuid::new_v4(),
          cart_id,
          product_id,
          quantity,
          added_at: Utc::now(),
        };
        state.items.insert(item.id, item.clone());
        item
      }
    };
    state.recompute_total(cart_id);
    Ok(item)
  }

  async fn reduce_cart_item(&self, user_id: Uuid, cart_item_id: Uuid, amount: i32) -> Result<ItemReduction> {
    let mut state = self.state.lock();
    let (cart_id, item) = state.owned_item(user_id, cart_item_id)?;

    let remaining = item.quantity.saturating_sub(amount);
    let outcome = if remaining <= 0 {
      state.items.remove(&cart_item_id);
      ItemReduction::Removed { cart_item_id }
    } else {
      let stored = state.items.get_mut(&cart_item_id).ok_or(AppError::NotFound("cart item"))?;
      stored.quantity = remaining;
      ItemReduction::Decreased { item: stored.clone() }
    };
    state.recompute_total(cart_id);
    Ok(outcome)
  }

  async fn delete_cart_item(&self, user_id: Uuid, cart_item_id: Uuid) -> Result<()> {
    let mut state = self.state.lock();
    let (cart_id, _) = state.owned_item(user_id, cart_item_id)?;
    state.items.remove(&cart_item_id);
    state.recompute_total(cart_id);
    Ok(())
  }

  async fn clear_cart(&self, user_id: Uuid) -> Result<u64> {
    let mut state = self.state.lock();
    let cart_id = state.ensure_cart(user_id)?;
    let before = state.items.len();
    state.items.retain(|_, item| item.cart_id != cart_id);
    let removed = (before - state.items.len()) as u64;
    state.recompute_total(cart_id);
    Ok(removed)
  }

  async fn cart_view(&self, user_id: Uuid) -> Result<CartView> {
    let mut state = self.state.lock();
    let cart_id = state.ensure_cart(user_id)?;
    state.recompute_total(cart_id);
    Ok(CartView::new(cart_id, state.lines(cart_id)))
  }

  async fn settle(&self, user_id: Uuid, scope: PaymentScope) -> Result<Settlement> {
    let mut state = self.state.lock();
    let card_id = state.card_id_for_user(user_id).ok_or(AppError::NotFound("card"))?;
    let cart_id = state.ensure_cart(user_id)?;

    let to_pay: Vec<CartLine> = match scope {
      PaymentScope::SingleItem(cart_item_id) => {
        let (_, item) = state.owned_item(user_id, cart_item_id)?;
        let line = state
          .line_for(&item)
          .ok_or_else(|| AppError::Internal("cart item without product".to_string()))?;
        vec![line]
      }
      PaymentScope::WholeCart => {
        let lines = state.lines(cart_id);
        if lines.is_empty() {
          return Err(AppError::EmptyCart);
        }
        lines
      }
    };
    let charged_cents: i64 = to_pay.iter().map(|l| l.subtotal_cents).sum();

    let card = state.cards.get_mut(&card_id).ok_or(AppError::NotFound("card"))?;
    if card.balance_cents < charged_cents {
      return Err(AppError::InsufficientFunds);
    }
    card.balance_cents -= charged_cents;
    let remaining_balance_cents = card.balance_cents;

    let paid_items: Vec<Uuid> = to_pay.iter().map(|l| l.cart_item_id).collect();
    for id in &paid_items {
      state.items.remove(id);
    }
    state.recompute_total(cart_id);

    Ok(Settlement {
      charged_cents,
      remaining_balance_cents,
      paid_items,
    })
  }
}
