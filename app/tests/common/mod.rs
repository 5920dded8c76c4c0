// tests/common/mod.rs
#![allow(dead_code)]

use actix_web::cookie::Cookie;
use cardshop::config::AppConfig;
use cardshop::models::{Card, NewCard, NewUser, Product, User};
use cardshop::services::card_numbers;
use cardshop::state::AppState;
use cardshop::store::{MemoryStore, Store};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

pub const USER_PASSWORD: &str = "Passw0rd#x";
pub const CARD_PASSWORD: &str = "Card#pass1";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

/// Memory-backed config with cheap argon2 parameters.
pub fn test_config() -> AppConfig {
  let vars: HashMap<String, String> = [
    ("STORE_BACKEND", "memory"),
    ("SESSION_SECRET", "test-secret-test-secret-test-secret!"),
    ("ARGON2_MEMORY_KIB", "64"),
    ("ARGON2_ITERATIONS", "1"),
  ]
  .into_iter()
  .map(|(k, v)| (k.to_string(), v.to_string()))
  .collect();
  AppConfig::from_map(&vars).expect("test config must be valid")
}

pub struct TestEnv {
  pub state: AppState,
  pub memory: Arc<MemoryStore>,
}

pub fn test_env() -> TestEnv {
  setup_tracing();
  let memory = Arc::new(MemoryStore::new());
  let store: Arc<dyn Store> = memory.clone();
  let state = AppState::new(&test_config(), store).expect("app state");
  TestEnv { state, memory }
}

impl TestEnv {
  /// Registers a user straight through the store, bypassing sign-up.
  pub async fn user(&self, email: &str) -> User {
    let password_hash = self.state.credentials.hash(USER_PASSWORD.to_string()).await.unwrap();
    self
      .state
      .store
      .insert_user(NewUser {
        email: email.to_string(),
        name: "Test User".to_string(),
        password_hash,
      })
      .await
      .unwrap()
  }

  pub fn session_cookie(&self, user_id: Uuid) -> Cookie<'static> {
    Cookie::new(
      self.state.sessions.cookie_name().to_string(),
      self.state.sessions.issue(user_id).unwrap(),
    )
  }

  /// Gives `user_id` a card protected by `CARD_PASSWORD` holding `balance_cents`.
  pub async fn card(&self, user_id: Uuid, balance_cents: i64) -> Card {
    let password_hash = self.state.credentials.hash(CARD_PASSWORD.to_string()).await.unwrap();
    let number = card_numbers::generate(&mut rand::thread_rng());
    let card = self
      .state
      .store
      .insert_card(NewCard {
        user_id,
        number,
        password_hash,
      })
      .await
      .unwrap();
    if balance_cents > 0 {
      self
        .state
        .store
        .credit_card(card.id, &card.password_hash, balance_cents)
        .await
        .unwrap()
        .unwrap();
    }
    self.state.store.find_card_by_user(user_id).await.unwrap().unwrap()
  }

  pub fn product(&self, name: &str, price_cents: i64) -> Product {
    let category = self.memory.insert_category("Test");
    self.memory.insert_product(name, price_cents, category.id)
  }

  pub async fn balance(&self, user_id: Uuid) -> i64 {
    self.state.store.find_card_by_user(user_id).await.unwrap().unwrap().balance_cents
  }

  /// Asserts the cart total equals the sum of price x quantity over its rows.
  pub async fn assert_total_consistent(&self, user_id: Uuid) {
    let cached = self.memory.cached_cart_total(user_id);
    let view = self.state.store.cart_view(user_id).await.unwrap();
    let expected: i64 = view
      .items
      .iter()
      .map(|l| l.unit_price_cents * i64::from(l.quantity))
      .sum();
    assert_eq!(view.total_price_cents, expected);
    assert_eq!(cached, Some(expected));
  }
}
