// tests/pg_store_tests.rs
//! Runs `PgStore` against a real server. Set `TEST_DATABASE_URL` to a role
//! that may create databases; each test gets its own throwaway database.
//! Without it the tests report `SKIP-TEST-CLUSTER` and pass.
mod common;

use cardshop::errors::AppError;
use cardshop::models::{Card, ItemReduction, NewCard, NewUser, PaymentScope, Product, User};
use cardshop::services::card_numbers;
use cardshop::store::{PgStore, Store};
use common::setup_tracing;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, PgConnection};
use std::str::FromStr;
use uuid::Uuid;

const CARD_HASH: &str = "card-hash";
const USER_HASH: &str = "user-hash";

struct TestDb {
  admin_url: String,
  name: String,
  store: PgStore,
}

impl TestDb {
  async fn create() -> Option<Self> {
    setup_tracing();
    let Ok(admin_url) = std::env::var("TEST_DATABASE_URL") else {
      eprintln!("SKIP-TEST-CLUSTER: TEST_DATABASE_URL is not set");
      return None;
    };

    let name = format!("cardshop_test_{}", Uuid::new_v4().simple());
    let mut admin = PgConnection::connect(&admin_url).await.expect("connect to TEST_DATABASE_URL");
    sqlx::query(&format!("CREATE DATABASE \"{}\"", name))
      .execute(&mut admin)
      .await
      .expect("create test database");
    admin.close().await.ok();

    let options = PgConnectOptions::from_str(&admin_url)
      .expect("TEST_DATABASE_URL must be a postgres url")
      .database(&name);
    let pool = PgPoolOptions::new()
      .max_connections(20)
      .connect_with(options)
      .await
      .expect("connect to test database");
    let store = PgStore::new(pool);
    store.migrate().await.expect("migrations");
    Some(Self { admin_url, name, store })
  }

  async fn finish(self) {
    self.store.pool().close().await;
    let mut admin = PgConnection::connect(&self.admin_url).await.expect("reconnect for cleanup");
    sqlx::query(&format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", self.name))
      .execute(&mut admin)
      .await
      .expect("drop test database");
  }

  async fn user(&self, email: &str) -> User {
    self
      .store
      .insert_user(NewUser {
        email: email.to_string(),
        name: "Pg User".to_string(),
        password_hash: USER_HASH.to_string(),
      })
      .await
      .unwrap()
  }

  async fn card(&self, user_id: Uuid, balance_cents: i64) -> Card {
    let card = self
      .store
      .insert_card(NewCard {
        user_id,
        number: card_numbers::generate(&mut rand::thread_rng()),
        password_hash: CARD_HASH.to_string(),
      })
      .await
      .unwrap();
    if balance_cents > 0 {
      self.store.credit_card(card.id, CARD_HASH, balance_cents).await.unwrap().unwrap();
    }
    self.store.find_card_by_user(user_id).await.unwrap().unwrap()
  }

  async fn product(&self, name: &str, price_cents: i64) -> Product {
    let category_id = Uuid::new_v4();
    sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2)")
      .bind(category_id)
      .bind(format!("{} category", name))
      .execute(self.store.pool())
      .await
      .unwrap();
    let product_id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, name, price_cents, image_path, category_id) VALUES ($1, $2, $3, $4, $5)")
      .bind(product_id)
      .bind(name)
      .bind(price_cents)
      .bind(format!("/images/{}.png", name))
      .bind(category_id)
      .execute(self.store.pool())
      .await
      .unwrap();
    self.store.find_product(product_id).await.unwrap().unwrap()
  }

  async fn balance(&self, user_id: Uuid) -> i64 {
    self.store.find_card_by_user(user_id).await.unwrap().unwrap().balance_cents
  }

  async fn count(&self, table: &str, user_id: Uuid) -> i64 {
    let sql = match table {
      "cart_items" => "SELECT COUNT(*) FROM cart_items ci JOIN carts c ON c.id = ci.cart_id WHERE c.user_id = $1",
      "cards" => "SELECT COUNT(*) FROM cards WHERE user_id = $1",
      "carts" => "SELECT COUNT(*) FROM carts WHERE user_id = $1",
      other => panic!("no count query for {}", other),
    };
    sqlx::query_scalar::<_, i64>(sql)
      .bind(user_id)
      .fetch_one(self.store.pool())
      .await
      .unwrap()
  }

  async fn stored_total(&self, user_id: Uuid) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT total_price_cents FROM carts WHERE user_id = $1")
      .bind(user_id)
      .fetch_one(self.store.pool())
      .await
      .unwrap()
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deposits_all_land() {
  let Some(db) = TestDb::create().await else { return };
  let user = db.user("deposits@example.com").await;
  let card_id = db.card(user.id, 0).await.id;

  let tasks: Vec<_> = (0..16)
    .map(|_| {
      let store = db.store.clone();
      tokio::spawn(async move { store.credit_card(card_id, CARD_HASH, 125).await })
    })
    .collect();
  for task in tasks {
    assert!(task.await.unwrap().unwrap().is_some());
  }

  assert_eq!(db.balance(user.id).await, 16 * 125);
  db.finish().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deposit_racing_settle_loses_nothing() {
  let Some(db) = TestDb::create().await else { return };
  let user = db.user("race@example.com").await;
  let card_id = db.card(user.id, 2_000).await.id;
  let product = db.product("Race Widget", 150).await;

  let mut charged = 0;
  for _ in 0..5 {
    db.store.add_cart_item(user.id, product.id, 2).await.unwrap();

    let depositing = {
      let store = db.store.clone();
      tokio::spawn(async move { store.credit_card(card_id, CARD_HASH, 40).await })
    };
    let settling = {
      let store = db.store.clone();
      let user_id = user.id;
      tokio::spawn(async move { store.settle(user_id, PaymentScope::WholeCart).await })
    };

    assert!(depositing.await.unwrap().unwrap().is_some());
    charged += settling.await.unwrap().unwrap().charged_cents;
  }

  assert_eq!(charged, 5 * 300);
  assert_eq!(db.balance(user.id).await, 2_000 + 5 * 40 - 5 * 300);
  assert_eq!(db.count("cart_items", user.id).await, 0);
  assert_eq!(db.stored_total(user.id).await, 0);
  db.finish().await;
}

#[tokio::test]
async fn insufficient_funds_leave_every_row_alone() {
  let Some(db) = TestDb::create().await else { return };
  let user = db.user("short@example.com").await;
  db.card(user.id, 100).await;
  let product = db.product("Dear Widget", 30).await;
  let item = db.store.add_cart_item(user.id, product.id, 4).await.unwrap();

  let err = db.store.settle(user.id, PaymentScope::WholeCart).await.unwrap_err();
  assert!(matches!(err, AppError::InsufficientFunds));
  let err = db.store.settle(user.id, PaymentScope::SingleItem(item.id)).await.unwrap_err();
  assert!(matches!(err, AppError::InsufficientFunds));

  assert_eq!(db.balance(user.id).await, 100);
  assert_eq!(db.count("cart_items", user.id).await, 1);
  assert_eq!(db.stored_total(user.id).await, 120);
  assert_eq!(db.store.find_cart_item(item.id).await.unwrap().unwrap().item.quantity, 4);
  db.finish().await;
}

#[tokio::test]
async fn paying_one_item_keeps_the_rest() {
  let Some(db) = TestDb::create().await else { return };
  let user = db.user("single@example.com").await;
  db.card(user.id, 100).await;
  let pen = db.product("Single Pen", 30).await;
  let mug = db.product("Single Mug", 25).await;
  let pens = db.store.add_cart_item(user.id, pen.id, 2).await.unwrap();
  db.store.add_cart_item(user.id, mug.id, 1).await.unwrap();

  let settlement = db.store.settle(user.id, PaymentScope::SingleItem(pens.id)).await.unwrap();
  assert_eq!(settlement.charged_cents, 60);
  assert_eq!(settlement.remaining_balance_cents, 40);
  assert_eq!(settlement.paid_items, vec![pens.id]);
  assert_eq!(db.stored_total(user.id).await, 25);
  assert_eq!(db.count("cart_items", user.id).await, 1);
  db.finish().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn adding_the_same_product_merges_into_one_row() {
  let Some(db) = TestDb::create().await else { return };
  let user = db.user("merge@example.com").await;
  let product = db.product("Merge Widget", 20).await;

  let first = db.store.add_cart_item(user.id, product.id, 2).await.unwrap();
  let second = db.store.add_cart_item(user.id, product.id, 3).await.unwrap();
  assert_eq!(first.id, second.id);
  assert_eq!(second.quantity, 5);

  let tasks: Vec<_> = (0..10)
    .map(|_| {
      let store = db.store.clone();
      let (user_id, product_id) = (user.id, product.id);
      tokio::spawn(async move { store.add_cart_item(user_id, product_id, 1).await })
    })
    .collect();
  for task in tasks {
    assert_eq!(task.await.unwrap().unwrap().id, first.id);
  }

  assert_eq!(db.count("cart_items", user.id).await, 1);
  assert_eq!(db.store.find_cart_item(first.id).await.unwrap().unwrap().item.quantity, 15);
  assert_eq!(db.stored_total(user.id).await, 15 * 20);
  db.finish().await;
}

#[tokio::test]
async fn another_users_item_is_out_of_reach() {
  let Some(db) = TestDb::create().await else { return };
  let owner = db.user("owner@example.com").await;
  let intruder = db.user("intruder@example.com").await;
  db.card(intruder.id, 10_000).await;
  let product = db.product("Owned Widget", 50).await;
  let item = db.store.add_cart_item(owner.id, product.id, 3).await.unwrap();

  let err = db.store.reduce_cart_item(intruder.id, item.id, 1).await.unwrap_err();
  assert!(matches!(err, AppError::Unauthorized(_)));
  let err = db.store.delete_cart_item(intruder.id, item.id).await.unwrap_err();
  assert!(matches!(err, AppError::Unauthorized(_)));
  let err = db.store.settle(intruder.id, PaymentScope::SingleItem(item.id)).await.unwrap_err();
  assert!(matches!(err, AppError::Unauthorized(_)));

  let untouched = db.store.find_cart_item(item.id).await.unwrap().unwrap();
  assert_eq!(untouched.owner_id, owner.id);
  assert_eq!(untouched.item.quantity, 3);
  assert_eq!(db.stored_total(owner.id).await, 150);
  assert_eq!(db.balance(intruder.id).await, 10_000);

  match db.store.reduce_cart_item(owner.id, item.id, 1).await.unwrap() {
    ItemReduction::Decreased { item } => assert_eq!(item.quantity, 2),
    other => panic!("expected a decrease, got {:?}", other),
  }
  db.finish().await;
}

#[tokio::test]
async fn stale_card_hash_misses_every_write() {
  let Some(db) = TestDb::create().await else { return };
  let user = db.user("stale@example.com").await;
  let card = db.card(user.id, 500).await;

  assert!(db.store.replace_card_password(card.id, CARD_HASH, "rotated").await.unwrap());
  assert_eq!(db.store.credit_card(card.id, CARD_HASH, 10).await.unwrap(), None);
  assert!(!db.store.replace_card_password(card.id, CARD_HASH, "again").await.unwrap());
  assert!(!db.store.delete_card(card.id, CARD_HASH).await.unwrap());
  assert_eq!(db.balance(user.id).await, 500);

  assert!(db.store.delete_card(card.id, "rotated").await.unwrap());
  assert!(!db.store.card_number_taken(&card.number).await.unwrap());
  db.finish().await;
}

#[tokio::test]
async fn deleting_a_user_cascades_to_card_and_cart() {
  let Some(db) = TestDb::create().await else { return };
  let user = db.user("cascade@example.com").await;
  let bystander = db.user("bystander@example.com").await;
  db.card(user.id, 300).await;
  db.card(bystander.id, 300).await;
  let product = db.product("Cascade Widget", 10).await;
  let item = db.store.add_cart_item(user.id, product.id, 2).await.unwrap();
  db.store.add_cart_item(bystander.id, product.id, 1).await.unwrap();

  assert!(!db.store.delete_user(user.id, "stale").await.unwrap());
  assert!(db.store.delete_user(user.id, USER_HASH).await.unwrap());

  assert!(db.store.find_user(user.id).await.unwrap().is_none());
  assert_eq!(db.count("cards", user.id).await, 0);
  assert_eq!(db.count("carts", user.id).await, 0);
  assert_eq!(db.count("cart_items", user.id).await, 0);
  assert!(db.store.find_cart_item(item.id).await.unwrap().is_none());

  assert_eq!(db.count("cards", bystander.id).await, 1);
  assert_eq!(db.count("cart_items", bystander.id).await, 1);

  let err = db.store.add_cart_item(user.id, product.id, 1).await.unwrap_err();
  assert!(matches!(err, AppError::NotFound("user")));
  db.finish().await;
}

#[tokio::test]
async fn account_writes_compare_the_password_hash() {
  let Some(db) = TestDb::create().await else { return };
  let user = db.user("account@example.com").await;

  assert!(db.store.rename_user(user.id, "stale", "Nope").await.unwrap().is_none());
  let renamed = db.store.rename_user(user.id, USER_HASH, "Renamed").await.unwrap().unwrap();
  assert_eq!(renamed.name, "Renamed");

  assert!(db.store.replace_user_password(user.id, USER_HASH, "next-hash").await.unwrap());
  assert!(!db.store.replace_user_password(user.id, USER_HASH, "other").await.unwrap());
  let stored = db.store.find_user(user.id).await.unwrap().unwrap();
  assert_eq!(stored.password_hash, "next-hash");
  db.finish().await;
}
