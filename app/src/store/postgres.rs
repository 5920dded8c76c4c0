// app/src/store/postgres.rs

//! `Store` backed by Postgres through sqlx.
//!
//! Lock order: a checkout locks the card row, then the cart row. Cart
//! operations lock only the cart row and change items while holding it. No
//! operation locks a cart and then a card, so the two can't deadlock.

use crate::errors::{AppError, Result};
use crate::models::{
  Card, Cart, CartItem, CartLine, CartView, Category, ItemReduction, NewCard, NewUser, OwnedCartItem, PaymentScope,
  Product, Settlement, User,
};
use crate::store::seed::{image_path, CATALOG};
use crate::store::Store;
use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::PgPool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, name, password_hash, is_admin, created_at";
const CARD_COLUMNS: &str = "id, user_id, number, password_hash, balance_cents, created_at";
const PRODUCT_COLUMNS: &str = "id, name, price_cents, image_path, category_id, created_at";
const ITEM_COLUMNS: &str = "id, cart_id, product_id, quantity, added_at";

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(max_connections)
      .connect(database_url)
      .await?;
    info!(max_connections, "Connected to the database.");
    Ok(Self::new(pool))
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  /// Applies the embedded migrations under `app/migrations`.
  pub async fn migrate(&self) -> Result<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| AppError::Internal(format!("Database migration failed: {}", e)))?;
    info!("Database migrations applied.");
    Ok(())
  }

  /// Inserts the demo catalog; rows that already exist are left alone.
  pub async fn seed_catalog(&self) -> Result<usize> {
    let mut tx = self.pool.begin().await?;
    let mut inserted = 0;
    for (category_name, products) in CATALOG {
      sqlx::query("INSERT INTO categories (id, name) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
        .bind(Uuid::new_v4())
        .bind(*category_name)
        .execute(&mut *tx)
        .await?;
      let category_id: Uuid = sqlx::query_scalar("SELECT id FROM categories WHERE name = $1")
        .bind(*category_name)
        .fetch_one(&mut *tx)
        .await?;
      for (product_name, price_cents) in products.iter() {
        let result = sqlx::query(
          "INSERT INTO products (id, name, price_cents, image_path, category_id) VALUES ($1, $2, $3, $4, $5) \
           ON CONFLICT (name) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(*product_name)
        .bind(*price_cents)
        .bind(image_path(product_name))
        .bind(category_id)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected() as usize;
      }
    }
    tx.commit().await?;
    info!(inserted, "Catalog seed applied.");
    Ok(inserted)
  }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
  matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

/// Name of the violated unique constraint, if that is what `err` is.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
  match err {
    sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
      Some(db_err.constraint().unwrap_or_default().to_string())
    }
    _ => None,
  }
}

/// Fetches (or creates) the user's cart and locks its row for the transaction.
async fn lock_cart(conn: &mut PgConnection, user_id: Uuid) -> Result<Cart> {
  sqlx::query("INSERT INTO carts (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
    .bind(Uuid::new_v4())
    .bind(user_id)
    .execute(&mut *conn)
    .await
    .map_err(|err| {
      if is_foreign_key_violation(&err) {
        AppError::NotFound("user")
      } else {
        AppError::Database(err)
      }
    })?;

  let cart = sqlx::query_as::<_, Cart>("SELECT id, user_id, total_price_cents FROM carts WHERE user_id = $1 FOR UPDATE")
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
  Ok(cart)
}

/// Item of the locked cart. The cart row lock guards its items.
async fn item_in_cart(conn: &mut PgConnection, cart: &Cart, cart_item_id: Uuid) -> Result<CartItem> {
  let item = sqlx::query_as::<_, CartItem>(&format!("SELECT {} FROM cart_items WHERE id = $1", ITEM_COLUMNS))
    .bind(cart_item_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("cart item"))?;
  if item.cart_id != cart.id {
    return Err(AppError::Unauthorized("cart item belongs to another user".to_string()));
  }
  Ok(item)
}

const LINE_SELECT: &str = "SELECT ci.id AS cart_item_id, p.id AS product_id, p.name AS product_name, \
   p.price_cents AS unit_price_cents, ci.quantity, (p.price_cents * ci.quantity) AS subtotal_cents \
   FROM cart_items ci JOIN products p ON p.id = ci.product_id";

async fn cart_lines(conn: &mut PgConnection, cart_id: Uuid) -> Result<Vec<CartLine>> {
  let lines = sqlx::query_as::<_, CartLine>(&format!("{} WHERE ci.cart_id = $1 ORDER BY ci.added_at, ci.id", LINE_SELECT))
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;
  Ok(lines)
}

async fn item_line(conn: &mut PgConnection, cart_item_id: Uuid) -> Result<CartLine> {
  let line = sqlx::query_as::<_, CartLine>(&format!("{} WHERE ci.id = $1", LINE_SELECT))
    .bind(cart_item_id)
    .fetch_one(&mut *conn)
    .await?;
  Ok(line)
}

/// Rewrites the cached cart total from the live items and prices.
async fn recompute_total(conn: &mut PgConnection, cart_id: Uuid) -> Result<i64> {
  let total = sqlx::query_scalar::<_, i64>(
    "UPDATE carts SET total_price_cents = COALESCE(( \
       SELECT SUM(p.price_cents * ci.quantity) FROM cart_items ci \
       JOIN products p ON p.id = ci.product_id WHERE ci.cart_id = $1), 0)::BIGINT \
     WHERE id = $1 RETURNING total_price_cents",
  )
  .bind(cart_id)
  .fetch_one(&mut *conn)
  .await?;
  Ok(total)
}

#[async_trait]
impl Store for PgStore {
  async fn ping(&self) -> Result<()> {
    sqlx::query("SELECT 1").execute(&self.pool).await?;
    Ok(())
  }

  #[instrument(name = "PgStore::insert_user", skip_all)]
  async fn insert_user(&self, new_user: NewUser) -> Result<User> {
    let mut tx = self.pool.begin().await?;
    let user = sqlx::query_as::<_, User>(&format!(
      "INSERT INTO users (id, email, name, password_hash) VALUES ($1, $2, $3, $4) RETURNING {}",
      USER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(&new_user.email)
    .bind(&new_user.name)
    .bind(&new_user.password_hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(|err| match unique_violation(&err) {
      Some(_) => AppError::Conflict("This email is already registered".to_string()),
      None => AppError::Database(err),
    })?;

    lock_cart(&mut tx, user.id).await?;
    tx.commit().await?;
    Ok(user)
  }

  async fn find_user(&self, user_id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(user)
  }

  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
      .bind(email)
      .fetch_optional(&self.pool)
      .await?;
    Ok(user)
  }

  async fn replace_user_password(&self, user_id: Uuid, expected_hash: &str, new_hash: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE users SET password_hash = $3 WHERE id = $1 AND password_hash = $2")
      .bind(user_id)
      .bind(expected_hash)
      .bind(new_hash)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn rename_user(&self, user_id: Uuid, expected_hash: &str, name: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
      "UPDATE users SET name = $3 WHERE id = $1 AND password_hash = $2 RETURNING {}",
      USER_COLUMNS
    ))
    .bind(user_id)
    .bind(expected_hash)
    .bind(name)
    .fetch_optional(&self.pool)
    .await?;
    Ok(user)
  }

  /// Cards, carts and cart items go through `ON DELETE CASCADE`.
  #[instrument(name = "PgStore::delete_user", skip(self, expected_hash))]
  async fn delete_user(&self, user_id: Uuid, expected_hash: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1 AND password_hash = $2")
      .bind(user_id)
      .bind(expected_hash)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn list_categories(&self) -> Result<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
      .fetch_all(&self.pool)
      .await?;
    Ok(categories)
  }

  async fn list_products(&self) -> Result<Vec<Product>> {
    let products = sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products ORDER BY name", PRODUCT_COLUMNS))
      .fetch_all(&self.pool)
      .await?;
    Ok(products)
  }

  async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(product)
  }

  #[instrument(name = "PgStore::insert_card", skip_all, fields(user_id = %new_card.user_id))]
  async fn insert_card(&self, new_card: NewCard) -> Result<Card> {
    sqlx::query_as::<_, Card>(&format!(
      "INSERT INTO cards (id, user_id, number, password_hash) VALUES ($1, $2, $3, $4) RETURNING {}",
      CARD_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(new_card.user_id)
    .bind(&new_card.number)
    .bind(&new_card.password_hash)
    .fetch_one(&self.pool)
    .await
    .map_err(|err| match unique_violation(&err).as_deref() {
      Some("cards_user_id_key") => AppError::Conflict("You already have a card".to_string()),
      Some(constraint) => {
        warn!(constraint, "Card insert hit a unique constraint.");
        AppError::Internal("card number collision".to_string())
      }
      None if is_foreign_key_violation(&err) => AppError::NotFound("user"),
      None => AppError::Database(err),
    })
  }

  async fn card_number_taken(&self, number: &str) -> Result<bool> {
    let taken = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM cards WHERE number = $1)")
      .bind(number)
      .fetch_one(&self.pool)
      .await?;
    Ok(taken)
  }

  async fn find_card_by_user(&self, user_id: Uuid) -> Result<Option<Card>> {
    let card = sqlx::query_as::<_, Card>(&format!("SELECT {} FROM cards WHERE user_id = $1", CARD_COLUMNS))
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(card)
  }

  #[instrument(name = "PgStore::credit_card", skip(self, expected_hash))]
  async fn credit_card(&self, card_id: Uuid, expected_hash: &str, amount_cents: i64) -> Result<Option<i64>> {
    let balance = sqlx::query_scalar::<_, i64>(
      "UPDATE cards SET balance_cents = balance_cents + $3 \
       WHERE id = $1 AND password_hash = $2 RETURNING balance_cents",
    )
    .bind(card_id)
    .bind(expected_hash)
    .bind(amount_cents)
    .fetch_optional(&self.pool)
    .await?;
    Ok(balance)
  }

  async fn replace_card_password(&self, card_id: Uuid, expected_hash: &str, new_hash: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE cards SET password_hash = $3 WHERE id = $1 AND password_hash = $2")
      .bind(card_id)
      .bind(expected_hash)
      .bind(new_hash)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn delete_card(&self, card_id: Uuid, expected_hash: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cards WHERE id = $1 AND password_hash = $2")
      .bind(card_id)
      .bind(expected_hash)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn cart_for_user(&self, user_id: Uuid) -> Result<Cart> {
    let mut tx = self.pool.begin().await?;
    let mut cart = lock_cart(&mut tx, user_id).await?;
    cart.total_price_cents = recompute_total(&mut tx, cart.id).await?;
    tx.commit().await?;
    Ok(cart)
  }

  async fn find_cart_item(&self, cart_item_id: Uuid) -> Result<Option<OwnedCartItem>> {
    let item = sqlx::query_as::<_, OwnedCartItem>(
      "SELECT ci.id, ci.cart_id, ci.product_id, ci.quantity, ci.added_at, c.user_id AS owner_id \
       FROM cart_items ci JOIN carts c ON c.id = ci.cart_id WHERE ci.id = $1",
    )
    .bind(cart_item_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(item)
  }

  #[instrument(name = "PgStore::add_cart_item", skip(self))]
  async fn add_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartItem> {
    let mut tx = self.pool.begin().await?;
    let product_exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
      .bind(product_id)
      .fetch_one(&mut *tx)
      .await?;
    if !product_exists {
      return Err(AppError::NotFound("product"));
    }

    let cart = lock_cart(&mut tx, user_id).await?;
    let item = sqlx::query_as::<_, CartItem>(&format!(
      "INSERT INTO cart_items (id, cart_id, product_id, quantity) VALUES ($1, $2, $3, $4) \
       ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity \
       RETURNING {}",
      ITEM_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(cart.id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(&mut *tx)
    .await
    .map_err(|err| {
      if is_foreign_key_violation(&err) {
        AppError::NotFound("product")
      } else {
        AppError::Database(err)
      }
    })?;

    recompute_total(&mut tx, cart.id).await?;
    tx.commit().await?;
    Ok(item)
  }

  #[instrument(name = "PgStore::reduce_cart_item", skip(self))]
  async fn reduce_cart_item(&self, user_id: Uuid, cart_item_id: Uuid, amount: i32) -> Result<ItemReduction> {
    let mut tx = self.pool.begin().await?;
    let cart = lock_cart(&mut tx, user_id).await?;
    let item = item_in_cart(&mut tx, &cart, cart_item_id).await?;

    let remaining = item.quantity.saturating_sub(amount);
    let outcome = if remaining <= 0 {
      sqlx::query("DELETE FROM cart_items WHERE id = $1")
        .bind(cart_item_id)
        .execute(&mut *tx)
        .await?;
      ItemReduction::Removed { cart_item_id }
    } else {
      let item = sqlx::query_as::<_, CartItem>(&format!(
        "UPDATE cart_items SET quantity = $2 WHERE id = $1 RETURNING {}",
        ITEM_COLUMNS
      ))
      .bind(cart_item_id)
      .bind(remaining)
      .fetch_one(&mut *tx)
      .await?;
      ItemReduction::Decreased { item }
    };

    recompute_total(&mut tx, cart.id).await?;
    tx.commit().await?;
    Ok(outcome)
  }

  async fn delete_cart_item(&self, user_id: Uuid, cart_item_id: Uuid) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    let cart = lock_cart(&mut tx, user_id).await?;
    item_in_cart(&mut tx, &cart, cart_item_id).await?;
    sqlx::query("DELETE FROM cart_items WHERE id = $1")
      .bind(cart_item_id)
      .execute(&mut *tx)
      .await?;
    recompute_total(&mut tx, cart.id).await?;
    tx.commit().await?;
    Ok(())
  }

  async fn clear_cart(&self, user_id: Uuid) -> Result<u64> {
    let mut tx = self.pool.begin().await?;
    let cart = lock_cart(&mut tx, user_id).await?;
    let removed = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
      .bind(cart.id)
      .execute(&mut *tx)
      .await?
      .rows_affected();
    recompute_total(&mut tx, cart.id).await?;
    tx.commit().await?;
    Ok(removed)
  }

  async fn cart_view(&self, user_id: Uuid) -> Result<CartView> {
    let mut tx = self.pool.begin().await?;
    let cart = lock_cart(&mut tx, user_id).await?;
    recompute_total(&mut tx, cart.id).await?;
    let lines = cart_lines(&mut tx, cart.id).await?;
    tx.commit().await?;
    Ok(CartView::new(cart.id, lines))
  }

  #[instrument(name = "PgStore::settle", skip(self))]
  async fn settle(&self, user_id: Uuid, scope: PaymentScope) -> Result<Settlement> {
    let mut tx = self.pool.begin().await?;

    let card = sqlx::query_as::<_, Card>(&format!("SELECT {} FROM cards WHERE user_id = $1 FOR UPDATE", CARD_COLUMNS))
      .bind(user_id)
      .fetch_optional(&mut *tx)
      .await?
      .ok_or(AppError::NotFound("card"))?;
    let cart = lock_cart(&mut tx, user_id).await?;

    let to_pay = match scope {
      PaymentScope::SingleItem(cart_item_id) => {
        item_in_cart(&mut tx, &cart, cart_item_id).await?;
        vec![item_line(&mut tx, cart_item_id).await?]
      }
      PaymentScope::WholeCart => {
        let lines = cart_lines(&mut tx, cart.id).await?;
        if lines.is_empty() {
          return Err(AppError::EmptyCart);
        }
        lines
      }
    };
    let charged_cents: i64 = to_pay.iter().map(|l| l.subtotal_cents).sum();

    if card.balance_cents < charged_cents {
      return Err(AppError::InsufficientFunds);
    }

    let remaining_balance_cents = sqlx::query_scalar::<_, i64>(
      "UPDATE cards SET balance_cents = balance_cents - $2 WHERE id = $1 RETURNING balance_cents",
    )
    .bind(card.id)
    .bind(charged_cents)
    .fetch_one(&mut *tx)
    .await?;

    let paid_items: Vec<Uuid> = to_pay.iter().map(|l| l.cart_item_id).collect();
    sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
      .bind(&paid_items)
      .execute(&mut *tx)
      .await?;
    recompute_total(&mut tx, cart.id).await?;
    tx.commit().await?;

    Ok(Settlement {
      charged_cents,
      remaining_balance_cents,
      paid_items,
    })
  }
}
