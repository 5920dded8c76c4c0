// app/src/store/mod.rs

//! Persistence port. Every method that changes more than one row runs as a
//! single transaction: it either commits all of its effects or none of them.

pub mod memory;
pub mod postgres;
pub mod seed;

use crate::errors::Result;
use crate::models::{
  Card, Cart, CartItem, CartView, Category, ItemReduction, NewCard, NewUser, OwnedCartItem, PaymentScope, Product,
  Settlement, User,
};
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
  /// Round trip to the backing storage for the health route.
  async fn ping(&self) -> Result<()>;

  // --- users ---

  /// Inserts the user and creates their (empty) cart. A taken email is `Conflict`.
  async fn insert_user(&self, new_user: NewUser) -> Result<User>;
  async fn find_user(&self, user_id: Uuid) -> Result<Option<User>>;
  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

  /// Swaps the login password hash if it still equals `expected_hash`.
  async fn replace_user_password(&self, user_id: Uuid, expected_hash: &str, new_hash: &str) -> Result<bool>;

  /// Renames the user if their hash still equals `expected_hash`.
  async fn rename_user(&self, user_id: Uuid, expected_hash: &str, name: &str) -> Result<Option<User>>;

  /// Deletes the user, their card, cart and cart items, if their hash still
  /// equals `expected_hash`.
  async fn delete_user(&self, user_id: Uuid, expected_hash: &str) -> Result<bool>;

  // --- catalog ---

  async fn list_categories(&self) -> Result<Vec<Category>>;
  async fn list_products(&self) -> Result<Vec<Product>>;
  async fn find_product(&self, product_id: Uuid) -> Result<Option<Product>>;

  // --- cards ---

  /// Inserts a zero-balance card. An existing card for the user is `Conflict`;
  /// a number collision is `Internal`.
  async fn insert_card(&self, new_card: NewCard) -> Result<Card>;
  async fn card_number_taken(&self, number: &str) -> Result<bool>;
  async fn find_card_by_user(&self, user_id: Uuid) -> Result<Option<Card>>;

  /// Adds `amount_cents` if the card still carries `expected_hash`.
  /// `None` means the card was deleted or its password changed meanwhile.
  async fn credit_card(&self, card_id: Uuid, expected_hash: &str, amount_cents: i64) -> Result<Option<i64>>;

  /// Swaps the password hash if it still equals `expected_hash`.
  async fn replace_card_password(&self, card_id: Uuid, expected_hash: &str, new_hash: &str) -> Result<bool>;

  /// Deletes the card if it still carries `expected_hash`.
  async fn delete_card(&self, card_id: Uuid, expected_hash: &str) -> Result<bool>;

  // --- carts ---

  /// Returns the user's cart, creating it when missing.
  async fn cart_for_user(&self, user_id: Uuid) -> Result<Cart>;
  async fn find_cart_item(&self, cart_item_id: Uuid) -> Result<Option<OwnedCartItem>>;

  /// Adds `quantity` of a product, merging into an existing row for it.
  async fn add_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<CartItem>;

  /// Takes `amount` off an item of the user's cart, deleting it at zero.
  async fn reduce_cart_item(&self, user_id: Uuid, cart_item_id: Uuid, amount: i32) -> Result<ItemReduction>;
  async fn delete_cart_item(&self, user_id: Uuid, cart_item_id: Uuid) -> Result<()>;

  /// Empties the user's cart and returns how many rows were removed.
  async fn clear_cart(&self, user_id: Uuid) -> Result<u64>;

  /// Items joined with live product data; the total is recomputed.
  async fn cart_view(&self, user_id: Uuid) -> Result<CartView>;

  // --- checkout ---

  /// Debits the user's card by the price of `scope` and removes the paid items.
  ///
  /// The card, then the cart, are locked for the whole operation. Fails with
  /// `InsufficientFunds` or `EmptyCart` without changing anything.
  async fn settle(&self, user_id: Uuid, scope: PaymentScope) -> Result<Settlement>;
}
