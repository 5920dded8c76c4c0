// app/src/store/seed.rs

//! Demo catalog loaded when `SEED_DB=true`.

use crate::store::MemoryStore;

/// `(category, [(product, price_cents)])`
pub const CATALOG: &[(&str, &[(&str, i64)])] = &[
  (
    "Electronics",
    &[("Wireless Headphones", 4_999), ("Mechanical Keyboard", 7_999), ("USB-C Charger", 1_999)],
  ),
  ("Books", &[("The Rust Programming Language", 3_999), ("Database Internals", 4_499)]),
  ("Groceries", &[("Coffee Beans", 1_299), ("Green Tea", 699), ("Dark Chocolate", 349)]),
];

pub fn image_path(product_name: &str) -> String {
  let slug: String = product_name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
    .collect();
  format!("images/{}.jpg", slug)
}

/// Loads the demo catalog into a memory store; returns the number of products.
pub fn seed_memory(store: &MemoryStore) -> usize {
  let mut count = 0;
  for (category_name, products) in CATALOG {
    let category = store.insert_category(category_name);
    for (product_name, price_cents) in products.iter() {
      store.insert_product(product_name, *price_cents, category.id);
      count += 1;
    }
  }
  count
}
