// app/src/models/mod.rs

//! Rows and value types shared by the store, the pipelines and the handlers.

pub mod card;
pub mod cart;
pub mod catalog;
pub mod payment;
pub mod user;

pub use card::{Card, NewCard};
pub use cart::{Cart, CartItem, CartLine, CartView, ItemReduction, OwnedCartItem};
pub use catalog::{Category, Product};
pub use payment::{CheckoutState, PaymentScope, Settlement};
pub use user::{NewUser, User};
