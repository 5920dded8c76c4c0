// app/src/lib.rs

//! cardshop: user accounts, a stored-value card per user, a shopping cart and
//! a checkout that pays for cart items from the card balance.

pub mod config;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod web;
