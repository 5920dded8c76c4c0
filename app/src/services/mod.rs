// app/src/services/mod.rs

pub mod auth_service;
pub mod card_numbers;
pub mod session;
pub mod validation;
