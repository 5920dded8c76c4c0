// app/src/services/validation.rs

//! Input shape checks applied before any store access.

use crate::errors::AppError;

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 25;
pub const DEPOSIT_MAX_CENTS: i64 = 1_000_000;
pub const CART_QUANTITY_MAX: i32 = 100;
const NAME_MAX_LEN: usize = 50;
const EMAIL_MAX_LEN: usize = 254;

/// Passwords are 8 to 25 characters of `[A-Za-z0-9@#$%^&+=]`.
pub fn password(field: &str, value: &str) -> Result<(), AppError> {
  let len = value.chars().count();
  if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
    return Err(AppError::Validation(format!(
      "{} must be between {} and {} characters",
      field, PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
    )));
  }
  let allowed = |c: char| c.is_ascii_alphanumeric() || "@#$%^&+=".contains(c);
  if !value.chars().all(allowed) {
    return Err(AppError::Validation(format!(
      "{} may only contain letters, digits and @#$%^&+=",
      field
    )));
  }
  Ok(())
}

pub fn passwords_match(first: &str, repeat: &str) -> Result<(), AppError> {
  if first != repeat {
    return Err(AppError::Validation("The passwords don't match".to_string()));
  }
  Ok(())
}

pub fn email(value: &str) -> Result<(), AppError> {
  let trimmed = value.trim();
  let valid = trimmed.len() <= EMAIL_MAX_LEN
    && !trimmed.contains(char::is_whitespace)
    && matches!(trimmed.split_once('@'), Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'));
  if !valid {
    return Err(AppError::Validation("A valid email is required".to_string()));
  }
  Ok(())
}

pub fn display_name(value: &str) -> Result<(), AppError> {
  let len = value.trim().chars().count();
  if len == 0 || len > NAME_MAX_LEN {
    return Err(AppError::Validation(format!("Name must be 1 to {} characters", NAME_MAX_LEN)));
  }
  Ok(())
}

pub fn deposit_amount(amount_cents: i64) -> Result<(), AppError> {
  if !(1..=DEPOSIT_MAX_CENTS).contains(&amount_cents) {
    return Err(AppError::InvalidAmount(format!(
      "amount must be between 1 and {}",
      DEPOSIT_MAX_CENTS
    )));
  }
  Ok(())
}

pub fn cart_quantity(quantity: i32) -> Result<(), AppError> {
  if !(1..=CART_QUANTITY_MAX).contains(&quantity) {
    return Err(AppError::Validation(format!(
      "quantity must be between 1 and {}",
      CART_QUANTITY_MAX
    )));
  }
  Ok(())
}

pub fn reduce_amount(amount: i32) -> Result<(), AppError> {
  if amount < 1 {
    return Err(AppError::InvalidAmount("amount must be at least 1".to_string()));
  }
  Ok(())
}
