// app/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use cardshop_flow::FlowError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Authentication required: {0}")]
  Unauthenticated(String),

  #[error("Not allowed: {0}")]
  Unauthorized(String),

  /// Login and card password mismatches share one message.
  #[error("invalid credentials")]
  InvalidCredential,

  #[error("{0} not found")]
  NotFound(&'static str),

  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Invalid amount: {0}")]
  InvalidAmount(String),

  #[error("Conflict: {0}")]
  Conflict(String),

  #[error("insufficient balance")]
  InsufficientFunds,

  #[error("cart is empty")]
  EmptyCart,

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  fn client_message(&self) -> String {
    match self {
      AppError::Unauthenticated(m)
      | AppError::Unauthorized(m)
      | AppError::Validation(m)
      | AppError::InvalidAmount(m)
      | AppError::Conflict(m) => m.clone(),
      AppError::NotFound(_) | AppError::InvalidCredential | AppError::InsufficientFunds | AppError::EmptyCart => {
        self.to_string()
      }
      AppError::Config(_) | AppError::Database(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        "An internal error occurred".to_string()
      }
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
      AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
      AppError::InvalidCredential
      | AppError::Validation(_)
      | AppError::InvalidAmount(_)
      | AppError::EmptyCart => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Conflict(_) => StatusCode::CONFLICT,
      AppError::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
      AppError::Config(_) | AppError::Database(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = ?self, "Responding with server error");
    } else {
      tracing::debug!(application_error = %self, %status, "Responding with client error");
    }
    HttpResponse::build(status).json(json!({
      "success": false,
      "error": self.client_message(),
    }))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
