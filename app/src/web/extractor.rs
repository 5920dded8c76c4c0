// app/src/web/extractor.rs
use crate::errors::AppError;
use crate::state::AppState;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use tracing::{debug, warn};
use uuid::Uuid;

/// Identity of the caller, taken from the signed session cookie.
///
/// A missing, tampered or expired cookie rejects the request with 401 before
/// the handler (and so the store) is reached.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let Some(app_state) = req.app_data::<web::Data<AppState>>() else {
      warn!("AuthenticatedUser extractor used without AppState.");
      return ready(Err(AppError::Internal("application state is not configured".to_string())));
    };

    let result = match req.cookie(app_state.sessions.cookie_name()) {
      Some(cookie) => app_state
        .sessions
        .verify(cookie.value())
        .map(|user_id| AuthenticatedUser { user_id }),
      None => {
        debug!("Request without a session cookie.");
        Err(AppError::Unauthenticated("No token".to_string()))
      }
    };
    ready(result)
  }
}
