// app/src/state.rs
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::pipelines;
use crate::services::auth_service::Credentials;
use crate::services::session::SessionKeys;
use crate::store::Store;
use cardshop_flow::Registry;
use std::sync::Arc;

/// Everything a request handler or pipeline step needs. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub flows: Arc<Registry<AppError>>,
  pub sessions: Arc<SessionKeys>,
  pub credentials: Credentials,
}

impl AppState {
  /// Derives the session keys and password hasher from `config` and registers
  /// every pipeline.
  pub fn new(config: &AppConfig, store: Arc<dyn Store>) -> Result<Self> {
    let credentials = Credentials::new(config.argon2_memory_kib, config.argon2_iterations)?;
    let sessions = SessionKeys::new(
      config.session_secret.as_bytes(),
      config.session_ttl_secs,
      config.session_cookie_name.clone(),
    )?;

    let flows = Registry::<AppError>::new();
    pipelines::register_all_pipelines(&flows);

    Ok(Self {
      store,
      flows: Arc::new(flows),
      sessions: Arc::new(sessions),
      credentials,
    })
  }
}
