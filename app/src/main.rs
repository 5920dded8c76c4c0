// app/src/main.rs
use anyhow::Context;
use actix_web::{web, App, HttpServer};
use cardshop::config::{AppConfig, StoreBackend};
use cardshop::state::AppState;
use cardshop::store::{seed, MemoryStore, PgStore, Store};
use cardshop::telemetry;
use cardshop::web::configure_app_routes;
use std::sync::Arc;
use tracing::{info, warn};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let app_config = AppConfig::from_env().context("Failed to load application configuration")?;
  telemetry::init_tracing(app_config.log_format);
  info!(config = ?app_config, "Starting cardshop server...");

  let store: Arc<dyn Store> = match app_config.store_backend {
    StoreBackend::Postgres => {
      let database_url = app_config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required by the postgres store")?;
      let pg = PgStore::connect(database_url, app_config.database_max_connections)
        .await
        .context("Failed to connect to the database")?;
      pg.migrate().await.context("Failed to apply migrations")?;
      if app_config.seed_db {
        pg.seed_catalog().await.context("Failed to seed the catalog")?;
      }
      Arc::new(pg)
    }
    StoreBackend::Memory => {
      warn!("Using the in-memory store; data is lost on shutdown.");
      let memory = MemoryStore::new();
      if app_config.seed_db {
        let products = seed::seed_memory(&memory);
        info!(products, "In-memory catalog seeded.");
      }
      Arc::new(memory)
    }
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  let app_state = AppState::new(&app_config, store).context("Failed to build application state")?;

  info!("Binding server to {}...", server_address);
  HttpServer::new(move || {
    App::new()
      .app_data(web::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)
  .with_context(|| format!("Failed to bind {}", server_address))?
  .run()
  .await?;

  Ok(())
}
