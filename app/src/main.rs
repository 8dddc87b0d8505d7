// shopfront_app/src/main.rs

mod config;
mod db;
mod errors;
mod services;
mod state;
mod web;

use crate::config::AppConfig;
use crate::db::{PgIdentity, PgStore};
use crate::errors::AppError;
use crate::services::storage::DiskObjectStore;
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use shopfront::{Backend, ChangeHub};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
  tracing::error!(error = %e, "{}", context);
  std::io::Error::other(format!("{}: {}", context, e))
}

/// Connects, migrates and wires the Postgres and disk backends.
async fn build_state(app_config: Arc<AppConfig>) -> Result<AppState, AppError> {
  let db_pool = PgPool::connect(&app_config.database_url).await?;
  tracing::info!("Successfully connected to the database.");

  if app_config.run_migrations {
    db::run_migrations(&db_pool).await?;
    tracing::info!("Database migrations applied.");
  }

  let changes = ChangeHub::new();
  let store = Arc::new(PgStore::new(db_pool.clone(), changes.clone()));
  let identity = Arc::new(PgIdentity::new(db_pool, app_config.session_ttl_hours));
  let objects = Arc::new(DiskObjectStore::new(
    app_config.storage_root.clone(),
    app_config.public_base_url.clone(),
  ));

  if let (Some(email), Some(password)) = (&app_config.admin_email, &app_config.admin_password) {
    identity.bootstrap_admin(store.as_ref(), email, password).await?;
  }
  let purged = identity.purge_expired().await?;
  tracing::info!(purged, "Expired sessions removed.");

  let backend = Backend::new(store, objects, identity, changes);
  Ok(AppState::new(backend, app_config))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE)
    .init();

  tracing::info!("Starting shopfront server...");

  let app_config = AppConfig::from_env()
    .map(Arc::new)
    .map_err(|e| startup_error("Failed to load application configuration.", e))?;

  let app_state = build_state(Arc::clone(&app_config))
    .await
    .map_err(|e| startup_error("Failed to initialize application state.", e))?;
  tracing::info!(policy = ?app_config.order_transitions, "Workflows registered.");

  let server_address = app_config.server_address();
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
