// shopfront_app/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use shopfront::TransitionPolicy;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  /// Prefix for the public URLs of stored objects.
  pub public_base_url: String,
  pub storage_root: PathBuf,
  pub session_ttl_hours: i64,
  pub order_transitions: TransitionPolicy,

  // Optional bootstrap admin, created or promoted at startup.
  pub admin_email: Option<String>,
  pub admin_password: Option<String>,

  pub run_migrations: bool,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the config from any variable source. `from_env` passes the
  /// process environment.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| {
      lookup(var_name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("Missing environment variable '{}'", var_name)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|_| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL")?;
    let public_base_url = get_env("PUBLIC_BASE_URL")
      .unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port))
      .trim_end_matches('/')
      .to_string();
    let storage_root = PathBuf::from(get_env("STORAGE_ROOT").unwrap_or_else(|_| "./storage".to_string()));

    let session_ttl_hours = get_env("SESSION_TTL_HOURS")
      .unwrap_or_else(|_| "168".to_string())
      .parse::<i64>()
      .map_err(|e| AppError::Config(format!("Invalid SESSION_TTL_HOURS: {}", e)))?;
    if session_ttl_hours <= 0 {
      return Err(AppError::Config("SESSION_TTL_HOURS must be positive".to_string()));
    }

    let order_transitions = get_env("ORDER_TRANSITIONS")
      .unwrap_or_else(|_| "monotonic".to_string())
      .parse::<TransitionPolicy>()
      .map_err(|e| AppError::Config(format!("Invalid ORDER_TRANSITIONS: {}", e)))?;

    let admin_email = get_env("ADMIN_EMAIL").ok();
    let admin_password = get_env("ADMIN_PASSWORD").ok();
    if admin_email.is_some() != admin_password.is_some() {
      return Err(AppError::Config(
        "ADMIN_EMAIL and ADMIN_PASSWORD must be set together".to_string(),
      ));
    }

    let run_migrations = get_env("RUN_MIGRATIONS")
      .unwrap_or_else(|_| "true".to_string())
      .parse::<bool>()
      .map_err(|e| AppError::Config(format!("Invalid RUN_MIGRATIONS value: {}", e)))?;

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      public_base_url,
      storage_root,
      session_ttl_hours,
      order_transitions,
      admin_email,
      admin_password,
      run_migrations,
    })
  }

  pub fn server_address(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }
}
