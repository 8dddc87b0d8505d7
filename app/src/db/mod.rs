// shopfront_app/src/db/mod.rs

//! Postgres implementations of the backend contracts.

pub mod identity;
pub mod store;

pub use identity::PgIdentity;
pub use store::PgStore;

use shopfront::ShopError;
use sqlx::PgPool;

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
  sqlx::migrate!("./migrations").run(pool).await
}

pub(crate) fn db_err(e: sqlx::Error) -> ShopError {
  ShopError::Store { source: e.into() }
}

/// SQLSTATE of a database error, if it is one.
pub(crate) fn sql_state(e: &sqlx::Error) -> Option<String> {
  match e {
    sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
    _ => None,
  }
}

pub(crate) const UNIQUE_VIOLATION: &str = "23505";
