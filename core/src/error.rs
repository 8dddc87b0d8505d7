// shopfront/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;
use uuid::Uuid;

/// Postgres SQLSTATE for a foreign key violation. Backends report referential
/// failures with this code so callers can offer the archive fallback.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum ShopError {
  /// Rejected before any backend call (missing field, bad value, no proof).
  #[error("Validation failed: {0}")]
  Validation(String),

  #[error("A signed-in session is required")]
  Unauthenticated,

  #[error("Access denied: {0}")]
  Forbidden(String),

  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("Upload to bucket '{bucket}' failed: {message}")]
  Upload { bucket: String, message: String },

  #[error("Store operation failed. Source: {source}")]
  Store {
    #[source]
    source: AnyhowError,
  },

  #[error("Product {product_id} is referenced by existing orders (code {code})")]
  ReferencedByOrders { product_id: Uuid, code: &'static str },

  #[error("Status change from '{from}' to '{to}' is not allowed")]
  InvalidTransition { from: String, to: String },

  /// The row changed underneath a compare-and-set write.
  #[error("Conflicting update: {0}")]
  Conflict(String),

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Internal error: {0}")]
  Internal(String),
}

impl ShopError {
  pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
    ShopError::NotFound {
      entity,
      id: id.to_string(),
    }
  }

  pub fn upload(bucket: &str, message: impl Into<String>) -> Self {
    ShopError::Upload {
      bucket: bucket.to_string(),
      message: message.into(),
    }
  }

  pub fn referenced(product_id: Uuid) -> Self {
    ShopError::ReferencedByOrders {
      product_id,
      code: FOREIGN_KEY_VIOLATION,
    }
  }

  /// True for failures the admin console answers with an archive offer.
  pub fn is_referential(&self) -> bool {
    matches!(self, ShopError::ReferencedByOrders { .. })
  }
}

impl From<AnyhowError> for ShopError {
  fn from(err: AnyhowError) -> Self {
    match err.downcast::<ShopError>() {
      Ok(shop_err) => shop_err,
      Err(other) => ShopError::Store { source: other },
    }
  }
}

pub type ShopResult<T, E = ShopError> = std::result::Result<T, E>;
