// shopfront_app/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use shopfront::gate::ADMIN_LOGIN_PATH;
use shopfront::ShopError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  /// The role gate turned the caller away.
  #[error("Admin access required")]
  AdminRequired,

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration Error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),

  #[error("{source}")]
  Shop {
    #[from]
    source: ShopError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<ShopError>() {
      Ok(shop_err) => AppError::Shop { source: shop_err },
      Err(err) => match err.downcast::<sqlx::Error>() {
        Ok(sqlx_err) => AppError::Sqlx(sqlx_err),
        Err(other) => AppError::Internal(other.to_string()),
      },
    }
  }
}

impl AppError {
  fn shop_status(err: &ShopError) -> StatusCode {
    match err {
      ShopError::Validation(_) => StatusCode::BAD_REQUEST,
      ShopError::Unauthenticated => StatusCode::UNAUTHORIZED,
      ShopError::Forbidden(_) => StatusCode::FORBIDDEN,
      ShopError::NotFound { .. } => StatusCode::NOT_FOUND,
      ShopError::Upload { .. } => StatusCode::BAD_GATEWAY,
      ShopError::ReferencedByOrders { .. } | ShopError::InvalidTransition { .. } | ShopError::Conflict(_) => {
        StatusCode::CONFLICT
      }
      ShopError::Store { .. } | ShopError::HandlerMissing { .. } | ShopError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) | AppError::AdminRequired => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Shop { source } => Self::shop_status(source),
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Migrate(_) | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }

    let body = match self {
      AppError::AdminRequired => json!({"error": self.to_string(), "redirect": ADMIN_LOGIN_PATH}),
      AppError::Shop {
        source: ShopError::ReferencedByOrders { product_id, code },
      } => json!({
        "error": "Product is referenced by existing orders",
        "code": code,
        "product_id": product_id,
        "hint": "archive",
      }),
      AppError::Shop { source } if !status.is_server_error() => json!({"error": source.to_string()}),
      AppError::Sqlx(_) | AppError::Migrate(_) => json!({"error": "Database operation failed"}),
      AppError::Shop { .. } | AppError::Config(_) | AppError::Internal(_) => {
        json!({"error": "An internal error occurred"})
      }
      AppError::Validation(m) | AppError::Auth(m) | AppError::NotFound(m) => json!({"error": m}),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
