// shopfront_app/src/web/extractors.rs

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use shopfront::gate::DenyReason;
use shopfront::models::Role;
use shopfront::{GateDecision, Session, ShopError};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// Bearer token from the `Authorization` header.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
  req
    .headers()
    .get(header::AUTHORIZATION)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.strip_prefix("Bearer "))
    .map(|token| token.trim().to_string())
    .filter(|token| !token.is_empty())
}

fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, AppError> {
  req
    .app_data::<web::Data<AppState>>()
    .cloned()
    .ok_or_else(|| AppError::Internal("application state is not configured".to_string()))
}

/// A signed-in customer or admin, resolved from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
  pub user_id: Uuid,
  pub session: Session,
}

impl FromRequest for AuthenticatedUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let token = bearer_token(req);
    let state = app_state(req);
    Box::pin(async move {
      let state = state?;
      let Some(token) = token else {
        warn!("AuthenticatedUser extractor: missing bearer token.");
        return Err(ShopError::Unauthenticated.into());
      };
      match state.backend.identity.get_session(&token).await? {
        Some(session) => Ok(AuthenticatedUser {
          user_id: session.user.id,
          session,
        }),
        None => Err(ShopError::Unauthenticated.into()),
      }
    })
  }
}

/// Optional variant for endpoints that behave differently for guests.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthenticatedUser>);

impl FromRequest for MaybeUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
    let has_token = bearer_token(req).is_some();
    let user = AuthenticatedUser::from_request(req, payload);
    Box::pin(async move {
      if !has_token {
        return Ok(MaybeUser(None));
      }
      match user.await {
        Ok(user) => Ok(MaybeUser(Some(user))),
        Err(AppError::Shop {
          source: ShopError::Unauthenticated,
        }) => Ok(MaybeUser(None)),
        Err(e) => Err(e),
      }
    })
  }
}

/// A session that passed the admin role gate.
#[derive(Debug, Clone)]
pub struct AdminUser {
  pub user_id: Uuid,
  pub session: Session,
  pub role: Role,
}

impl FromRequest for AdminUser {
  type Error = AppError;
  type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
    let token = bearer_token(req);
    let state = app_state(req);
    Box::pin(async move {
      let state = state?;
      let Some(token) = token else {
        return Err(AppError::AdminRequired);
      };
      match state.gate.authorize_fresh(&token).await? {
        GateDecision::Allow { session, role } => Ok(AdminUser {
          user_id: session.user.id,
          session,
          role,
        }),
        GateDecision::RedirectToLogin { reason } => {
          if reason == DenyReason::NotAdmin {
            warn!("Admin gate refused a non-admin session.");
          }
          Err(AppError::AdminRequired)
        }
      }
    })
  }
}
