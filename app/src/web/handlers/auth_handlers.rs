// shopfront_app/src/web/handlers/auth_handlers.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use shopfront::models::Role;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::{bearer_token, AuthenticatedUser};

#[derive(Deserialize)]
pub struct CredentialsPayload {
  pub email: String,
  pub password: String,
}

impl std::fmt::Debug for CredentialsPayload {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CredentialsPayload").field("email", &self.email).finish_non_exhaustive()
  }
}

/// Creates the account, its `customer` profile and a session.
#[instrument(
    name = "handler::signup",
    skip(app_state, req_payload),
    fields(req_email = %req_payload.email)
)]
pub async fn signup_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CredentialsPayload>,
) -> Result<HttpResponse, AppError> {
  let session = app_state
    .backend
    .identity
    .sign_up(&req_payload.email, &req_payload.password)
    .await?;
  let profile = app_state
    .backend
    .store
    .upsert_profile(session.user.id, &session.user.email, Role::Customer)
    .await?;
  info!(user_id = %session.user.id, "Account created.");

  Ok(HttpResponse::Created().json(json!({
      "session": session,
      "role": profile.role,
  })))
}

#[instrument(
    name = "handler::signin",
    skip(app_state, req_payload),
    fields(req_email = %req_payload.email)
)]
pub async fn signin_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CredentialsPayload>,
) -> Result<HttpResponse, AppError> {
  let session = app_state
    .backend
    .identity
    .sign_in_with_password(&req_payload.email, &req_payload.password)
    .await?;
  let role = app_state
    .backend
    .store
    .get_profile(session.user.id)
    .await?
    .map(|p| p.role)
    .unwrap_or_default();

  Ok(HttpResponse::Ok().json(json!({
      "session": session,
      "role": role,
  })))
}

/// Always succeeds; unknown tokens are ignored.
#[instrument(name = "handler::signout", skip_all)]
pub async fn signout_handler(app_state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AppError> {
  if let Some(token) = bearer_token(&req) {
    app_state.backend.identity.sign_out(&token).await?;
  }
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::session", skip_all, fields(user_id = %auth_user.user_id))]
pub async fn session_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let role = app_state
    .backend
    .store
    .get_profile(auth_user.user_id)
    .await?
    .map(|p| p.role)
    .unwrap_or_default();
  Ok(HttpResponse::Ok().json(json!({
      "session": auth_user.session,
      "role": role,
  })))
}
