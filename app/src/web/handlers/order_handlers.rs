// shopfront_app/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use shopfront::ShopError;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

/// The caller's orders, newest first, with items and products embedded.
#[instrument(name = "handler::my_orders", skip_all, fields(user_id = %auth_user.user_id))]
pub async fn list_my_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.backend.store.list_orders_with_items(auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(orders))
}

/// Someone else's order answers as not found.
#[instrument(name = "handler::my_order", skip(app_state, path, auth_user), fields(order_id = %path.as_ref()))]
pub async fn get_my_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order_id = path.into_inner();
  let order = app_state.backend.store.get_order_with_items(order_id).await?;
  if order.order.user_id != auth_user.user_id {
    return Err(ShopError::not_found("order", order_id).into());
  }
  Ok(HttpResponse::Ok().json(order))
}
