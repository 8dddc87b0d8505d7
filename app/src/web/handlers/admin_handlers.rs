// shopfront_app/src/web/handlers/admin_handlers.rs

//! Back-office endpoints. Every handler takes an `AdminUser`, so the role
//! gate runs before any of them.

use actix_web::{web, HttpResponse};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use shopfront::models::{BannerDraft, NewProduct, StockStatus};
use shopfront::{OrderStatus, ServiceStatus};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{decode_optional, UploadPayload};
use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AdminUser;

#[derive(Deserialize, Debug, Default)]
pub struct OrderListQuery {
  pub status: Option<OrderStatus>,
}

#[derive(Deserialize, Debug)]
pub struct OrderStatusPayload {
  pub status: OrderStatus,
}

#[derive(Deserialize, Debug)]
pub struct ServiceStatusPayload {
  pub status: ServiceStatus,
}

#[derive(Deserialize, Debug)]
pub struct TechnicianPayload {
  #[serde(default)]
  pub technician_name: String,
}

#[derive(Deserialize, Debug)]
pub struct ProductPayload {
  pub product: NewProduct,
  #[serde(default)]
  pub image: Option<UploadPayload>,
}

#[derive(Deserialize, Debug)]
pub struct StockPayload {
  pub stock_status: StockStatus,
}

#[derive(Deserialize, Debug)]
pub struct PricePayload {
  pub price: Decimal,
}

#[derive(Deserialize, Debug)]
pub struct BannerPayload {
  pub banner: BannerDraft,
  #[serde(default)]
  pub image: Option<UploadPayload>,
}

/// What the admin area shows once the gate lets a session through.
pub async fn admin_session_handler(admin: AdminUser) -> HttpResponse {
  HttpResponse::Ok().json(json!({
      "session": admin.session,
      "role": admin.role,
  }))
}

#[instrument(name = "handler::admin::dashboard", skip_all, fields(admin_id = %admin.user_id))]
pub async fn dashboard_handler(app_state: web::Data<AppState>, admin: AdminUser) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.admin.dashboard_stats().await?))
}

// --- orders ---

#[instrument(name = "handler::admin::list_orders", skip(app_state, admin), fields(admin_id = %admin.user_id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  query: web::Query<OrderListQuery>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.admin.list_orders(query.status).await?))
}

#[instrument(name = "handler::admin::order_detail", skip(app_state, admin), fields(admin_id = %admin.user_id))]
pub async fn order_detail_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.admin.order_detail(path.into_inner()).await?))
}

#[instrument(name = "handler::admin::approve_order", skip(app_state, admin), fields(admin_id = %admin.user_id))]
pub async fn approve_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let order = app_state.admin.approve_order(path.into_inner()).await?;
  info!(order_id = %order.id, "Order approved.");
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::admin::reject_order", skip(app_state, admin), fields(admin_id = %admin.user_id))]
pub async fn reject_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let order = app_state.admin.reject_order(path.into_inner()).await?;
  info!(order_id = %order.id, "Order rejected.");
  Ok(HttpResponse::Ok().json(order))
}

#[instrument(name = "handler::admin::set_order_status", skip(app_state, admin), fields(admin_id = %admin.user_id))]
pub async fn set_order_status_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<OrderStatusPayload>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .admin
    .set_order_status(path.into_inner(), req_payload.status)
    .await?;
  Ok(HttpResponse::Ok().json(order))
}

// --- services ---

pub async fn list_services_handler(app_state: web::Data<AppState>, _admin: AdminUser) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.admin.list_services().await?))
}

#[instrument(name = "handler::admin::set_service_status", skip(app_state, admin), fields(admin_id = %admin.user_id))]
pub async fn set_service_status_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<ServiceStatusPayload>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let service = app_state
    .admin
    .set_service_status(path.into_inner(), req_payload.status)
    .await?;
  Ok(HttpResponse::Ok().json(service))
}

/// A blank name clears the assignment.
#[instrument(name = "handler::admin::assign_technician", skip(app_state, admin), fields(admin_id = %admin.user_id))]
pub async fn assign_technician_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<TechnicianPayload>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let service = app_state
    .admin
    .assign_technician(path.into_inner(), &req_payload.technician_name)
    .await?;
  Ok(HttpResponse::Ok().json(service))
}

// --- products ---

pub async fn list_products_handler(app_state: web::Data<AppState>, _admin: AdminUser) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.admin.list_products().await?))
}

#[instrument(name = "handler::admin::create_product", skip_all, fields(admin_id = %admin.user_id))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<ProductPayload>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let image = decode_optional(payload.image)?;
  let product = app_state.admin.create_product(payload.product, image).await?;
  Ok(HttpResponse::Created().json(product))
}

#[instrument(name = "handler::admin::update_product", skip(app_state, req_payload, admin), fields(admin_id = %admin.user_id))]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<ProductPayload>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let image = decode_optional(payload.image)?;
  let product = app_state
    .admin
    .update_product(path.into_inner(), payload.product, image)
    .await?;
  Ok(HttpResponse::Ok().json(product))
}

/// Answers 409 with an `archive` hint while orders reference the product.
#[instrument(name = "handler::admin::delete_product", skip(app_state, admin), fields(admin_id = %admin.user_id))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  app_state.admin.delete_product(path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}

#[instrument(name = "handler::admin::archive_product", skip(app_state, admin), fields(admin_id = %admin.user_id))]
pub async fn archive_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.admin.archive_product(path.into_inner()).await?))
}

pub async fn set_stock_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<StockPayload>,
  _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let product = app_state
    .admin
    .set_stock_status(path.into_inner(), req_payload.stock_status)
    .await?;
  Ok(HttpResponse::Ok().json(product))
}

pub async fn set_price_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<PricePayload>,
  _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let product = app_state
    .admin
    .quick_price_update(path.into_inner(), req_payload.price)
    .await?;
  Ok(HttpResponse::Ok().json(product))
}

// --- banners ---

pub async fn list_banners_handler(app_state: web::Data<AppState>, _admin: AdminUser) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.admin.list_banners().await?))
}

#[instrument(name = "handler::admin::create_banner", skip_all, fields(admin_id = %admin.user_id))]
pub async fn create_banner_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<BannerPayload>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let image = decode_optional(payload.image)?;
  let banner = app_state.admin.create_banner(payload.banner, image).await?;
  Ok(HttpResponse::Created().json(banner))
}

#[instrument(name = "handler::admin::update_banner", skip(app_state, req_payload, admin), fields(admin_id = %admin.user_id))]
pub async fn update_banner_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  req_payload: web::Json<BannerPayload>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let image = decode_optional(payload.image)?;
  let banner = app_state
    .admin
    .update_banner(path.into_inner(), payload.banner, image)
    .await?;
  Ok(HttpResponse::Ok().json(banner))
}

pub async fn toggle_banner_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.admin.toggle_banner(path.into_inner()).await?))
}

#[instrument(name = "handler::admin::delete_banner", skip(app_state, admin), fields(admin_id = %admin.user_id))]
pub async fn delete_banner_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  admin: AdminUser,
) -> Result<HttpResponse, AppError> {
  app_state.admin.delete_banner(path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}

// --- enquiries ---

pub async fn list_enquiries_handler(app_state: web::Data<AppState>, _admin: AdminUser) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.admin.list_enquiries().await?))
}
