// shopfront_app/src/web/handlers/catalog_handlers.rs

use actix_web::{web, HttpResponse};
use shopfront::models::{NewEnquiry, NewReview};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

#[instrument(name = "handler::list_products", skip(app_state))]
pub async fn list_products_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  let products = app_state.catalog.products().await?;
  info!(count = products.len(), "Catalog listed.");
  Ok(HttpResponse::Ok().json(products))
}

#[instrument(name = "handler::get_product", skip(app_state, path), fields(product_id = %path.as_ref()))]
pub async fn get_product_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let product = app_state.catalog.product(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(product))
}

pub async fn list_banners_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.catalog.banners().await?))
}

pub async fn list_reviews_handler(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
  Ok(HttpResponse::Ok().json(app_state.catalog.recent_reviews().await?))
}

#[instrument(name = "handler::submit_review", skip_all, fields(rating = req_payload.rating))]
pub async fn submit_review_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<NewReview>,
) -> Result<HttpResponse, AppError> {
  let review = app_state.catalog.submit_review(req_payload.into_inner()).await?;
  Ok(HttpResponse::Created().json(review))
}

#[instrument(name = "handler::submit_enquiry", skip_all, fields(product_id = ?req_payload.product_id))]
pub async fn submit_enquiry_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<NewEnquiry>,
) -> Result<HttpResponse, AppError> {
  let enquiry = app_state.catalog.submit_enquiry(req_payload.into_inner()).await?;
  Ok(HttpResponse::Created().json(enquiry))
}
