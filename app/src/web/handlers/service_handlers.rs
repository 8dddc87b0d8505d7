// shopfront_app/src/web/handlers/service_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use shopfront::booking;
use shopfront::models::{NewServiceRequest, ServiceType};
use tracing::{info, instrument};

use super::{decode_optional, UploadPayload};
use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct BookServicePayload {
  pub full_name: String,
  pub phone: String,
  pub address: String,
  pub service_type: ServiceType,
  #[serde(default)]
  pub description: Option<String>,
  pub preferred_date: String,
  pub time_slot: String,
  /// Repair photo; ignored for other service types.
  #[serde(default)]
  pub photo: Option<UploadPayload>,
}

#[instrument(
    name = "handler::book_service",
    skip(app_state, req_payload, auth_user),
    fields(user_id = %auth_user.user_id, service_type = req_payload.service_type.as_str())
)]
pub async fn book_service_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<BookServicePayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let photo = decode_optional(payload.photo)?;
  let request = NewServiceRequest {
    user_id: auth_user.user_id,
    full_name: payload.full_name,
    phone: payload.phone,
    address: payload.address,
    service_type: payload.service_type,
    description: payload.description,
    preferred_date: payload.preferred_date,
    time_slot: payload.time_slot,
    image_url: None,
  };

  let service = booking::book_service(&app_state.workflows, &app_state.backend, request, photo).await?;
  info!(service_id = %service.id, "Service booked.");
  Ok(HttpResponse::Created().json(service))
}

#[instrument(name = "handler::my_services", skip_all, fields(user_id = %auth_user.user_id))]
pub async fn list_my_services_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let services = app_state.backend.store.list_services(Some(auth_user.user_id)).await?;
  Ok(HttpResponse::Ok().json(services))
}
