// shopfront_app/src/web/handlers/checkout_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use shopfront::checkout::{self, CheckoutLine, CheckoutRequest};
use shopfront::models::{DeliveryContact, PaymentMethod};
use tracing::{info, instrument};

use super::{decode_optional, UploadPayload};
use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::MaybeUser;

#[derive(Deserialize, Debug)]
pub struct CheckoutRequestPayload {
  pub lines: Vec<CheckoutLine>,
  pub contact: DeliveryContact,
  pub payment_method: PaymentMethod,
  /// Payment screenshot, required for UPI.
  #[serde(default)]
  pub payment_proof: Option<UploadPayload>,
}

/// Guests reach the workflow too; its first step refuses them before any
/// write happens.
#[instrument(
    name = "handler::checkout",
    skip(app_state, req_payload, user),
    fields(method = %req_payload.payment_method, lines = req_payload.lines.len())
)]
pub async fn checkout_handler(
  app_state: web::Data<AppState>,
  req_payload: web::Json<CheckoutRequestPayload>,
  user: MaybeUser,
) -> Result<HttpResponse, AppError> {
  let payload = req_payload.into_inner();
  let request = CheckoutRequest {
    user_id: user.0.map(|u| u.user_id),
    contact: payload.contact,
    payment_method: payload.payment_method,
    lines: payload.lines,
    proof: decode_optional(payload.payment_proof)?,
  };

  let receipt = checkout::place_order(&app_state.workflows, &app_state.backend, request).await?;
  info!(order_id = %receipt.order_id, status = %receipt.order_status, "Checkout completed.");
  Ok(HttpResponse::Created().json(receipt))
}
