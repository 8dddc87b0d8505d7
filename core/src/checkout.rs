// shopfront/src/checkout.rs

//! Order creation as a compensating workflow:
//!
//! 1. `validate_checkout`: session, contact, lines, UPI proof present. No
//!    backend call happens before this passes.
//! 2. `price_cart_lines`: snapshots each product's live price.
//! 3. `upload_payment_proof`: UPI only. Compensated by removing the object.
//! 4. `create_order_with_items`: one atomic insert of the order and its items.

use crate::backend::{random_token, Backend, Upload, PAYMENT_PROOFS_BUCKET};
use crate::context::ContextData;
use crate::error::{ShopError, ShopResult};
use crate::lifecycle::OrderStatus;
use crate::models::{DeliveryContact, NewOrder, NewOrderItem, OrderWithItems, PaymentMethod};
use crate::workflow::{SkipCondition, StepControl, Workflow, WorkflowResult, Workflows};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
  pub product_id: Uuid,
  pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
  /// `None` when nobody is signed in.
  pub user_id: Option<Uuid>,
  pub contact: DeliveryContact,
  pub payment_method: PaymentMethod,
  pub lines: Vec<CheckoutLine>,
  pub proof: Option<Upload>,
}

/// What the confirmation view is keyed by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
  pub order_id: Uuid,
  pub payment_method: PaymentMethod,
  pub order_status: OrderStatus,
  pub total_amount: Decimal,
  pub confirmation_path: String,
}

impl CheckoutReceipt {
  fn for_order(order: &OrderWithItems) -> Self {
    let order = &order.order;
    Self {
      order_id: order.id,
      payment_method: order.payment_method,
      order_status: order.order_status,
      total_amount: order.total_amount,
      confirmation_path: format!("/order-success?id={}&method={}", order.id, order.payment_method),
    }
  }
}

#[derive(Clone)]
pub struct CheckoutCtxData {
  pub backend: Backend,
  pub request: CheckoutRequest,
  pub user_id: Option<Uuid>,
  pub priced: Vec<NewOrderItem>,
  pub total: Decimal,
  pub proof_key: Option<String>,
  pub proof_url: Option<String>,
  pub order: Option<OrderWithItems>,
}

impl CheckoutCtxData {
  pub fn new(backend: Backend, request: CheckoutRequest) -> Self {
    Self {
      backend,
      request,
      user_id: None,
      priced: Vec::new(),
      total: Decimal::ZERO,
      proof_key: None,
      proof_url: None,
      order: None,
    }
  }
}

/// `proof_<millis>_<7 random chars>.<ext>`
pub fn proof_object_key(file: &Upload) -> String {
  format!(
    "proof_{}_{}.{}",
    Utc::now().timestamp_millis(),
    random_token(7),
    file.extension()
  )
}

fn validate(request: &CheckoutRequest) -> ShopResult<Uuid> {
  let user_id = request.user_id.ok_or(ShopError::Unauthenticated)?;
  request.contact.validate()?;
  if request.lines.is_empty() {
    return Err(ShopError::Validation("the cart is empty".to_string()));
  }
  if let Some(line) = request.lines.iter().find(|line| line.quantity <= 0) {
    return Err(ShopError::Validation(format!(
      "quantity for product {} must be positive",
      line.product_id
    )));
  }
  if request.payment_method.requires_proof() && request.proof.is_none() {
    return Err(ShopError::Validation("a payment screenshot is required for UPI".to_string()));
  }
  Ok(user_id)
}

pub fn checkout_workflow() -> Workflow<CheckoutCtxData, ShopError> {
  let not_upi: SkipCondition<CheckoutCtxData> =
    Arc::new(|ctx_data: ContextData<CheckoutCtxData>| !ctx_data.read().request.payment_method.requires_proof());

  let mut w = Workflow::<CheckoutCtxData, ShopError>::new(
    "checkout",
    &[
      ("validate_checkout", false, None),
      ("price_cart_lines", false, None),
      ("upload_payment_proof", false, Some(not_upi)),
      ("create_order_with_items", false, None),
    ],
  );

  w.on_step("validate_checkout", |ctx_data: ContextData<CheckoutCtxData>| async move {
    let user_id = ctx_data.with(|data| validate(&data.request))?;
    ctx_data.write().user_id = Some(user_id);
    Ok::<_, ShopError>(StepControl::Continue)
  });

  w.on_step("price_cart_lines", |ctx_data: ContextData<CheckoutCtxData>| async move {
    let (store, lines) = ctx_data.with(|data| (Arc::clone(&data.backend.store), data.request.lines.clone()));

    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
      let product = store.get_product(line.product_id).await?;
      if product.is_archived {
        return Err(ShopError::Validation(format!("'{}' is no longer available", product.name)));
      }
      priced.push(NewOrderItem {
        product_id: product.id,
        quantity: line.quantity,
        price: product.price,
      });
    }
    let total: Decimal = priced
      .iter()
      .map(|item| item.price * Decimal::from(item.quantity))
      .sum();

    let mut guard = ctx_data.write();
    guard.priced = priced;
    guard.total = total;
    Ok::<_, ShopError>(StepControl::Continue)
  });

  w.on_step("upload_payment_proof", |ctx_data: ContextData<CheckoutCtxData>| async move {
    let (objects, proof) = ctx_data.with(|data| (Arc::clone(&data.backend.objects), data.request.proof.clone()));
    let proof = proof.ok_or_else(|| ShopError::Validation("a payment screenshot is required for UPI".to_string()))?;

    let key = proof_object_key(&proof);
    let url = objects.upload(PAYMENT_PROOFS_BUCKET, &key, proof).await?;
    event!(Level::DEBUG, %key, "Payment proof stored.");

    let mut guard = ctx_data.write();
    guard.proof_key = Some(key);
    guard.proof_url = Some(url);
    Ok::<_, ShopError>(StepControl::Continue)
  });

  w.compensate_step("upload_payment_proof", |ctx_data: ContextData<CheckoutCtxData>| async move {
    let (objects, key) = ctx_data.with(|data| (Arc::clone(&data.backend.objects), data.proof_key.clone()));
    if let Some(key) = key {
      objects.remove(PAYMENT_PROOFS_BUCKET, &[key]).await?;
      ctx_data.update(|data| {
        data.proof_key = None;
        data.proof_url = None;
      });
    }
    Ok::<_, ShopError>(())
  });

  w.on_step("create_order_with_items", |ctx_data: ContextData<CheckoutCtxData>| async move {
    let (store, new_order, items) = ctx_data.with(|data| {
      let new_order = data.user_id.map(|user_id| NewOrder {
        user_id,
        contact: data.request.contact.clone(),
        total_amount: data.total,
        payment_method: data.request.payment_method,
        payment_proof_url: data.proof_url.clone(),
      });
      (Arc::clone(&data.backend.store), new_order, data.priced.clone())
    });
    let new_order = new_order.ok_or(ShopError::Unauthenticated)?;

    let order = store.create_order(new_order, items).await?;
    event!(
      Level::INFO,
      order_id = %order.order.id,
      status = %order.order.order_status,
      total = %order.order.total_amount,
      "Order created."
    );
    ctx_data.write().order = Some(order);
    Ok::<_, ShopError>(StepControl::Continue)
  });

  w
}

/// Runs the registered checkout workflow and returns the receipt.
#[instrument(name = "checkout::place_order", skip_all, fields(method = %request.payment_method, lines = request.lines.len()))]
pub async fn place_order<E>(workflows: &Workflows<E>, backend: &Backend, request: CheckoutRequest) -> Result<CheckoutReceipt, E>
where
  E: std::error::Error + From<ShopError> + Send + Sync + 'static,
{
  let ctx_data = ContextData::new(CheckoutCtxData::new(backend.clone(), request));
  match workflows.run(ctx_data.clone()).await? {
    WorkflowResult::Completed => {}
    WorkflowResult::Stopped => return Err(E::from(ShopError::Internal("checkout stopped early".to_string()))),
  }
  ctx_data
    .with(|data| data.order.as_ref().map(CheckoutReceipt::for_order))
    .ok_or_else(|| E::from(ShopError::Internal("checkout finished without an order".to_string())))
}
