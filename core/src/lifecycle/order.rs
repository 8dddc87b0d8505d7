// shopfront/src/lifecycle/order.rs

use crate::backend::Store;
use crate::error::{ShopError, ShopResult};
use crate::models::{Order, PaymentMethod};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "order_status", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  PendingVerification,
  Confirmed,
  Rejected,
  Shipped,
  Delivered,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 5] = [
    OrderStatus::PendingVerification,
    OrderStatus::Confirmed,
    OrderStatus::Rejected,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
  ];

  /// Cash needs no verification; UPI waits for a manual proof check.
  pub fn initial_for(method: PaymentMethod) -> Self {
    match method {
      PaymentMethod::Cash => OrderStatus::Confirmed,
      PaymentMethod::Upi => OrderStatus::PendingVerification,
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::Rejected | OrderStatus::Delivered)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::PendingVerification => "pending_verification",
      OrderStatus::Confirmed => "confirmed",
      OrderStatus::Rejected => "rejected",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
    }
  }
}

impl std::fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for OrderStatus {
  type Err = ShopError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    OrderStatus::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| ShopError::Validation(format!("unknown order status '{}'", s)))
  }
}

/// Which changes the generic status selector may make. Under either policy
/// `pending_verification` is left only through `OrderAction`, and the
/// selector never sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
  /// `confirmed -> shipped -> delivered`, rejection from any non-terminal
  /// state, nothing out of `rejected` or `delivered`.
  #[default]
  Monotonic,
  /// Any verified status may be set from any other.
  Unconstrained,
}

impl TransitionPolicy {
  pub fn permits(&self, from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    if from == to || from == PendingVerification || to == PendingVerification {
      return false;
    }
    match self {
      TransitionPolicy::Unconstrained => true,
      TransitionPolicy::Monotonic => matches!(
        (from, to),
        (Confirmed, Shipped) | (Confirmed, Rejected) | (Shipped, Delivered) | (Shipped, Rejected)
      ),
    }
  }
}

impl std::str::FromStr for TransitionPolicy {
  type Err = ShopError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "monotonic" => Ok(TransitionPolicy::Monotonic),
      "free" | "unconstrained" => Ok(TransitionPolicy::Unconstrained),
      other => Err(ShopError::Validation(format!("unknown transition policy '{}'", other))),
    }
  }
}

/// The two buttons shown on an order awaiting proof verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
  Approve,
  Reject,
}

impl OrderAction {
  pub fn target(&self) -> OrderStatus {
    match self {
      OrderAction::Approve => OrderStatus::Confirmed,
      OrderAction::Reject => OrderStatus::Rejected,
    }
  }
}

/// Applies admin status changes to orders. Every write is compare-and-set on
/// the status read just before it, so two admins racing on one order cannot
/// silently overwrite each other.
#[derive(Clone)]
pub struct OrderLifecycle {
  store: Arc<dyn Store>,
  policy: TransitionPolicy,
}

impl OrderLifecycle {
  pub fn new(store: Arc<dyn Store>, policy: TransitionPolicy) -> Self {
    Self { store, policy }
  }

  /// Approve or reject an order that is still awaiting verification.
  #[instrument(name = "OrderLifecycle::apply", skip(self), err(Display))]
  pub async fn apply(&self, order_id: Uuid, action: OrderAction) -> ShopResult<Order> {
    let order = self.store.get_order(order_id).await?;
    if order.order_status != OrderStatus::PendingVerification {
      return Err(ShopError::InvalidTransition {
        from: order.order_status.to_string(),
        to: action.target().to_string(),
      });
    }
    self.write(order, action.target()).await
  }

  /// Generic status selector. Setting the current status again is a no-op.
  #[instrument(name = "OrderLifecycle::set_status", skip(self), err(Display))]
  pub async fn set_status(&self, order_id: Uuid, to: OrderStatus) -> ShopResult<Order> {
    let order = self.store.get_order(order_id).await?;
    if order.order_status == to {
      event!(Level::DEBUG, %order_id, status = %to, "Order already in requested status.");
      return Ok(order);
    }
    if !self.policy.permits(order.order_status, to) {
      return Err(ShopError::InvalidTransition {
        from: order.order_status.to_string(),
        to: to.to_string(),
      });
    }
    self.write(order, to).await
  }

  async fn write(&self, order: Order, to: OrderStatus) -> ShopResult<Order> {
    let from = order.order_status;
    let updated = self.store.update_order_status(order.id, from, to).await?;
    event!(Level::INFO, order_id = %order.id, %from, %to, "Order status changed.");
    Ok(updated)
  }
}
