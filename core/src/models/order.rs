// shopfront/src/models/order.rs

use crate::error::{ShopError, ShopResult};
use crate::lifecycle::OrderStatus;
use crate::models::product::Product;
use crate::models::{require, Keyed};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "payment_method", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
  Upi,
  Cash,
}

impl PaymentMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentMethod::Upi => "upi",
      PaymentMethod::Cash => "cash",
    }
  }

  /// UPI payments are verified by hand against an uploaded screenshot.
  pub fn requires_proof(&self) -> bool {
    matches!(self, PaymentMethod::Upi)
  }
}

impl std::fmt::Display for PaymentMethod {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryContact {
  pub full_name: String,
  pub phone: String,
  pub address: String,
  #[serde(default)]
  pub notes: Option<String>,
}

impl DeliveryContact {
  pub fn validate(&self) -> ShopResult<()> {
    require(&self.full_name, "full name")?;
    require(&self.phone, "phone")?;
    require(&self.address, "address")?;
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub full_name: String,
  pub phone: String,
  pub address: String,
  pub notes: Option<String>,
  pub total_amount: Decimal,
  pub payment_method: PaymentMethod,
  pub payment_proof_url: Option<String>,
  pub order_status: OrderStatus,
  pub created_at: DateTime<Utc>,
}

impl Keyed for Order {
  fn key(&self) -> Uuid {
    self.id
  }
}

/// Line item. `price` is the unit price captured at checkout and is never
/// rewritten when the product's catalog price changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemDetail {
  #[serde(flatten)]
  pub item: OrderItem,
  /// Embedded product row, absent if it could not be resolved.
  pub products: Option<Product>,
}

/// An order with its items and their products embedded, the shape the
/// customer's order list renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWithItems {
  #[serde(flatten)]
  pub order: Order,
  pub order_items: Vec<OrderItemDetail>,
}

impl Keyed for OrderWithItems {
  fn key(&self) -> Uuid {
    self.order.id
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
  pub user_id: Uuid,
  pub contact: DeliveryContact,
  pub total_amount: Decimal,
  pub payment_method: PaymentMethod,
  pub payment_proof_url: Option<String>,
}

impl NewOrder {
  /// Status a freshly created order starts in.
  pub fn initial_status(&self) -> OrderStatus {
    OrderStatus::initial_for(self.payment_method)
  }

  pub fn validate(&self) -> ShopResult<()> {
    self.contact.validate()?;
    if self.total_amount <= Decimal::ZERO {
      return Err(ShopError::Validation("order total must be positive".to_string()));
    }
    if self.payment_method.requires_proof() && self.payment_proof_url.is_none() {
      return Err(ShopError::Validation(
        "a payment proof is required for UPI orders".to_string(),
      ));
    }
    Ok(())
  }

  pub fn into_order(self, id: Uuid, created_at: DateTime<Utc>) -> Order {
    let order_status = self.initial_status();
    Order {
      id,
      user_id: self.user_id,
      full_name: self.contact.full_name,
      phone: self.contact.phone,
      address: self.contact.address,
      notes: self.contact.notes,
      total_amount: self.total_amount,
      payment_method: self.payment_method,
      payment_proof_url: self.payment_proof_url,
      order_status,
      created_at,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderItem {
  pub product_id: Uuid,
  pub quantity: i32,
  pub price: Decimal,
}

impl NewOrderItem {
  pub fn validate(&self) -> ShopResult<()> {
    if self.quantity <= 0 {
      return Err(ShopError::Validation("item quantity must be positive".to_string()));
    }
    if self.price < Decimal::ZERO {
      return Err(ShopError::Validation("item price cannot be negative".to_string()));
    }
    Ok(())
  }
}
