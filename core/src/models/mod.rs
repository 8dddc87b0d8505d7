//! Data structures for the storefront's tables.

pub mod content;
pub mod order;
pub mod product;
pub mod profile;
pub mod service;

pub use content::{Banner, BannerDraft, DashboardStats, Enquiry, NewEnquiry, NewReview, Review};
pub use order::{DeliveryContact, NewOrder, NewOrderItem, Order, OrderItem, OrderItemDetail, OrderWithItems, PaymentMethod};
pub use product::{NewProduct, Product, StockStatus};
pub use profile::{Role, UserProfile};
pub use service::{NewServiceRequest, ServiceRequest, ServiceType};

/// Implemented by rows that views key by primary identifier.
pub trait Keyed {
  fn key(&self) -> uuid::Uuid;
}

pub(crate) fn require(value: &str, what: &str) -> crate::error::ShopResult<()> {
  if value.trim().is_empty() {
    return Err(crate::error::ShopError::Validation(format!("{} is required", what)));
  }
  Ok(())
}
