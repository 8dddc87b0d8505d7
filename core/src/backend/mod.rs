// shopfront/src/backend/mod.rs

//! Contracts for the three external collaborators: the table store, the
//! object store and the identity provider. `MemoryBackend` implements all of
//! them in-process; the server crate implements them on Postgres and disk.

pub mod memory;

pub use memory::MemoryBackend;

use crate::error::ShopResult;
use crate::lifecycle::{OrderStatus, ServiceStatus};
use crate::models::{
  Banner, BannerDraft, DashboardStats, Enquiry, NewEnquiry, NewOrder, NewOrderItem, NewProduct, NewReview,
  NewServiceRequest, Order, OrderWithItems, Product, Review, Role, ServiceRequest, StockStatus, UserProfile,
};
use crate::realtime::ChangeHub;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const PRODUCT_IMAGES_BUCKET: &str = "product-images";
pub const BANNERS_BUCKET: &str = "banners";
pub const PAYMENT_PROOFS_BUCKET: &str = "payment-proofs";
pub const SERVICE_UPLOADS_BUCKET: &str = "service-uploads";

pub const BUCKETS: [&str; 4] = [
  PRODUCT_IMAGES_BUCKET,
  BANNERS_BUCKET,
  PAYMENT_PROOFS_BUCKET,
  SERVICE_UPLOADS_BUCKET,
];

/// Lower-case alphanumeric token for object keys.
pub fn random_token(len: usize) -> String {
  use rand::distributions::Alphanumeric;
  use rand::Rng;
  rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(len)
    .map(|b| char::from(b).to_ascii_lowercase())
    .collect()
}

/// Account emails are compared and stored trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
  email.trim().to_lowercase()
}

/// Filters for the admin order table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQuery {
  #[serde(default)]
  pub status: Option<OrderStatus>,
  #[serde(default)]
  pub user_id: Option<Uuid>,
}

#[async_trait]
pub trait Store: Send + Sync {
  // products

  /// Newest first. Archived products are left out unless asked for.
  async fn list_products(&self, include_archived: bool) -> ShopResult<Vec<Product>>;
  async fn get_product(&self, id: Uuid) -> ShopResult<Product>;
  async fn insert_product(&self, draft: NewProduct) -> ShopResult<Product>;
  async fn update_product(&self, id: Uuid, draft: NewProduct) -> ShopResult<Product>;
  /// Fails with `ReferencedByOrders` while any order item points at it.
  async fn delete_product(&self, id: Uuid) -> ShopResult<()>;
  async fn set_product_archived(&self, id: Uuid, archived: bool) -> ShopResult<Product>;
  async fn update_stock_status(&self, id: Uuid, status: StockStatus) -> ShopResult<Product>;
  async fn update_product_price(&self, id: Uuid, price: Decimal) -> ShopResult<Product>;

  // orders

  /// Inserts the order and all of its items atomically.
  async fn create_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> ShopResult<OrderWithItems>;
  async fn get_order(&self, id: Uuid) -> ShopResult<Order>;
  async fn get_order_with_items(&self, id: Uuid) -> ShopResult<OrderWithItems>;
  /// Newest first.
  async fn list_orders(&self, query: OrderQuery) -> ShopResult<Vec<Order>>;
  /// Newest first, items and products embedded.
  async fn list_orders_with_items(&self, user_id: Uuid) -> ShopResult<Vec<OrderWithItems>>;
  /// Compare-and-set: writes `to` only while the row still holds `expected`,
  /// otherwise `Conflict`.
  async fn update_order_status(&self, id: Uuid, expected: OrderStatus, to: OrderStatus) -> ShopResult<Order>;

  // services

  async fn insert_service(&self, request: NewServiceRequest) -> ShopResult<ServiceRequest>;
  async fn get_service(&self, id: Uuid) -> ShopResult<ServiceRequest>;
  /// Newest first; all users when `user_id` is `None`.
  async fn list_services(&self, user_id: Option<Uuid>) -> ShopResult<Vec<ServiceRequest>>;
  async fn update_service_status(&self, id: Uuid, status: ServiceStatus) -> ShopResult<ServiceRequest>;
  async fn update_service_technician(&self, id: Uuid, technician: Option<String>) -> ShopResult<ServiceRequest>;

  // banners

  async fn list_banners(&self, active_only: bool) -> ShopResult<Vec<Banner>>;
  async fn get_banner(&self, id: Uuid) -> ShopResult<Banner>;
  async fn insert_banner(&self, draft: BannerDraft) -> ShopResult<Banner>;
  async fn update_banner(&self, id: Uuid, draft: BannerDraft) -> ShopResult<Banner>;
  async fn set_banner_active(&self, id: Uuid, active: bool) -> ShopResult<Banner>;
  /// Returns the deleted row so its image can be removed.
  async fn delete_banner(&self, id: Uuid) -> ShopResult<Banner>;

  // enquiries and reviews

  async fn insert_enquiry(&self, enquiry: NewEnquiry) -> ShopResult<Enquiry>;
  async fn list_enquiries(&self) -> ShopResult<Vec<Enquiry>>;
  async fn insert_review(&self, review: NewReview) -> ShopResult<Review>;
  async fn list_reviews(&self, limit: usize) -> ShopResult<Vec<Review>>;

  // profiles

  async fn get_profile(&self, user_id: Uuid) -> ShopResult<Option<UserProfile>>;
  async fn upsert_profile(&self, user_id: Uuid, email: &str, role: Role) -> ShopResult<UserProfile>;

  async fn dashboard_stats(&self) -> ShopResult<DashboardStats>;
}

/// A file handed to the object store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
  pub file_name: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Upload {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Upload")
      .field("file_name", &self.file_name)
      .field("content_type", &self.content_type)
      .field("len", &self.bytes.len())
      .finish()
  }
}

impl Upload {
  pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
    Self {
      file_name: file_name.into(),
      content_type: content_type.into(),
      bytes,
    }
  }

  /// Lower-cased extension of the original file name, `jpg` when absent.
  pub fn extension(&self) -> String {
    std::path::Path::new(&self.file_name)
      .extension()
      .and_then(|ext| ext.to_str())
      .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
      .map(|ext| ext.to_ascii_lowercase())
      .unwrap_or_else(|| "jpg".to_string())
  }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
  /// Stores `file` under `bucket/key` and returns its public URL.
  async fn upload(&self, bucket: &str, key: &str, file: Upload) -> ShopResult<String>;
  async fn download(&self, bucket: &str, key: &str) -> ShopResult<Upload>;
  async fn remove(&self, bucket: &str, keys: &[String]) -> ShopResult<()>;
  fn public_url(&self, bucket: &str, key: &str) -> String;

  /// Inverse of `public_url` for URLs this store handed out.
  fn key_from_url(&self, bucket: &str, url: &str) -> Option<String> {
    let prefix = self.public_url(bucket, "");
    url
      .strip_prefix(&prefix)
      .map(|key| key.split(['?', '#']).next().unwrap_or(key).to_string())
      .filter(|key| !key.is_empty())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
  pub id: Uuid,
  pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub access_token: String,
  pub user: AuthUser,
  pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
  SignedIn { user: AuthUser },
  SignedOut { user_id: Uuid },
}

#[async_trait]
pub trait Identity: Send + Sync {
  /// Creates the account and signs it in.
  async fn sign_up(&self, email: &str, password: &str) -> ShopResult<Session>;
  async fn sign_in_with_password(&self, email: &str, password: &str) -> ShopResult<Session>;
  async fn sign_out(&self, access_token: &str) -> ShopResult<()>;
  /// `None` for unknown or expired tokens.
  async fn get_session(&self, access_token: &str) -> ShopResult<Option<Session>>;

  async fn get_user(&self, access_token: &str) -> ShopResult<Option<AuthUser>> {
    Ok(self.get_session(access_token).await?.map(|session| session.user))
  }

  fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// The collaborators a storefront or server is wired with.
#[derive(Clone)]
pub struct Backend {
  pub store: Arc<dyn Store>,
  pub objects: Arc<dyn ObjectStore>,
  pub identity: Arc<dyn Identity>,
  pub changes: ChangeHub,
}

impl Backend {
  pub fn new(
    store: Arc<dyn Store>,
    objects: Arc<dyn ObjectStore>,
    identity: Arc<dyn Identity>,
    changes: ChangeHub,
  ) -> Self {
    Self {
      store,
      objects,
      identity,
      changes,
    }
  }
}

impl std::fmt::Debug for Backend {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Backend")
      .field("change_receivers", &self.changes.receiver_count())
      .finish_non_exhaustive()
  }
}
