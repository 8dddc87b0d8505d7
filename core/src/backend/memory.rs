// shopfront/src/backend/memory.rs

//! In-process implementation of every backend contract. Used by tests, demos
//! and the server's handler tests. Enforces the same constraints the
//! Postgres schema does (product references, compare-and-set status writes)
//! and publishes a change event after every committed write.

use crate::backend::{
  normalize_email, AuthEvent, AuthUser, Backend, Identity, ObjectStore, OrderQuery, Session, Store, Upload,
};
use crate::error::{ShopError, ShopResult};
use crate::lifecycle::{OrderStatus, ServiceStatus};
use crate::models::{
  Banner, BannerDraft, DashboardStats, Enquiry, NewEnquiry, NewOrder, NewOrderItem, NewProduct, NewReview,
  NewServiceRequest, Order, OrderItem, OrderItemDetail, OrderWithItems, Product, Review, Role, ServiceRequest,
  StockStatus, UserProfile,
};
use crate::realtime::{ChangeHub, ChangeKind, Table};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{event, Level};
use uuid::Uuid;

const SESSION_TTL_HOURS: i64 = 24 * 7;

/// Failures a test can switch on to exercise error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
  /// Every write to this table fails as a store error.
  Writes(Table),
  Uploads,
}

#[derive(Default)]
struct Tables {
  products: Vec<Product>,
  orders: Vec<Order>,
  order_items: Vec<OrderItem>,
  services: Vec<ServiceRequest>,
  banners: Vec<Banner>,
  enquiries: Vec<Enquiry>,
  reviews: Vec<Review>,
  profiles: HashMap<Uuid, UserProfile>,
}

struct Account {
  user: AuthUser,
  password: String,
}

struct Inner {
  tables: Mutex<Tables>,
  objects: Mutex<HashMap<(String, String), Upload>>,
  accounts: Mutex<HashMap<String, Account>>,
  sessions: Mutex<HashMap<String, Session>>,
  auth_events: broadcast::Sender<AuthEvent>,
  changes: ChangeHub,
  failures: Mutex<HashSet<Failure>>,
  calls: AtomicUsize,
  base_url: String,
}

#[derive(Clone)]
pub struct MemoryBackend {
  inner: Arc<Inner>,
}

impl Default for MemoryBackend {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::with_hub(ChangeHub::new())
  }

  pub fn with_hub(changes: ChangeHub) -> Self {
    let (auth_events, _) = broadcast::channel(64);
    Self {
      inner: Arc::new(Inner {
        tables: Mutex::new(Tables::default()),
        objects: Mutex::new(HashMap::new()),
        accounts: Mutex::new(HashMap::new()),
        sessions: Mutex::new(HashMap::new()),
        auth_events,
        changes,
        failures: Mutex::new(HashSet::new()),
        calls: AtomicUsize::new(0),
        base_url: "memory://storage".to_string(),
      }),
    }
  }

  /// Bundles this instance as every collaborator of a `Backend`.
  pub fn backend(&self) -> Backend {
    Backend::new(
      Arc::new(self.clone()),
      Arc::new(self.clone()),
      Arc::new(self.clone()),
      self.inner.changes.clone(),
    )
  }

  pub fn changes(&self) -> &ChangeHub {
    &self.inner.changes
  }

  pub fn fail(&self, failure: Failure) {
    self.inner.failures.lock().insert(failure);
  }

  pub fn heal(&self, failure: Failure) {
    self.inner.failures.lock().remove(&failure);
  }

  /// Number of backend calls made so far, reads included.
  pub fn calls(&self) -> usize {
    self.inner.calls.load(Ordering::SeqCst)
  }

  pub fn object_count(&self, bucket: &str) -> usize {
    self.inner.objects.lock().keys().filter(|(b, _)| b == bucket).count()
  }

  pub fn order_item_count(&self, order_id: Uuid) -> usize {
    self.inner.tables.lock().order_items.iter().filter(|item| item.order_id == order_id).count()
  }

  /// Creates an account with the given role directly, bypassing sign-up.
  pub fn seed_account(&self, email: &str, password: &str, role: Role) -> AuthUser {
    let user = AuthUser {
      id: Uuid::new_v4(),
      email: normalize_email(email),
    };
    self.inner.accounts.lock().insert(
      user.email.clone(),
      Account {
        user: user.clone(),
        password: password.to_string(),
      },
    );
    self.inner.tables.lock().profiles.insert(
      user.id,
      UserProfile {
        id: user.id,
        email: user.email.clone(),
        role,
        created_at: Utc::now(),
      },
    );
    user
  }

  fn touch(&self) {
    self.inner.calls.fetch_add(1, Ordering::SeqCst);
  }

  fn write_guard(&self, table: Table) -> ShopResult<()> {
    self.touch();
    if self.inner.failures.lock().contains(&Failure::Writes(table)) {
      return Err(ShopError::Store {
        source: anyhow::anyhow!("write to '{}' rejected", table),
      });
    }
    Ok(())
  }

  fn publish<T: serde::Serialize>(&self, table: Table, kind: ChangeKind, new: Option<&T>, old: Option<&T>) {
    self.inner.changes.publish_row(table, kind, new, old);
  }

  fn with_items(tables: &Tables, order: &Order) -> OrderWithItems {
    let order_items = tables
      .order_items
      .iter()
      .filter(|item| item.order_id == order.id)
      .map(|item| OrderItemDetail {
        item: item.clone(),
        products: tables.products.iter().find(|p| p.id == item.product_id).cloned(),
      })
      .collect();
    OrderWithItems {
      order: order.clone(),
      order_items,
    }
  }

  fn update_row<T: Clone>(
    rows: &mut [T],
    entity: &'static str,
    id: Uuid,
    key: impl Fn(&T) -> Uuid,
    f: impl FnOnce(&mut T),
  ) -> ShopResult<(T, T)> {
    let row = rows
      .iter_mut()
      .find(|row| key(row) == id)
      .ok_or_else(|| ShopError::not_found(entity, id))?;
    let old = row.clone();
    f(row);
    Ok((old, row.clone()))
  }

  fn open_session(&self, user: AuthUser) -> Session {
    let session = Session {
      access_token: Uuid::new_v4().simple().to_string(),
      user: user.clone(),
      expires_at: Utc::now() + Duration::hours(SESSION_TTL_HOURS),
    };
    self
      .inner
      .sessions
      .lock()
      .insert(session.access_token.clone(), session.clone());
    let _ = self.inner.auth_events.send(AuthEvent::SignedIn { user });
    session
  }
}

#[async_trait]
impl Store for MemoryBackend {
  async fn list_products(&self, include_archived: bool) -> ShopResult<Vec<Product>> {
    self.touch();
    let tables = self.inner.tables.lock();
    Ok(
      tables
        .products
        .iter()
        .rev()
        .filter(|p| include_archived || !p.is_archived)
        .cloned()
        .collect(),
    )
  }

  async fn get_product(&self, id: Uuid) -> ShopResult<Product> {
    self.touch();
    let tables = self.inner.tables.lock();
    tables
      .products
      .iter()
      .find(|p| p.id == id)
      .cloned()
      .ok_or_else(|| ShopError::not_found("product", id))
  }

  async fn insert_product(&self, draft: NewProduct) -> ShopResult<Product> {
    self.write_guard(Table::Products)?;
    let product = draft.into_product(Uuid::new_v4(), Utc::now());
    self.inner.tables.lock().products.push(product.clone());
    self.publish(Table::Products, ChangeKind::Insert, Some(&product), None);
    Ok(product)
  }

  async fn update_product(&self, id: Uuid, draft: NewProduct) -> ShopResult<Product> {
    self.write_guard(Table::Products)?;
    let (old, new) = {
      let mut tables = self.inner.tables.lock();
      Self::update_row(&mut tables.products, "product", id, |p| p.id, |p| {
        let replacement = draft.into_product(p.id, p.created_at);
        *p = Product {
          is_archived: p.is_archived,
          ..replacement
        };
      })?
    };
    self.publish(Table::Products, ChangeKind::Update, Some(&new), Some(&old));
    Ok(new)
  }

  async fn delete_product(&self, id: Uuid) -> ShopResult<()> {
    self.write_guard(Table::Products)?;
    let removed = {
      let mut tables = self.inner.tables.lock();
      if tables.order_items.iter().any(|item| item.product_id == id) {
        return Err(ShopError::referenced(id));
      }
      let index = tables
        .products
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| ShopError::not_found("product", id))?;
      tables.products.remove(index)
    };
    self.publish(Table::Products, ChangeKind::Delete, None, Some(&removed));
    Ok(())
  }

  async fn set_product_archived(&self, id: Uuid, archived: bool) -> ShopResult<Product> {
    self.write_guard(Table::Products)?;
    let (old, new) = {
      let mut tables = self.inner.tables.lock();
      Self::update_row(&mut tables.products, "product", id, |p| p.id, |p| p.is_archived = archived)?
    };
    self.publish(Table::Products, ChangeKind::Update, Some(&new), Some(&old));
    Ok(new)
  }

  async fn update_stock_status(&self, id: Uuid, status: StockStatus) -> ShopResult<Product> {
    self.write_guard(Table::Products)?;
    let (old, new) = {
      let mut tables = self.inner.tables.lock();
      Self::update_row(&mut tables.products, "product", id, |p| p.id, |p| p.stock_status = status)?
    };
    self.publish(Table::Products, ChangeKind::Update, Some(&new), Some(&old));
    Ok(new)
  }

  async fn update_product_price(&self, id: Uuid, price: Decimal) -> ShopResult<Product> {
    self.write_guard(Table::Products)?;
    let (old, new) = {
      let mut tables = self.inner.tables.lock();
      Self::update_row(&mut tables.products, "product", id, |p| p.id, |p| p.price = price)?
    };
    self.publish(Table::Products, ChangeKind::Update, Some(&new), Some(&old));
    Ok(new)
  }

  async fn create_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> ShopResult<OrderWithItems> {
    self.write_guard(Table::Orders)?;
    self.write_guard(Table::OrderItems)?;
    order.validate()?;
    for item in &items {
      item.validate()?;
    }

    let (created, rows) = {
      let mut tables = self.inner.tables.lock();
      if let Some(missing) = items
        .iter()
        .find(|item| !tables.products.iter().any(|p| p.id == item.product_id))
      {
        return Err(ShopError::not_found("product", missing.product_id));
      }
      let order = order.into_order(Uuid::new_v4(), Utc::now());
      let rows: Vec<OrderItem> = items
        .into_iter()
        .map(|item| OrderItem {
          id: Uuid::new_v4(),
          order_id: order.id,
          product_id: item.product_id,
          quantity: item.quantity,
          price: item.price,
        })
        .collect();
      tables.orders.push(order.clone());
      tables.order_items.extend(rows.iter().cloned());
      (Self::with_items(&tables, &order), rows)
    };

    self.publish(Table::Orders, ChangeKind::Insert, Some(&created.order), None);
    for row in &rows {
      self.publish(Table::OrderItems, ChangeKind::Insert, Some(row), None);
    }
    Ok(created)
  }

  async fn get_order(&self, id: Uuid) -> ShopResult<Order> {
    self.touch();
    let tables = self.inner.tables.lock();
    tables
      .orders
      .iter()
      .find(|o| o.id == id)
      .cloned()
      .ok_or_else(|| ShopError::not_found("order", id))
  }

  async fn get_order_with_items(&self, id: Uuid) -> ShopResult<OrderWithItems> {
    self.touch();
    let tables = self.inner.tables.lock();
    let order = tables
      .orders
      .iter()
      .find(|o| o.id == id)
      .ok_or_else(|| ShopError::not_found("order", id))?;
    Ok(Self::with_items(&tables, order))
  }

  async fn list_orders(&self, query: OrderQuery) -> ShopResult<Vec<Order>> {
    self.touch();
    let tables = self.inner.tables.lock();
    Ok(
      tables
        .orders
        .iter()
        .rev()
        .filter(|o| query.status.map_or(true, |s| o.order_status == s))
        .filter(|o| query.user_id.map_or(true, |u| o.user_id == u))
        .cloned()
        .collect(),
    )
  }

  async fn list_orders_with_items(&self, user_id: Uuid) -> ShopResult<Vec<OrderWithItems>> {
    self.touch();
    let tables = self.inner.tables.lock();
    Ok(
      tables
        .orders
        .iter()
        .rev()
        .filter(|o| o.user_id == user_id)
        .map(|o| Self::with_items(&tables, o))
        .collect(),
    )
  }

  async fn update_order_status(&self, id: Uuid, expected: OrderStatus, to: OrderStatus) -> ShopResult<Order> {
    self.write_guard(Table::Orders)?;
    let (old, new) = {
      let mut tables = self.inner.tables.lock();
      let order = tables
        .orders
        .iter_mut()
        .find(|o| o.id == id)
        .ok_or_else(|| ShopError::not_found("order", id))?;
      if order.order_status != expected {
        return Err(ShopError::Conflict(format!(
          "order {} is '{}', expected '{}'",
          id, order.order_status, expected
        )));
      }
      let old = order.clone();
      order.order_status = to;
      (old, order.clone())
    };
    self.publish(Table::Orders, ChangeKind::Update, Some(&new), Some(&old));
    Ok(new)
  }

  async fn insert_service(&self, request: NewServiceRequest) -> ShopResult<ServiceRequest> {
    self.write_guard(Table::Services)?;
    let service = request.normalized().into_request(Uuid::new_v4(), Utc::now());
    self.inner.tables.lock().services.push(service.clone());
    self.publish(Table::Services, ChangeKind::Insert, Some(&service), None);
    Ok(service)
  }

  async fn get_service(&self, id: Uuid) -> ShopResult<ServiceRequest> {
    self.touch();
    let tables = self.inner.tables.lock();
    tables
      .services
      .iter()
      .find(|s| s.id == id)
      .cloned()
      .ok_or_else(|| ShopError::not_found("service", id))
  }

  async fn list_services(&self, user_id: Option<Uuid>) -> ShopResult<Vec<ServiceRequest>> {
    self.touch();
    let tables = self.inner.tables.lock();
    Ok(
      tables
        .services
        .iter()
        .rev()
        .filter(|s| user_id.map_or(true, |u| s.user_id == u))
        .cloned()
        .collect(),
    )
  }

  async fn update_service_status(&self, id: Uuid, status: ServiceStatus) -> ShopResult<ServiceRequest> {
    self.write_guard(Table::Services)?;
    let (old, new) = {
      let mut tables = self.inner.tables.lock();
      Self::update_row(&mut tables.services, "service", id, |s| s.id, |s| s.status = status)?
    };
    self.publish(Table::Services, ChangeKind::Update, Some(&new), Some(&old));
    Ok(new)
  }

  async fn update_service_technician(&self, id: Uuid, technician: Option<String>) -> ShopResult<ServiceRequest> {
    self.write_guard(Table::Services)?;
    let (old, new) = {
      let mut tables = self.inner.tables.lock();
      Self::update_row(&mut tables.services, "service", id, |s| s.id, |s| {
        s.technician_name = technician
      })?
    };
    self.publish(Table::Services, ChangeKind::Update, Some(&new), Some(&old));
    Ok(new)
  }

  async fn list_banners(&self, active_only: bool) -> ShopResult<Vec<Banner>> {
    self.touch();
    let tables = self.inner.tables.lock();
    Ok(
      tables
        .banners
        .iter()
        .rev()
        .filter(|b| !active_only || b.active)
        .cloned()
        .collect(),
    )
  }

  async fn get_banner(&self, id: Uuid) -> ShopResult<Banner> {
    self.touch();
    let tables = self.inner.tables.lock();
    tables
      .banners
      .iter()
      .find(|b| b.id == id)
      .cloned()
      .ok_or_else(|| ShopError::not_found("banner", id))
  }

  async fn insert_banner(&self, draft: BannerDraft) -> ShopResult<Banner> {
    self.write_guard(Table::Banners)?;
    let banner = draft.into_banner(Uuid::new_v4(), Utc::now());
    self.inner.tables.lock().banners.push(banner.clone());
    self.publish(Table::Banners, ChangeKind::Insert, Some(&banner), None);
    Ok(banner)
  }

  async fn update_banner(&self, id: Uuid, draft: BannerDraft) -> ShopResult<Banner> {
    self.write_guard(Table::Banners)?;
    let (old, new) = {
      let mut tables = self.inner.tables.lock();
      Self::update_row(&mut tables.banners, "banner", id, |b| b.id, |b| {
        b.title = draft.title;
        b.subtitle = draft.subtitle;
        b.image_url = draft.image_url;
      })?
    };
    self.publish(Table::Banners, ChangeKind::Update, Some(&new), Some(&old));
    Ok(new)
  }

  async fn set_banner_active(&self, id: Uuid, active: bool) -> ShopResult<Banner> {
    self.write_guard(Table::Banners)?;
    let (old, new) = {
      let mut tables = self.inner.tables.lock();
      Self::update_row(&mut tables.banners, "banner", id, |b| b.id, |b| b.active = active)?
    };
    self.publish(Table::Banners, ChangeKind::Update, Some(&new), Some(&old));
    Ok(new)
  }

  async fn delete_banner(&self, id: Uuid) -> ShopResult<Banner> {
    self.write_guard(Table::Banners)?;
    let removed = {
      let mut tables = self.inner.tables.lock();
      let index = tables
        .banners
        .iter()
        .position(|b| b.id == id)
        .ok_or_else(|| ShopError::not_found("banner", id))?;
      tables.banners.remove(index)
    };
    self.publish(Table::Banners, ChangeKind::Delete, None, Some(&removed));
    Ok(removed)
  }

  async fn insert_enquiry(&self, enquiry: NewEnquiry) -> ShopResult<Enquiry> {
    self.write_guard(Table::Enquiries)?;
    let enquiry = enquiry.into_enquiry(Uuid::new_v4(), Utc::now());
    self.inner.tables.lock().enquiries.push(enquiry.clone());
    self.publish(Table::Enquiries, ChangeKind::Insert, Some(&enquiry), None);
    Ok(enquiry)
  }

  async fn list_enquiries(&self) -> ShopResult<Vec<Enquiry>> {
    self.touch();
    Ok(self.inner.tables.lock().enquiries.iter().rev().cloned().collect())
  }

  async fn insert_review(&self, review: NewReview) -> ShopResult<Review> {
    self.write_guard(Table::Reviews)?;
    let review = review.into_review(Uuid::new_v4(), Utc::now());
    self.inner.tables.lock().reviews.push(review.clone());
    self.publish(Table::Reviews, ChangeKind::Insert, Some(&review), None);
    Ok(review)
  }

  async fn list_reviews(&self, limit: usize) -> ShopResult<Vec<Review>> {
    self.touch();
    Ok(self.inner.tables.lock().reviews.iter().rev().take(limit).cloned().collect())
  }

  async fn get_profile(&self, user_id: Uuid) -> ShopResult<Option<UserProfile>> {
    self.touch();
    Ok(self.inner.tables.lock().profiles.get(&user_id).cloned())
  }

  async fn upsert_profile(&self, user_id: Uuid, email: &str, role: Role) -> ShopResult<UserProfile> {
    self.write_guard(Table::UserProfiles)?;
    let (old, new) = {
      let mut tables = self.inner.tables.lock();
      let old = tables.profiles.get(&user_id).cloned();
      let profile = UserProfile {
        id: user_id,
        email: email.to_string(),
        role,
        created_at: old.as_ref().map_or_else(Utc::now, |p| p.created_at),
      };
      tables.profiles.insert(user_id, profile.clone());
      (old, profile)
    };
    let kind = if old.is_some() { ChangeKind::Update } else { ChangeKind::Insert };
    self.publish(Table::UserProfiles, kind, Some(&new), old.as_ref());
    Ok(new)
  }

  async fn dashboard_stats(&self) -> ShopResult<DashboardStats> {
    self.touch();
    let tables = self.inner.tables.lock();
    Ok(DashboardStats {
      products: tables.products.len() as i64,
      enquiries: tables.enquiries.len() as i64,
      active_banners: tables.banners.iter().filter(|b| b.active).count() as i64,
    })
  }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
  async fn upload(&self, bucket: &str, key: &str, file: Upload) -> ShopResult<String> {
    self.touch();
    if self.inner.failures.lock().contains(&Failure::Uploads) {
      return Err(ShopError::upload(bucket, "storage unavailable"));
    }
    let mut objects = self.inner.objects.lock();
    let slot = (bucket.to_string(), key.to_string());
    if objects.contains_key(&slot) {
      return Err(ShopError::upload(bucket, format!("object '{}' already exists", key)));
    }
    objects.insert(slot, file);
    Ok(self.public_url(bucket, key))
  }

  async fn download(&self, bucket: &str, key: &str) -> ShopResult<Upload> {
    self.touch();
    self
      .inner
      .objects
      .lock()
      .get(&(bucket.to_string(), key.to_string()))
      .cloned()
      .ok_or_else(|| ShopError::not_found("object", format!("{}/{}", bucket, key)))
  }

  async fn remove(&self, bucket: &str, keys: &[String]) -> ShopResult<()> {
    self.touch();
    let mut objects = self.inner.objects.lock();
    for key in keys {
      objects.remove(&(bucket.to_string(), key.clone()));
    }
    Ok(())
  }

  fn public_url(&self, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", self.inner.base_url, bucket, key)
  }
}

#[async_trait]
impl Identity for MemoryBackend {
  async fn sign_up(&self, email: &str, password: &str) -> ShopResult<Session> {
    self.touch();
    let email = normalize_email(email);
    if email.is_empty() || !email.contains('@') {
      return Err(ShopError::Validation("a valid email is required".to_string()));
    }
    if password.len() < 6 {
      return Err(ShopError::Validation("password must have at least 6 characters".to_string()));
    }
    let user = {
      let mut accounts = self.inner.accounts.lock();
      if accounts.contains_key(&email) {
        return Err(ShopError::Conflict(format!("account '{}' already exists", email)));
      }
      let user = AuthUser {
        id: Uuid::new_v4(),
        email: email.clone(),
      };
      accounts.insert(
        email,
        Account {
          user: user.clone(),
          password: password.to_string(),
        },
      );
      user
    };
    Ok(self.open_session(user))
  }

  async fn sign_in_with_password(&self, email: &str, password: &str) -> ShopResult<Session> {
    self.touch();
    let user = {
      let accounts = self.inner.accounts.lock();
      match accounts.get(&normalize_email(email)) {
        Some(account) if account.password == password => account.user.clone(),
        _ => return Err(ShopError::Unauthenticated),
      }
    };
    Ok(self.open_session(user))
  }

  async fn sign_out(&self, access_token: &str) -> ShopResult<()> {
    self.touch();
    if let Some(session) = self.inner.sessions.lock().remove(access_token) {
      let _ = self.inner.auth_events.send(AuthEvent::SignedOut {
        user_id: session.user.id,
      });
      event!(Level::DEBUG, user_id = %session.user.id, "Session closed.");
    }
    Ok(())
  }

  async fn get_session(&self, access_token: &str) -> ShopResult<Option<Session>> {
    self.touch();
    let mut sessions = self.inner.sessions.lock();
    match sessions.get(access_token) {
      Some(session) if session.expires_at > Utc::now() => Ok(Some(session.clone())),
      Some(_) => {
        sessions.remove(access_token);
        Ok(None)
      }
      None => Ok(None),
    }
  }

  fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
    self.inner.auth_events.subscribe()
  }
}
