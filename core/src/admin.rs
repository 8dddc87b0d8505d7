// shopfront/src/admin.rs

//! Back-office operations. Callers are expected to have passed the
//! `RoleGate` first; nothing here re-checks the role.

use crate::backend::{random_token, Backend, OrderQuery, Upload, BANNERS_BUCKET, PRODUCT_IMAGES_BUCKET};
use crate::error::{ShopError, ShopResult};
use crate::lifecycle::{OrderAction, OrderLifecycle, OrderStatus, ServiceLifecycle, ServiceStatus, TransitionPolicy};
use crate::models::{
  Banner, BannerDraft, DashboardStats, Enquiry, NewProduct, Order, OrderWithItems, Product, ServiceRequest,
  StockStatus,
};
use crate::realtime::{ChangeFilter, Table};
use crate::reconcile::{fetcher, RefetchFeed, RefetchView};
use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

#[derive(Clone)]
pub struct AdminConsole {
  backend: Backend,
  orders: OrderLifecycle,
  services: ServiceLifecycle,
}

impl AdminConsole {
  pub fn new(backend: Backend, policy: TransitionPolicy) -> Self {
    Self {
      orders: OrderLifecycle::new(Arc::clone(&backend.store), policy),
      services: ServiceLifecycle::new(Arc::clone(&backend.store)),
      backend,
    }
  }

  // --- orders ---

  pub async fn list_orders(&self, status: Option<OrderStatus>) -> ShopResult<Vec<Order>> {
    self
      .backend
      .store
      .list_orders(OrderQuery {
        status,
        ..OrderQuery::default()
      })
      .await
  }

  pub async fn order_detail(&self, order_id: Uuid) -> ShopResult<OrderWithItems> {
    self.backend.store.get_order_with_items(order_id).await
  }

  pub async fn approve_order(&self, order_id: Uuid) -> ShopResult<Order> {
    self.orders.apply(order_id, OrderAction::Approve).await
  }

  pub async fn reject_order(&self, order_id: Uuid) -> ShopResult<Order> {
    self.orders.apply(order_id, OrderAction::Reject).await
  }

  pub async fn set_order_status(&self, order_id: Uuid, to: OrderStatus) -> ShopResult<Order> {
    self.orders.set_status(order_id, to).await
  }

  /// The admin order table: refetched in full on every change.
  pub async fn watch_orders(&self, status: Option<OrderStatus>) -> ShopResult<RefetchFeed<Order>> {
    let subscription = self.backend.changes.subscribe(ChangeFilter::table(Table::Orders));
    let store = Arc::clone(&self.backend.store);
    let fetch = fetcher(move || {
      let store = Arc::clone(&store);
      async move {
        store
          .list_orders(OrderQuery {
            status,
            ..OrderQuery::default()
          })
          .await
      }
    });
    RefetchFeed::open(subscription, fetch).await
  }

  // --- services ---

  pub async fn list_services(&self) -> ShopResult<Vec<ServiceRequest>> {
    self.backend.store.list_services(None).await
  }

  pub async fn set_service_status(&self, service_id: Uuid, to: ServiceStatus) -> ShopResult<ServiceRequest> {
    self.services.set_status(service_id, to).await
  }

  /// Shows the new status in `view` at once and rolls it back if the write
  /// fails.
  pub async fn set_service_status_optimistic(
    &self,
    view: &mut RefetchView<ServiceRequest>,
    service_id: Uuid,
    to: ServiceStatus,
  ) -> ShopResult<ServiceRequest> {
    view
      .optimistic(service_id, |s| s.status = to, self.services.set_status(service_id, to))
      .await
  }

  pub async fn assign_technician(&self, service_id: Uuid, technician: &str) -> ShopResult<ServiceRequest> {
    self.services.assign_technician(service_id, technician).await
  }

  pub async fn watch_services(&self) -> ShopResult<RefetchFeed<ServiceRequest>> {
    let subscription = self.backend.changes.subscribe(ChangeFilter::table(Table::Services));
    let store = Arc::clone(&self.backend.store);
    let fetch = fetcher(move || {
      let store = Arc::clone(&store);
      async move { store.list_services(None).await }
    });
    RefetchFeed::open(subscription, fetch).await
  }

  // --- products ---

  /// Active products only, as the product table shows them.
  pub async fn list_products(&self) -> ShopResult<Vec<Product>> {
    self.backend.store.list_products(false).await
  }

  #[instrument(name = "AdminConsole::create_product", skip_all, err(Display))]
  pub async fn create_product(&self, mut draft: NewProduct, image: Option<Upload>) -> ShopResult<Product> {
    draft.validate()?;
    let uploaded = match image {
      Some(image) => Some(self.upload_image(PRODUCT_IMAGES_BUCKET, image).await?),
      None => None,
    };
    if uploaded.is_some() {
      draft.image_url = uploaded.clone();
    }
    let write = self.backend.store.insert_product(draft);
    self.commit_or_discard(PRODUCT_IMAGES_BUCKET, uploaded.as_deref(), write).await
  }

  /// A new image is stored before the row is written. The replaced image is
  /// removed only once the row points away from it; a failed write removes
  /// the new image instead.
  #[instrument(name = "AdminConsole::update_product", skip(self, draft, image), err(Display))]
  pub async fn update_product(&self, product_id: Uuid, mut draft: NewProduct, image: Option<Upload>) -> ShopResult<Product> {
    draft.validate()?;
    let current = self.backend.store.get_product(product_id).await?;
    let uploaded = match image {
      Some(image) => Some(self.upload_image(PRODUCT_IMAGES_BUCKET, image).await?),
      None => None,
    };
    match &uploaded {
      Some(url) => draft.image_url = Some(url.clone()),
      None if draft.image_url.is_none() => draft.image_url = current.image_url.clone(),
      None => {}
    }

    let write = self.backend.store.update_product(product_id, draft);
    let product = self
      .commit_or_discard(PRODUCT_IMAGES_BUCKET, uploaded.as_deref(), write)
      .await?;
    if let (Some(old), Some(_)) = (&current.image_url, &uploaded) {
      if product.image_url.as_deref() != Some(old.as_str()) {
        self.remove_image(PRODUCT_IMAGES_BUCKET, old).await;
      }
    }
    Ok(product)
  }

  /// Hard delete. A product still referenced by orders fails with
  /// `ReferencedByOrders`; the caller may then `archive_product`.
  #[instrument(name = "AdminConsole::delete_product", skip(self), err(Display))]
  pub async fn delete_product(&self, product_id: Uuid) -> ShopResult<()> {
    let product = self.backend.store.get_product(product_id).await?;
    self.backend.store.delete_product(product_id).await?;
    if let Some(url) = &product.image_url {
      self.remove_image(PRODUCT_IMAGES_BUCKET, url).await;
    }
    Ok(())
  }

  pub async fn archive_product(&self, product_id: Uuid) -> ShopResult<Product> {
    let product = self.backend.store.set_product_archived(product_id, true).await?;
    event!(Level::INFO, %product_id, "Product archived.");
    Ok(product)
  }

  pub async fn set_stock_status(&self, product_id: Uuid, status: StockStatus) -> ShopResult<Product> {
    self.backend.store.update_stock_status(product_id, status).await
  }

  pub async fn quick_stock_update(
    &self,
    view: &mut RefetchView<Product>,
    product_id: Uuid,
    status: StockStatus,
  ) -> ShopResult<Product> {
    view
      .optimistic(
        product_id,
        |p| p.stock_status = status,
        self.backend.store.update_stock_status(product_id, status),
      )
      .await
  }

  /// Existing order items keep the price they were sold at.
  pub async fn quick_price_update(&self, product_id: Uuid, price: Decimal) -> ShopResult<Product> {
    if price <= Decimal::ZERO {
      return Err(ShopError::Validation("price must be greater than zero".to_string()));
    }
    self.backend.store.update_product_price(product_id, price).await
  }

  pub async fn watch_products(&self) -> ShopResult<RefetchFeed<Product>> {
    let subscription = self.backend.changes.subscribe(ChangeFilter::table(Table::Products));
    let store = Arc::clone(&self.backend.store);
    let fetch = fetcher(move || {
      let store = Arc::clone(&store);
      async move { store.list_products(false).await }
    });
    RefetchFeed::open(subscription, fetch).await
  }

  // --- banners ---

  pub async fn list_banners(&self) -> ShopResult<Vec<Banner>> {
    self.backend.store.list_banners(false).await
  }

  #[instrument(name = "AdminConsole::create_banner", skip_all, err(Display))]
  pub async fn create_banner(&self, mut draft: BannerDraft, image: Option<Upload>) -> ShopResult<Banner> {
    let uploaded = match image {
      Some(image) => Some(self.upload_image(BANNERS_BUCKET, image).await?),
      None => None,
    };
    if let Some(url) = &uploaded {
      draft.image_url = url.clone();
    }
    let store = Arc::clone(&self.backend.store);
    let write = async move {
      draft.validate()?;
      store.insert_banner(draft).await
    };
    self.commit_or_discard(BANNERS_BUCKET, uploaded.as_deref(), write).await
  }

  /// Same ordering as `update_product`.
  #[instrument(name = "AdminConsole::update_banner", skip(self, draft, image), err(Display))]
  pub async fn update_banner(&self, banner_id: Uuid, mut draft: BannerDraft, image: Option<Upload>) -> ShopResult<Banner> {
    let current = self.backend.store.get_banner(banner_id).await?;
    let uploaded = match image {
      Some(image) => Some(self.upload_image(BANNERS_BUCKET, image).await?),
      None => None,
    };
    match &uploaded {
      Some(url) => draft.image_url = url.clone(),
      None if draft.image_url.trim().is_empty() => draft.image_url = current.image_url.clone(),
      None => {}
    }

    let store = Arc::clone(&self.backend.store);
    let write = async move {
      draft.validate()?;
      store.update_banner(banner_id, draft).await
    };
    let banner = self.commit_or_discard(BANNERS_BUCKET, uploaded.as_deref(), write).await?;
    if uploaded.is_some() && banner.image_url != current.image_url {
      self.remove_image(BANNERS_BUCKET, &current.image_url).await;
    }
    Ok(banner)
  }

  pub async fn toggle_banner(&self, banner_id: Uuid) -> ShopResult<Banner> {
    let current = self.backend.store.get_banner(banner_id).await?;
    self.backend.store.set_banner_active(banner_id, !current.active).await
  }

  pub async fn delete_banner(&self, banner_id: Uuid) -> ShopResult<()> {
    let removed = self.backend.store.delete_banner(banner_id).await?;
    self.remove_image(BANNERS_BUCKET, &removed.image_url).await;
    Ok(())
  }

  // --- enquiries and dashboard ---

  pub async fn list_enquiries(&self) -> ShopResult<Vec<Enquiry>> {
    self.backend.store.list_enquiries().await
  }

  pub async fn dashboard_stats(&self) -> ShopResult<DashboardStats> {
    self.backend.store.dashboard_stats().await
  }

  /// Awaits `write`; when it fails, an image uploaded for it is removed.
  async fn commit_or_discard<T>(
    &self,
    bucket: &str,
    uploaded: Option<&str>,
    write: impl Future<Output = ShopResult<T>>,
  ) -> ShopResult<T> {
    let result = write.await;
    if let (Err(e), Some(url)) = (&result, uploaded) {
      event!(Level::WARN, bucket, error = %e, "Row write failed, discarding the new image.");
      self.remove_image(bucket, url).await;
    }
    result
  }

  async fn upload_image(&self, bucket: &str, image: Upload) -> ShopResult<String> {
    let key = format!("{}_{}.{}", Utc::now().timestamp_millis(), random_token(7), image.extension());
    self.backend.objects.upload(bucket, &key, image).await
  }

  /// Failures are logged, not returned.
  async fn remove_image(&self, bucket: &str, url: &str) {
    let Some(key) = self.backend.objects.key_from_url(bucket, url) else {
      return;
    };
    if let Err(e) = self.backend.objects.remove(bucket, &[key]).await {
      event!(Level::WARN, bucket, error = %e, "Failed to remove stored image.");
    }
  }
}
