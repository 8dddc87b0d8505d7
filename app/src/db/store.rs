// shopfront_app/src/db/store.rs

use super::{db_err, sql_state};
use async_trait::async_trait;
use serde::Serialize;
use shopfront::backend::OrderQuery;
use shopfront::error::FOREIGN_KEY_VIOLATION;
use shopfront::models::{
  Banner, BannerDraft, DashboardStats, Enquiry, NewEnquiry, NewOrder, NewOrderItem, NewProduct, NewReview,
  NewServiceRequest, Order, OrderItem, OrderItemDetail, OrderWithItems, Product, Review, Role, ServiceRequest,
  StockStatus, UserProfile,
};
use shopfront::realtime::ChangeKind;
use shopfront::{ChangeHub, OrderStatus, ServiceStatus, ShopError, ShopResult, Store, Table};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::QueryAs;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// Table store on Postgres. Every committed write is published to the
/// change hub with its previous row.
#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
  changes: ChangeHub,
}

/// Locks and returns the current row, `NotFound` when it is absent.
async fn locked<T>(tx: &mut Transaction<'_, Postgres>, table: Table, entity: &'static str, id: Uuid) -> ShopResult<T>
where
  T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
  let sql = format!("SELECT * FROM {} WHERE id = $1 FOR UPDATE", table);
  sqlx::query_as::<_, T>(&sql)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?
    .ok_or_else(|| ShopError::not_found(entity, id))
}

impl PgStore {
  pub fn new(pool: PgPool, changes: ChangeHub) -> Self {
    Self { pool, changes }
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  async fn begin(&self) -> ShopResult<Transaction<'static, Postgres>> {
    self.pool.begin().await.map_err(db_err)
  }

  async fn fetch_by_id<T>(&self, table: Table, entity: &'static str, id: Uuid) -> ShopResult<T>
  where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
  {
    let sql = format!("SELECT * FROM {} WHERE id = $1", table);
    sqlx::query_as::<_, T>(&sql)
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_err)?
      .ok_or_else(|| ShopError::not_found(entity, id))
  }

  /// Runs a single-row `UPDATE ... RETURNING *` with the row locked, then
  /// publishes the before and after images.
  async fn update_row<'q, T>(
    &self,
    table: Table,
    entity: &'static str,
    id: Uuid,
    update: QueryAs<'q, Postgres, T, PgArguments>,
  ) -> ShopResult<T>
  where
    T: for<'r> FromRow<'r, PgRow> + Serialize + Send + Unpin,
  {
    let mut tx = self.begin().await?;
    let old: T = locked(&mut tx, table, entity, id).await?;
    let new = update.fetch_one(&mut *tx).await.map_err(db_err)?;
    tx.commit().await.map_err(db_err)?;
    self.changes.publish_row(table, ChangeKind::Update, Some(&new), Some(&old));
    Ok(new)
  }

  /// Embeds items and their products into each order.
  async fn attach_items(&self, orders: Vec<Order>) -> ShopResult<Vec<OrderWithItems>> {
    if orders.is_empty() {
      return Ok(Vec::new());
    }
    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items: Vec<OrderItem> = sqlx::query_as("SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY id")
      .bind(&order_ids)
      .fetch_all(&self.pool)
      .await
      .map_err(db_err)?;

    let mut product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();
    let products: HashMap<Uuid, Product> = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
      .bind(&product_ids)
      .fetch_all(&self.pool)
      .await
      .map_err(db_err)?
      .into_iter()
      .map(|p| (p.id, p))
      .collect();

    let mut by_order: HashMap<Uuid, Vec<OrderItemDetail>> = HashMap::new();
    for item in items {
      let products = products.get(&item.product_id).cloned();
      by_order
        .entry(item.order_id)
        .or_default()
        .push(OrderItemDetail { item, products });
    }
    Ok(
      orders
        .into_iter()
        .map(|order| OrderWithItems {
          order_items: by_order.remove(&order.id).unwrap_or_default(),
          order,
        })
        .collect(),
    )
  }
}

#[async_trait]
impl Store for PgStore {
  async fn list_products(&self, include_archived: bool) -> ShopResult<Vec<Product>> {
    sqlx::query_as("SELECT * FROM products WHERE ($1 OR NOT is_archived) ORDER BY created_at DESC")
      .bind(include_archived)
      .fetch_all(&self.pool)
      .await
      .map_err(db_err)
  }

  async fn get_product(&self, id: Uuid) -> ShopResult<Product> {
    self.fetch_by_id(Table::Products, "product", id).await
  }

  #[instrument(name = "PgStore::insert_product", skip_all, err(Display))]
  async fn insert_product(&self, draft: NewProduct) -> ShopResult<Product> {
    let product: Product = sqlx::query_as(
      r#"INSERT INTO products
           (id, name, brand, screen_size, display_type, price, emi_available, specs, warranty_info,
            stock_status, image_url)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(&draft.name)
    .bind(&draft.brand)
    .bind(&draft.screen_size)
    .bind(&draft.display_type)
    .bind(draft.price)
    .bind(draft.emi_available)
    .bind(&draft.specs)
    .bind(&draft.warranty_info)
    .bind(draft.stock_status)
    .bind(&draft.image_url)
    .fetch_one(&self.pool)
    .await
    .map_err(db_err)?;
    self.changes.publish_row(Table::Products, ChangeKind::Insert, Some(&product), None);
    Ok(product)
  }

  async fn update_product(&self, id: Uuid, draft: NewProduct) -> ShopResult<Product> {
    let update = sqlx::query_as(
      r#"UPDATE products
         SET name = $2, brand = $3, screen_size = $4, display_type = $5, price = $6, emi_available = $7,
             specs = $8, warranty_info = $9, stock_status = $10, image_url = $11
         WHERE id = $1
         RETURNING *"#,
    )
    .bind(id)
    .bind(draft.name)
    .bind(draft.brand)
    .bind(draft.screen_size)
    .bind(draft.display_type)
    .bind(draft.price)
    .bind(draft.emi_available)
    .bind(draft.specs)
    .bind(draft.warranty_info)
    .bind(draft.stock_status)
    .bind(draft.image_url);
    self.update_row(Table::Products, "product", id, update).await
  }

  #[instrument(name = "PgStore::delete_product", skip(self), err(Display))]
  async fn delete_product(&self, id: Uuid) -> ShopResult<()> {
    let mut tx = self.begin().await?;
    let old: Product = locked(&mut tx, Table::Products, "product", id).await?;
    let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
      .bind(id)
      .execute(&mut *tx)
      .await;
    if let Err(e) = deleted {
      if sql_state(&e).as_deref() == Some(FOREIGN_KEY_VIOLATION) {
        event!(Level::INFO, product_id = %id, "Delete refused, product is referenced by orders.");
        return Err(ShopError::referenced(id));
      }
      return Err(db_err(e));
    }
    tx.commit().await.map_err(db_err)?;
    self.changes.publish_row(Table::Products, ChangeKind::Delete, None, Some(&old));
    Ok(())
  }

  async fn set_product_archived(&self, id: Uuid, archived: bool) -> ShopResult<Product> {
    let update = sqlx::query_as("UPDATE products SET is_archived = $2 WHERE id = $1 RETURNING *")
      .bind(id)
      .bind(archived);
    self.update_row(Table::Products, "product", id, update).await
  }

  async fn update_stock_status(&self, id: Uuid, status: StockStatus) -> ShopResult<Product> {
    let update = sqlx::query_as("UPDATE products SET stock_status = $2 WHERE id = $1 RETURNING *")
      .bind(id)
      .bind(status);
    self.update_row(Table::Products, "product", id, update).await
  }

  async fn update_product_price(&self, id: Uuid, price: rust_decimal::Decimal) -> ShopResult<Product> {
    let update = sqlx::query_as("UPDATE products SET price = $2 WHERE id = $1 RETURNING *")
      .bind(id)
      .bind(price);
    self.update_row(Table::Products, "product", id, update).await
  }

  #[instrument(name = "PgStore::create_order", skip_all, fields(items = items.len()), err(Display))]
  async fn create_order(&self, order: NewOrder, items: Vec<NewOrderItem>) -> ShopResult<OrderWithItems> {
    order.validate()?;
    for item in &items {
      item.validate()?;
    }
    let status = order.initial_status();

    let mut tx = self.begin().await?;
    let created: Order = sqlx::query_as(
      r#"INSERT INTO orders
           (id, user_id, full_name, phone, address, notes, total_amount, payment_method, payment_proof_url,
            order_status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(order.user_id)
    .bind(&order.contact.full_name)
    .bind(&order.contact.phone)
    .bind(&order.contact.address)
    .bind(&order.contact.notes)
    .bind(order.total_amount)
    .bind(order.payment_method)
    .bind(&order.payment_proof_url)
    .bind(status)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_err)?;

    let mut rows = Vec::with_capacity(items.len());
    for item in &items {
      let row: OrderItem = sqlx::query_as(
        r#"INSERT INTO order_items (id, order_id, product_id, quantity, price)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING *"#,
      )
      .bind(Uuid::new_v4())
      .bind(created.id)
      .bind(item.product_id)
      .bind(item.quantity)
      .bind(item.price)
      .fetch_one(&mut *tx)
      .await
      .map_err(|e| match sql_state(&e).as_deref() {
        Some(FOREIGN_KEY_VIOLATION) => ShopError::not_found("product", item.product_id),
        _ => db_err(e),
      })?;
      rows.push(row);
    }
    tx.commit().await.map_err(db_err)?;

    self.changes.publish_row(Table::Orders, ChangeKind::Insert, Some(&created), None);
    for row in &rows {
      self.changes.publish_row(Table::OrderItems, ChangeKind::Insert, Some(row), None);
    }

    let mut with_items = self.attach_items(vec![created]).await?;
    with_items
      .pop()
      .ok_or_else(|| ShopError::Internal("created order vanished".to_string()))
  }

  async fn get_order(&self, id: Uuid) -> ShopResult<Order> {
    self.fetch_by_id(Table::Orders, "order", id).await
  }

  async fn get_order_with_items(&self, id: Uuid) -> ShopResult<OrderWithItems> {
    let order = self.get_order(id).await?;
    let mut with_items = self.attach_items(vec![order]).await?;
    with_items.pop().ok_or_else(|| ShopError::not_found("order", id))
  }

  async fn list_orders(&self, query: OrderQuery) -> ShopResult<Vec<Order>> {
    sqlx::query_as(
      r#"SELECT * FROM orders
         WHERE ($1::order_status IS NULL OR order_status = $1)
           AND ($2::uuid IS NULL OR user_id = $2)
         ORDER BY created_at DESC"#,
    )
    .bind(query.status)
    .bind(query.user_id)
    .fetch_all(&self.pool)
    .await
    .map_err(db_err)
  }

  async fn list_orders_with_items(&self, user_id: Uuid) -> ShopResult<Vec<OrderWithItems>> {
    let orders = self
      .list_orders(OrderQuery {
        user_id: Some(user_id),
        ..OrderQuery::default()
      })
      .await?;
    self.attach_items(orders).await
  }

  #[instrument(name = "PgStore::update_order_status", skip(self), err(Display))]
  async fn update_order_status(&self, id: Uuid, expected: OrderStatus, to: OrderStatus) -> ShopResult<Order> {
    let mut tx = self.begin().await?;
    let old: Order = locked(&mut tx, Table::Orders, "order", id).await?;
    if old.order_status != expected {
      return Err(ShopError::Conflict(format!(
        "order {} is '{}', expected '{}'",
        id, old.order_status, expected
      )));
    }
    let new: Order = sqlx::query_as("UPDATE orders SET order_status = $2 WHERE id = $1 RETURNING *")
      .bind(id)
      .bind(to)
      .fetch_one(&mut *tx)
      .await
      .map_err(db_err)?;
    tx.commit().await.map_err(db_err)?;
    self.changes.publish_row(Table::Orders, ChangeKind::Update, Some(&new), Some(&old));
    Ok(new)
  }

  async fn insert_service(&self, request: NewServiceRequest) -> ShopResult<ServiceRequest> {
    let request = request.normalized();
    let service: ServiceRequest = sqlx::query_as(
      r#"INSERT INTO services
           (id, user_id, full_name, phone, address, service_type, description, preferred_date, time_slot,
            status, image_url)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(request.user_id)
    .bind(&request.full_name)
    .bind(&request.phone)
    .bind(&request.address)
    .bind(request.service_type)
    .bind(&request.description)
    .bind(&request.preferred_date)
    .bind(&request.time_slot)
    .bind(ServiceStatus::initial())
    .bind(&request.image_url)
    .fetch_one(&self.pool)
    .await
    .map_err(db_err)?;
    self.changes.publish_row(Table::Services, ChangeKind::Insert, Some(&service), None);
    Ok(service)
  }

  async fn get_service(&self, id: Uuid) -> ShopResult<ServiceRequest> {
    self.fetch_by_id(Table::Services, "service", id).await
  }

  async fn list_services(&self, user_id: Option<Uuid>) -> ShopResult<Vec<ServiceRequest>> {
    sqlx::query_as("SELECT * FROM services WHERE ($1::uuid IS NULL OR user_id = $1) ORDER BY created_at DESC")
      .bind(user_id)
      .fetch_all(&self.pool)
      .await
      .map_err(db_err)
  }

  async fn update_service_status(&self, id: Uuid, status: ServiceStatus) -> ShopResult<ServiceRequest> {
    let update = sqlx::query_as("UPDATE services SET status = $2 WHERE id = $1 RETURNING *")
      .bind(id)
      .bind(status);
    self.update_row(Table::Services, "service", id, update).await
  }

  async fn update_service_technician(&self, id: Uuid, technician: Option<String>) -> ShopResult<ServiceRequest> {
    let update = sqlx::query_as("UPDATE services SET technician_name = $2 WHERE id = $1 RETURNING *")
      .bind(id)
      .bind(technician);
    self.update_row(Table::Services, "service", id, update).await
  }

  async fn list_banners(&self, active_only: bool) -> ShopResult<Vec<Banner>> {
    sqlx::query_as("SELECT * FROM banners WHERE (NOT $1 OR active) ORDER BY created_at DESC")
      .bind(active_only)
      .fetch_all(&self.pool)
      .await
      .map_err(db_err)
  }

  async fn get_banner(&self, id: Uuid) -> ShopResult<Banner> {
    self.fetch_by_id(Table::Banners, "banner", id).await
  }

  async fn insert_banner(&self, draft: BannerDraft) -> ShopResult<Banner> {
    let banner: Banner = sqlx::query_as(
      r#"INSERT INTO banners (id, title, subtitle, image_url, active)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(&draft.title)
    .bind(&draft.subtitle)
    .bind(&draft.image_url)
    .bind(draft.active)
    .fetch_one(&self.pool)
    .await
    .map_err(db_err)?;
    self.changes.publish_row(Table::Banners, ChangeKind::Insert, Some(&banner), None);
    Ok(banner)
  }

  async fn update_banner(&self, id: Uuid, draft: BannerDraft) -> ShopResult<Banner> {
    let update = sqlx::query_as("UPDATE banners SET title = $2, subtitle = $3, image_url = $4 WHERE id = $1 RETURNING *")
      .bind(id)
      .bind(draft.title)
      .bind(draft.subtitle)
      .bind(draft.image_url);
    self.update_row(Table::Banners, "banner", id, update).await
  }

  async fn set_banner_active(&self, id: Uuid, active: bool) -> ShopResult<Banner> {
    let update = sqlx::query_as("UPDATE banners SET active = $2 WHERE id = $1 RETURNING *")
      .bind(id)
      .bind(active);
    self.update_row(Table::Banners, "banner", id, update).await
  }

  async fn delete_banner(&self, id: Uuid) -> ShopResult<Banner> {
    let removed: Banner = sqlx::query_as("DELETE FROM banners WHERE id = $1 RETURNING *")
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_err)?
      .ok_or_else(|| ShopError::not_found("banner", id))?;
    self.changes.publish_row(Table::Banners, ChangeKind::Delete, None, Some(&removed));
    Ok(removed)
  }

  async fn insert_enquiry(&self, enquiry: NewEnquiry) -> ShopResult<Enquiry> {
    let enquiry = enquiry.into_enquiry(Uuid::new_v4(), chrono::Utc::now());
    let stored: Enquiry = sqlx::query_as(
      r#"INSERT INTO enquiries (id, product_id, name, phone, message, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *"#,
    )
    .bind(enquiry.id)
    .bind(enquiry.product_id)
    .bind(&enquiry.name)
    .bind(&enquiry.phone)
    .bind(&enquiry.message)
    .bind(enquiry.created_at)
    .fetch_one(&self.pool)
    .await
    .map_err(db_err)?;
    self.changes.publish_row(Table::Enquiries, ChangeKind::Insert, Some(&stored), None);
    Ok(stored)
  }

  async fn list_enquiries(&self) -> ShopResult<Vec<Enquiry>> {
    sqlx::query_as("SELECT * FROM enquiries ORDER BY created_at DESC")
      .fetch_all(&self.pool)
      .await
      .map_err(db_err)
  }

  async fn insert_review(&self, review: NewReview) -> ShopResult<Review> {
    let review: Review = sqlx::query_as(
      r#"INSERT INTO reviews (id, name, rating, message, photo_url)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(&review.name)
    .bind(review.rating)
    .bind(&review.message)
    .bind(&review.photo_url)
    .fetch_one(&self.pool)
    .await
    .map_err(db_err)?;
    self.changes.publish_row(Table::Reviews, ChangeKind::Insert, Some(&review), None);
    Ok(review)
  }

  async fn list_reviews(&self, limit: usize) -> ShopResult<Vec<Review>> {
    sqlx::query_as("SELECT * FROM reviews ORDER BY created_at DESC LIMIT $1")
      .bind(i64::try_from(limit).unwrap_or(i64::MAX))
      .fetch_all(&self.pool)
      .await
      .map_err(db_err)
  }

  async fn get_profile(&self, user_id: Uuid) -> ShopResult<Option<UserProfile>> {
    sqlx::query_as("SELECT * FROM user_profiles WHERE id = $1")
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_err)
  }

  async fn upsert_profile(&self, user_id: Uuid, email: &str, role: Role) -> ShopResult<UserProfile> {
    let mut tx = self.begin().await?;
    let old: Option<UserProfile> = sqlx::query_as("SELECT * FROM user_profiles WHERE id = $1 FOR UPDATE")
      .bind(user_id)
      .fetch_optional(&mut *tx)
      .await
      .map_err(db_err)?;
    let new: UserProfile = sqlx::query_as(
      r#"INSERT INTO user_profiles (id, email, role)
         VALUES ($1, $2, $3)
         ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, role = EXCLUDED.role
         RETURNING *"#,
    )
    .bind(user_id)
    .bind(email)
    .bind(role)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_err)?;
    tx.commit().await.map_err(db_err)?;
    let kind = if old.is_some() { ChangeKind::Update } else { ChangeKind::Insert };
    self.changes.publish_row(Table::UserProfiles, kind, Some(&new), old.as_ref());
    Ok(new)
  }

  async fn dashboard_stats(&self) -> ShopResult<DashboardStats> {
    let (products, enquiries, active_banners): (i64, i64, i64) = sqlx::query_as(
      r#"SELECT
           (SELECT count(*) FROM products),
           (SELECT count(*) FROM enquiries),
           (SELECT count(*) FROM banners WHERE active)"#,
    )
    .fetch_one(&self.pool)
    .await
    .map_err(db_err)?;
    Ok(DashboardStats {
      products,
      enquiries,
      active_banners,
    })
  }
}
