// shopfront/src/storefront.rs

//! `Storefront` is the customer-side composition root. It owns the session
//! and the cart and hands out feeds that keep the customer's own orders and
//! bookings current. Everything shared with other sessions goes through the
//! `Backend`.

use crate::backend::{AuthEvent, Backend, Session, Upload};
use crate::booking;
use crate::cart::{CartStorage, PersistentCart};
use crate::catalog::Catalog;
use crate::checkout::{self, CheckoutLine, CheckoutReceipt, CheckoutRequest};
use crate::error::{ShopError, ShopResult};
use crate::models::{DeliveryContact, NewServiceRequest, OrderWithItems, PaymentMethod, Product, Role, ServiceRequest};
use crate::realtime::{ChangeFilter, EventFilter, RowFilter, Table};
use crate::reconcile::{fetcher, MergeFeed};
use crate::workflow::Workflows;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{event, instrument, Level};
use uuid::Uuid;

pub struct Storefront {
  backend: Backend,
  workflows: Arc<Workflows>,
  catalog: Catalog,
  cart: PersistentCart,
  session: Option<Session>,
}

impl Storefront {
  /// Loads the saved cart and registers the checkout and booking workflows.
  pub fn new(backend: Backend, cart_storage: Box<dyn CartStorage>) -> Self {
    let workflows: Workflows = Workflows::new();
    crate::register_workflows(&workflows);
    Self {
      catalog: Catalog::new(Arc::clone(&backend.store)),
      cart: PersistentCart::load(cart_storage),
      workflows: Arc::new(workflows),
      session: None,
      backend,
    }
  }

  pub fn backend(&self) -> &Backend {
    &self.backend
  }

  pub fn catalog(&self) -> &Catalog {
    &self.catalog
  }

  // --- session ---

  pub fn session(&self) -> Option<&Session> {
    self.session.as_ref()
  }

  pub fn user_id(&self) -> Option<Uuid> {
    self.session.as_ref().map(|s| s.user.id)
  }

  pub fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
    self.backend.identity.subscribe()
  }

  /// Picks up a session from a saved token. Unknown or expired tokens leave
  /// the storefront signed out.
  pub async fn restore_session(&mut self, access_token: &str) -> ShopResult<Option<&Session>> {
    self.session = self.backend.identity.get_session(access_token).await?;
    Ok(self.session.as_ref())
  }

  /// Registers the account and creates its `customer` profile.
  #[instrument(name = "Storefront::sign_up", skip(self, password), err(Display))]
  pub async fn sign_up(&mut self, email: &str, password: &str) -> ShopResult<&Session> {
    let session = self.backend.identity.sign_up(email, password).await?;
    self
      .backend
      .store
      .upsert_profile(session.user.id, &session.user.email, Role::Customer)
      .await?;
    Ok(self.session.insert(session))
  }

  #[instrument(name = "Storefront::sign_in", skip(self, password), err(Display))]
  pub async fn sign_in(&mut self, email: &str, password: &str) -> ShopResult<&Session> {
    let session = self.backend.identity.sign_in_with_password(email, password).await?;
    Ok(self.session.insert(session))
  }

  pub async fn sign_out(&mut self) -> ShopResult<()> {
    if let Some(session) = self.session.take() {
      self.backend.identity.sign_out(&session.access_token).await?;
    }
    Ok(())
  }

  fn require_user(&self) -> ShopResult<Uuid> {
    self.user_id().ok_or(ShopError::Unauthenticated)
  }

  // --- cart ---

  pub fn cart(&self) -> &PersistentCart {
    &self.cart
  }

  pub fn add_to_cart(&mut self, product: Product) {
    self.cart.add(product);
  }

  pub fn remove_from_cart(&mut self, product_id: Uuid) {
    self.cart.remove(product_id);
  }

  pub fn update_quantity(&mut self, product_id: Uuid, quantity: i64) {
    self.cart.update_quantity(product_id, quantity);
  }

  pub fn clear_cart(&mut self) {
    self.cart.clear();
  }

  // --- checkout and bookings ---

  /// Places an order for the current cart. The cart is cleared only when the
  /// order exists with all of its items.
  pub async fn checkout(
    &mut self,
    contact: DeliveryContact,
    payment_method: PaymentMethod,
    proof: Option<Upload>,
  ) -> ShopResult<CheckoutReceipt> {
    let lines = self
      .cart
      .cart()
      .lines()
      .iter()
      .map(|line| CheckoutLine {
        product_id: line.product.id,
        quantity: i32::try_from(line.quantity).unwrap_or(i32::MAX),
      })
      .collect();
    let request = CheckoutRequest {
      user_id: self.user_id(),
      contact,
      payment_method,
      lines,
      proof,
    };

    let receipt = checkout::place_order(&self.workflows, &self.backend, request).await?;
    self.cart.clear();
    event!(Level::INFO, order_id = %receipt.order_id, "Checkout complete, cart cleared.");
    Ok(receipt)
  }

  /// Books a service for the signed-in user; `request.user_id` is replaced.
  pub async fn book_service(&self, mut request: NewServiceRequest, photo: Option<Upload>) -> ShopResult<ServiceRequest> {
    request.user_id = self.require_user()?;
    booking::book_service(&self.workflows, &self.backend, request, photo).await
  }

  // --- the customer's own rows ---

  pub async fn my_orders(&self) -> ShopResult<Vec<OrderWithItems>> {
    let user_id = self.require_user()?;
    self.backend.store.list_orders_with_items(user_id).await
  }

  pub async fn my_order(&self, order_id: Uuid) -> ShopResult<OrderWithItems> {
    let user_id = self.require_user()?;
    let order = self.backend.store.get_order_with_items(order_id).await?;
    if order.order.user_id != user_id {
      return Err(ShopError::not_found("order", order_id));
    }
    Ok(order)
  }

  pub async fn my_services(&self) -> ShopResult<Vec<ServiceRequest>> {
    let user_id = self.require_user()?;
    self.backend.store.list_services(Some(user_id)).await
  }

  /// The order list with status updates merged in as they arrive.
  pub async fn watch_my_orders(&self) -> ShopResult<MergeFeed<OrderWithItems>> {
    let user_id = self.require_user()?;
    let subscription = self.backend.changes.subscribe(
      ChangeFilter::table(Table::Orders)
        .events(EventFilter::Update)
        .row(RowFilter::eq("user_id", user_id)),
    );
    let store = Arc::clone(&self.backend.store);
    let fetch = fetcher(move || {
      let store = Arc::clone(&store);
      async move { store.list_orders_with_items(user_id).await }
    });
    MergeFeed::open(subscription, fetch).await
  }

  pub async fn watch_my_services(&self) -> ShopResult<MergeFeed<ServiceRequest>> {
    let user_id = self.require_user()?;
    let subscription = self.backend.changes.subscribe(
      ChangeFilter::table(Table::Services)
        .events(EventFilter::Update)
        .row(RowFilter::eq("user_id", user_id)),
    );
    let store = Arc::clone(&self.backend.store);
    let fetch = fetcher(move || {
      let store = Arc::clone(&store);
      async move { store.list_services(Some(user_id)).await }
    });
    MergeFeed::open(subscription, fetch).await
  }
}
