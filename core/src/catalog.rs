// shopfront/src/catalog.rs

//! Public catalog reads and the two anonymous submission forms.

use crate::backend::Store;
use crate::error::ShopResult;
use crate::models::content::RECENT_REVIEWS;
use crate::models::{Banner, Enquiry, NewEnquiry, NewReview, Product, Review};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct Catalog {
  store: Arc<dyn Store>,
}

impl Catalog {
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self { store }
  }

  /// Non-archived products, newest first.
  pub async fn products(&self) -> ShopResult<Vec<Product>> {
    self.store.list_products(false).await
  }

  pub async fn product(&self, id: Uuid) -> ShopResult<Product> {
    self.store.get_product(id).await
  }

  pub async fn banners(&self) -> ShopResult<Vec<Banner>> {
    self.store.list_banners(true).await
  }

  pub async fn recent_reviews(&self) -> ShopResult<Vec<Review>> {
    self.store.list_reviews(RECENT_REVIEWS).await
  }

  /// An empty message becomes "Enquiry about <product name>".
  #[instrument(name = "Catalog::submit_enquiry", skip_all, err(Display))]
  pub async fn submit_enquiry(&self, enquiry: NewEnquiry) -> ShopResult<Enquiry> {
    enquiry.validate()?;
    let product_name = match enquiry.product_id {
      Some(id) if enquiry.message.trim().is_empty() => Some(self.store.get_product(id).await?.name),
      _ => None,
    };
    let enquiry = enquiry.with_default_message(product_name.as_deref());
    self.store.insert_enquiry(enquiry).await
  }

  #[instrument(name = "Catalog::submit_review", skip_all, err(Display))]
  pub async fn submit_review(&self, review: NewReview) -> ShopResult<Review> {
    review.validate()?;
    self.store.insert_review(review).await
  }
}
