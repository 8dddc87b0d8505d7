// shopfront/src/reconcile.rs

//! Keeps locally held rows in step with the store.
//!
//! Two strategies: `MergeView` folds partial-row UPDATE payloads into the
//! matching local row (customer order list), `RefetchView` reloads the whole
//! collection on any change (admin tables). Both refetch when their
//! subscription reports a gap.

use crate::error::{ShopError, ShopResult};
use crate::models::Keyed;
use crate::realtime::{ChangeEvent, ChangeKind, Delivery, Subscription};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{event, Level};
use uuid::Uuid;

/// Loads the full collection a view mirrors.
pub type Fetch<T> = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ShopResult<Vec<T>>> + Send>> + Send + Sync>;

/// Wraps an async closure as a `Fetch`.
pub fn fetcher<T, F, Fut>(f: F) -> Fetch<T>
where
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = ShopResult<Vec<T>>> + Send + 'static,
{
  Arc::new(move || -> Pin<Box<dyn Future<Output = ShopResult<Vec<T>>> + Send>> { Box::pin(f()) })
}

/// Overlays the fields present in `patch` onto `current`. Fields the patch
/// does not mention, such as embedded relations, are kept.
pub fn merge_row<T>(current: &T, patch: &Value) -> ShopResult<T>
where
  T: Serialize + DeserializeOwned,
{
  let mut base = serde_json::to_value(current).map_err(|e| ShopError::Internal(format!("encoding row: {}", e)))?;
  match (&mut base, patch) {
    (Value::Object(fields), Value::Object(changes)) => {
      for (column, value) in changes {
        fields.insert(column.clone(), value.clone());
      }
    }
    _ => return Err(ShopError::Internal("change payload is not a row object".to_string())),
  }
  serde_json::from_value(base).map_err(|e| ShopError::Internal(format!("decoding merged row: {}", e)))
}

fn change_id(change: &ChangeEvent) -> Option<Uuid> {
  change.row_id().and_then(|id| Uuid::parse_str(id).ok())
}

#[derive(Debug, Clone)]
pub struct MergeView<T> {
  items: Vec<T>,
}

impl<T> MergeView<T>
where
  T: Keyed + Serialize + DeserializeOwned,
{
  pub fn new(items: Vec<T>) -> Self {
    Self { items }
  }

  pub fn items(&self) -> &[T] {
    &self.items
  }

  pub fn replace(&mut self, items: Vec<T>) {
    self.items = items;
  }

  /// Merges an UPDATE into the row with the same id. Returns whether a row
  /// changed; other kinds and unknown ids are ignored.
  pub fn apply(&mut self, change: &ChangeEvent) -> bool {
    if change.kind != ChangeKind::Update {
      return false;
    }
    let Some(id) = change_id(change) else {
      return false;
    };
    let Some(slot) = self.items.iter_mut().find(|item| item.key() == id) else {
      return false;
    };
    match merge_row(slot, &change.new) {
      Ok(merged) => {
        *slot = merged;
        true
      }
      Err(e) => {
        event!(Level::WARN, %id, error = %e, "Ignoring unmergeable change.");
        false
      }
    }
  }
}

pub struct RefetchView<T> {
  items: Vec<T>,
  fetch: Fetch<T>,
}

impl<T> RefetchView<T>
where
  T: Keyed + Clone,
{
  pub async fn load(fetch: Fetch<T>) -> ShopResult<Self> {
    let items = fetch().await?;
    Ok(Self { items, fetch })
  }

  pub fn items(&self) -> &[T] {
    &self.items
  }

  pub async fn refresh(&mut self) -> ShopResult<&[T]> {
    self.items = (self.fetch)().await?;
    Ok(&self.items)
  }

  /// See `apply_optimistic`.
  pub async fn optimistic<Fut>(&mut self, id: Uuid, mutate: impl FnOnce(&mut T), write: Fut) -> ShopResult<T>
  where
    Fut: Future<Output = ShopResult<T>>,
  {
    apply_optimistic(&mut self.items, id, mutate, write).await
  }
}

/// Applies `mutate` to the local row at once, then awaits `write`. On success
/// the row becomes the stored one; on failure the pre-mutation row is put
/// back and the error returned.
pub async fn apply_optimistic<T, Fut>(items: &mut [T], id: Uuid, mutate: impl FnOnce(&mut T), write: Fut) -> ShopResult<T>
where
  T: Keyed + Clone,
  Fut: Future<Output = ShopResult<T>>,
{
  let snapshot = items.iter().position(|item| item.key() == id).map(|index| {
    let before = items[index].clone();
    mutate(&mut items[index]);
    (index, before)
  });

  match write.await {
    Ok(stored) => {
      if let Some((index, _)) = snapshot {
        items[index] = stored.clone();
      }
      Ok(stored)
    }
    Err(e) => {
      if let Some((index, before)) = snapshot {
        event!(Level::WARN, %id, error = %e, "Write failed, rolling back optimistic change.");
        items[index] = before;
      }
      Err(e)
    }
  }
}

/// A `MergeView` driven by a subscription.
pub struct MergeFeed<T> {
  view: MergeView<T>,
  subscription: Subscription,
  fetch: Fetch<T>,
}

impl<T> MergeFeed<T>
where
  T: Keyed + Serialize + DeserializeOwned,
{
  /// Subscribe before calling so no change between load and watch is lost.
  pub async fn open(subscription: Subscription, fetch: Fetch<T>) -> ShopResult<Self> {
    let items = fetch().await?;
    Ok(Self {
      view: MergeView::new(items),
      subscription,
      fetch,
    })
  }

  pub fn items(&self) -> &[T] {
    self.view.items()
  }

  /// Waits for one delivery and reconciles it. `Ok(false)` once the feed has
  /// closed.
  pub async fn next(&mut self) -> ShopResult<bool> {
    match self.subscription.next().await {
      Some(delivery) => {
        self.reconcile(delivery).await?;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  /// Reconciles everything already delivered without waiting.
  pub async fn drain(&mut self) -> ShopResult<usize> {
    let mut handled = 0;
    while let Some(delivery) = self.subscription.try_next() {
      self.reconcile(delivery).await?;
      handled += 1;
    }
    Ok(handled)
  }

  async fn reconcile(&mut self, delivery: Delivery) -> ShopResult<()> {
    match delivery {
      Delivery::Change(change) => {
        self.view.apply(&change);
      }
      Delivery::Resync { .. } => {
        let items = (self.fetch)().await?;
        self.view.replace(items);
      }
    }
    Ok(())
  }
}

/// A `RefetchView` driven by a subscription.
pub struct RefetchFeed<T> {
  view: RefetchView<T>,
  subscription: Subscription,
}

impl<T> RefetchFeed<T>
where
  T: Keyed + Clone,
{
  pub async fn open(subscription: Subscription, fetch: Fetch<T>) -> ShopResult<Self> {
    Ok(Self {
      view: RefetchView::load(fetch).await?,
      subscription,
    })
  }

  pub fn items(&self) -> &[T] {
    self.view.items()
  }

  pub fn view_mut(&mut self) -> &mut RefetchView<T> {
    &mut self.view
  }

  pub async fn next(&mut self) -> ShopResult<bool> {
    match self.subscription.next().await {
      Some(_) => {
        self.view.refresh().await?;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  /// Refetches once if anything was delivered since the last call.
  pub async fn drain(&mut self) -> ShopResult<usize> {
    let mut handled = 0;
    while self.subscription.try_next().is_some() {
      handled += 1;
    }
    if handled > 0 {
      self.view.refresh().await?;
    }
    Ok(handled)
  }
}
