// shopfront/src/cart.rs

//! The shopper's cart. It lives only on the client: the whole collection is
//! written to a key/value storage after every mutation and read back once at
//! startup.

use crate::error::{ShopError, ShopResult};
use crate::models::Product;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{event, Level};
use uuid::Uuid;

/// Storage key the cart is saved under.
pub const CART_STORAGE_KEY: &str = "sm-cart";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
  pub product: Product,
  pub quantity: u32,
}

impl CartLine {
  pub fn subtotal(&self) -> Decimal {
    self.product.price * Decimal::from(self.quantity)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
  lines: Vec<CartLine>,
}

impl Cart {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn lines(&self) -> &[CartLine] {
    &self.lines
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  /// Adds one unit, merging with an existing line for the same product.
  pub fn add(&mut self, product: Product) {
    match self.lines.iter_mut().find(|line| line.product.id == product.id) {
      Some(line) => line.quantity = line.quantity.saturating_add(1),
      None => self.lines.push(CartLine { product, quantity: 1 }),
    }
  }

  pub fn remove(&mut self, product_id: Uuid) {
    self.lines.retain(|line| line.product.id != product_id);
  }

  /// A quantity of zero or less removes the line.
  pub fn update_quantity(&mut self, product_id: Uuid, quantity: i64) {
    if quantity <= 0 {
      self.remove(product_id);
      return;
    }
    let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
    if let Some(line) = self.lines.iter_mut().find(|line| line.product.id == product_id) {
      line.quantity = quantity;
    }
  }

  pub fn clear(&mut self) {
    self.lines.clear();
  }

  pub fn total(&self) -> Decimal {
    self.lines.iter().map(CartLine::subtotal).sum()
  }

  pub fn item_count(&self) -> u64 {
    self.lines.iter().map(|line| u64::from(line.quantity)).sum()
  }
}

/// Key/value persistence in the manner of browser local storage.
pub trait CartStorage: Send + Sync {
  fn get(&self, key: &str) -> ShopResult<Option<String>>;
  fn set(&self, key: &str, value: &str) -> ShopResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCartStorage {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryCartStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seeds raw content, e.g. to simulate a corrupted entry.
  pub fn with_entry(key: &str, value: &str) -> Self {
    let storage = Self::default();
    storage.entries.lock().insert(key.to_string(), value.to_string());
    storage
  }
}

impl CartStorage for MemoryCartStorage {
  fn get(&self, key: &str) -> ShopResult<Option<String>> {
    Ok(self.entries.lock().get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> ShopResult<()> {
    self.entries.lock().insert(key.to_string(), value.to_string());
    Ok(())
  }
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileCartStorage {
  dir: PathBuf,
}

impl FileCartStorage {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn path(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{}.json", key))
  }
}

impl CartStorage for FileCartStorage {
  fn get(&self, key: &str) -> ShopResult<Option<String>> {
    match std::fs::read_to_string(self.path(key)) {
      Ok(content) => Ok(Some(content)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(ShopError::Internal(format!("reading cart storage: {}", e))),
    }
  }

  fn set(&self, key: &str, value: &str) -> ShopResult<()> {
    std::fs::create_dir_all(&self.dir).map_err(|e| ShopError::Internal(format!("creating cart storage: {}", e)))?;
    std::fs::write(self.path(key), value).map_err(|e| ShopError::Internal(format!("writing cart storage: {}", e)))
  }
}

/// A cart bound to its storage. Loading never fails: missing or unreadable
/// content yields an empty cart. Save failures are logged and the in-memory
/// cart stays authoritative.
pub struct PersistentCart {
  cart: Cart,
  storage: Box<dyn CartStorage>,
}

impl PersistentCart {
  pub fn load(storage: Box<dyn CartStorage>) -> Self {
    let cart = match storage.get(CART_STORAGE_KEY) {
      Ok(Some(raw)) => serde_json::from_str::<Cart>(&raw).unwrap_or_else(|e| {
        event!(Level::DEBUG, error = %e, "Discarding unreadable saved cart.");
        Cart::default()
      }),
      Ok(None) => Cart::default(),
      Err(e) => {
        event!(Level::DEBUG, error = %e, "Cart storage unavailable, starting empty.");
        Cart::default()
      }
    };
    Self { cart, storage }
  }

  pub fn cart(&self) -> &Cart {
    &self.cart
  }

  pub fn add(&mut self, product: Product) {
    self.cart.add(product);
    self.save();
  }

  pub fn remove(&mut self, product_id: Uuid) {
    self.cart.remove(product_id);
    self.save();
  }

  pub fn update_quantity(&mut self, product_id: Uuid, quantity: i64) {
    self.cart.update_quantity(product_id, quantity);
    self.save();
  }

  pub fn clear(&mut self) {
    self.cart.clear();
    self.save();
  }

  pub fn total(&self) -> Decimal {
    self.cart.total()
  }

  pub fn item_count(&self) -> u64 {
    self.cart.item_count()
  }

  fn save(&self) {
    let result = serde_json::to_string(&self.cart)
      .map_err(|e| ShopError::Internal(format!("encoding cart: {}", e)))
      .and_then(|raw| self.storage.set(CART_STORAGE_KEY, &raw));
    if let Err(e) = result {
      event!(Level::WARN, error = %e, "Failed to persist cart.");
    }
  }
}

impl std::fmt::Debug for PersistentCart {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PersistentCart").field("cart", &self.cart).finish_non_exhaustive()
  }
}
