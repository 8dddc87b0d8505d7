// shopfront/src/realtime.rs

//! Row-level change feed. Writers publish a `ChangeEvent` after each
//! committed mutation; readers hold a `Subscription` filtered by table, event
//! kind and an optional `column=value` predicate.

use crate::error::ShopError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{event, Level};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
  Products,
  Orders,
  OrderItems,
  Services,
  Banners,
  Enquiries,
  Reviews,
  UserProfiles,
}

impl Table {
  pub fn as_str(&self) -> &'static str {
    match self {
      Table::Products => "products",
      Table::Orders => "orders",
      Table::OrderItems => "order_items",
      Table::Services => "services",
      Table::Banners => "banners",
      Table::Enquiries => "enquiries",
      Table::Reviews => "reviews",
      Table::UserProfiles => "user_profiles",
    }
  }

  /// Tables anyone may watch.
  pub fn is_public(&self) -> bool {
    matches!(self, Table::Products | Table::Banners | Table::Reviews)
  }

  /// Tables whose rows belong to a customer through `user_id`.
  pub fn is_user_scoped(&self) -> bool {
    matches!(self, Table::Orders | Table::Services)
  }
}

impl std::fmt::Display for Table {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for Table {
  type Err = ShopError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let table = match s {
      "products" => Table::Products,
      "orders" => Table::Orders,
      "order_items" => Table::OrderItems,
      "services" => Table::Services,
      "banners" => Table::Banners,
      "enquiries" => Table::Enquiries,
      "reviews" => Table::Reviews,
      "user_profiles" => Table::UserProfiles,
      other => return Err(ShopError::not_found("table", other)),
    };
    Ok(table)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
  Insert,
  Update,
  Delete,
}

/// One committed row change. `new` is the row after the change (`Null` for
/// deletes), `old` the row before it when the writer knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
  pub table: Table,
  pub kind: ChangeKind,
  pub new: Value,
  pub old: Option<Value>,
  pub commit_timestamp: DateTime<Utc>,
}

impl ChangeEvent {
  /// The row a filter is evaluated against: `new`, or `old` for deletes.
  pub fn row(&self) -> Option<&Value> {
    match self.kind {
      ChangeKind::Delete => self.old.as_ref(),
      _ => Some(&self.new),
    }
  }

  pub fn row_id(&self) -> Option<&str> {
    self.row().and_then(|row| row.get("id")).and_then(Value::as_str)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventFilter {
  #[serde(rename = "INSERT")]
  Insert,
  #[serde(rename = "UPDATE")]
  Update,
  #[serde(rename = "DELETE")]
  Delete,
  #[default]
  #[serde(rename = "*")]
  All,
}

impl EventFilter {
  pub fn accepts(&self, kind: ChangeKind) -> bool {
    match self {
      EventFilter::All => true,
      EventFilter::Insert => kind == ChangeKind::Insert,
      EventFilter::Update => kind == ChangeKind::Update,
      EventFilter::Delete => kind == ChangeKind::Delete,
    }
  }
}

impl std::str::FromStr for EventFilter {
  type Err = ShopError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "INSERT" => Ok(EventFilter::Insert),
      "UPDATE" => Ok(EventFilter::Update),
      "DELETE" => Ok(EventFilter::Delete),
      "*" | "ALL" => Ok(EventFilter::All),
      other => Err(ShopError::Validation(format!("unknown event filter '{}'", other))),
    }
  }
}

/// `column=eq.value`: keeps rows whose column renders as `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
  pub column: String,
  pub value: String,
}

impl RowFilter {
  pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
    Self {
      column: column.into(),
      value: value.to_string(),
    }
  }

  pub fn matches(&self, row: &Value) -> bool {
    match row.get(&self.column) {
      Some(Value::String(s)) => *s == self.value,
      Some(Value::Null) | None => false,
      Some(other) => other.to_string() == self.value,
    }
  }
}

impl std::fmt::Display for RowFilter {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}=eq.{}", self.column, self.value)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFilter {
  pub table: Table,
  #[serde(default)]
  pub events: EventFilter,
  #[serde(default)]
  pub row: Option<RowFilter>,
}

impl ChangeFilter {
  pub fn table(table: Table) -> Self {
    Self {
      table,
      events: EventFilter::All,
      row: None,
    }
  }

  pub fn events(mut self, events: EventFilter) -> Self {
    self.events = events;
    self
  }

  pub fn row(mut self, row: RowFilter) -> Self {
    self.row = Some(row);
    self
  }

  pub fn matches(&self, change: &ChangeEvent) -> bool {
    if change.table != self.table || !self.events.accepts(change.kind) {
      return false;
    }
    match (&self.row, change.row()) {
      (None, _) => true,
      (Some(filter), Some(row)) => filter.matches(row),
      (Some(_), None) => false,
    }
  }
}

/// Fan-out point for committed changes. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct ChangeHub {
  tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeHub {
  fn default() -> Self {
    Self::with_capacity(DEFAULT_CAPACITY)
  }
}

impl ChangeHub {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_capacity(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity.max(1));
    Self { tx }
  }

  pub fn publish(&self, change: ChangeEvent) {
    // No receivers is normal: nobody is watching right now.
    let _ = self.tx.send(change);
  }

  /// Serializes `new`/`old` rows and publishes. A row that fails to
  /// serialize is logged and dropped.
  pub fn publish_row<T: Serialize>(&self, table: Table, kind: ChangeKind, new: Option<&T>, old: Option<&T>) {
    let encode = |row: &T| serde_json::to_value(row);
    let new = match new.map(encode).transpose() {
      Ok(value) => value.unwrap_or(Value::Null),
      Err(e) => {
        event!(Level::ERROR, %table, error = %e, "Failed to encode changed row.");
        return;
      }
    };
    let old = match old.map(encode).transpose() {
      Ok(value) => value,
      Err(e) => {
        event!(Level::ERROR, %table, error = %e, "Failed to encode previous row.");
        return;
      }
    };
    self.publish(ChangeEvent {
      table,
      kind,
      new,
      old,
      commit_timestamp: Utc::now(),
    });
  }

  pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
    event!(Level::DEBUG, table = %filter.table, row_filter = ?filter.row, "New change subscription.");
    Subscription {
      rx: self.tx.subscribe(),
      filter,
    }
  }

  pub fn receiver_count(&self) -> usize {
    self.tx.receiver_count()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
  Change(ChangeEvent),
  /// Events were dropped because this subscriber fell behind. The consumer
  /// must refetch instead of trusting its merged state.
  Resync { missed: u64 },
}

#[derive(Debug)]
pub struct Subscription {
  rx: broadcast::Receiver<ChangeEvent>,
  filter: ChangeFilter,
}

impl Subscription {
  pub fn filter(&self) -> &ChangeFilter {
    &self.filter
  }

  /// Waits for the next matching delivery. `None` once the hub is gone.
  pub async fn next(&mut self) -> Option<Delivery> {
    loop {
      match self.rx.recv().await {
        Ok(change) if self.filter.matches(&change) => return Some(Delivery::Change(change)),
        Ok(_) => continue,
        Err(RecvError::Lagged(missed)) => {
          event!(Level::WARN, table = %self.filter.table, missed, "Change subscriber lagged.");
          return Some(Delivery::Resync { missed });
        }
        Err(RecvError::Closed) => return None,
      }
    }
  }

  /// Non-blocking variant for draining already-published events.
  pub fn try_next(&mut self) -> Option<Delivery> {
    use broadcast::error::TryRecvError;
    loop {
      match self.rx.try_recv() {
        Ok(change) if self.filter.matches(&change) => return Some(Delivery::Change(change)),
        Ok(_) => continue,
        Err(TryRecvError::Lagged(missed)) => return Some(Delivery::Resync { missed }),
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
      }
    }
  }
}
