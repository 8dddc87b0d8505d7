// shopfront/src/models/product.rs

use crate::error::{ShopError, ShopResult};
use crate::models::{require, Keyed};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "stock_status", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
  #[default]
  Available,
  OutOfStock,
  Limited,
}

impl StockStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      StockStatus::Available => "available",
      StockStatus::OutOfStock => "out_of_stock",
      StockStatus::Limited => "limited",
    }
  }
}

impl std::str::FromStr for StockStatus {
  type Err = ShopError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "available" => Ok(StockStatus::Available),
      "out_of_stock" => Ok(StockStatus::OutOfStock),
      "limited" => Ok(StockStatus::Limited),
      other => Err(ShopError::Validation(format!("unknown stock status '{}'", other))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub brand: String,
  pub screen_size: String,
  pub display_type: String,
  pub price: Decimal,
  pub emi_available: bool,
  pub specs: String,
  pub warranty_info: String,
  pub stock_status: StockStatus,
  pub image_url: Option<String>,
  #[serde(default)]
  pub is_archived: bool,
  pub created_at: DateTime<Utc>,
}

impl Keyed for Product {
  fn key(&self) -> Uuid {
    self.id
  }
}

/// Insert/update payload from the admin product form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
  pub name: String,
  pub brand: String,
  pub screen_size: String,
  pub display_type: String,
  pub price: Decimal,
  #[serde(default)]
  pub emi_available: bool,
  #[serde(default)]
  pub specs: String,
  #[serde(default)]
  pub warranty_info: String,
  #[serde(default)]
  pub stock_status: StockStatus,
  #[serde(default)]
  pub image_url: Option<String>,
}

impl NewProduct {
  pub fn validate(&self) -> ShopResult<()> {
    require(&self.name, "product name")?;
    require(&self.brand, "brand")?;
    if self.price <= Decimal::ZERO {
      return Err(ShopError::Validation("price must be greater than zero".to_string()));
    }
    Ok(())
  }

  pub fn into_product(self, id: Uuid, created_at: DateTime<Utc>) -> Product {
    Product {
      id,
      name: self.name,
      brand: self.brand,
      screen_size: self.screen_size,
      display_type: self.display_type,
      price: self.price,
      emi_available: self.emi_available,
      specs: self.specs,
      warranty_info: self.warranty_info,
      stock_status: self.stock_status,
      image_url: self.image_url,
      is_archived: false,
      created_at,
    }
  }
}
