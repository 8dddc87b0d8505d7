// shopfront/src/models/content.rs

use crate::error::{ShopError, ShopResult};
use crate::models::{require, Keyed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_PHONE_LEN: usize = 10;
pub const RECENT_REVIEWS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Banner {
  pub id: Uuid,
  pub title: String,
  pub subtitle: Option<String>,
  pub image_url: String,
  pub active: bool,
  pub created_at: DateTime<Utc>,
}

impl Keyed for Banner {
  fn key(&self) -> Uuid {
    self.id
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerDraft {
  pub title: String,
  #[serde(default)]
  pub subtitle: Option<String>,
  #[serde(default)]
  pub image_url: String,
  #[serde(default = "default_active")]
  pub active: bool,
}

fn default_active() -> bool {
  true
}

impl BannerDraft {
  pub fn validate(&self) -> ShopResult<()> {
    require(&self.image_url, "banner image")?;
    require(&self.title, "banner title")?;
    Ok(())
  }

  pub fn into_banner(self, id: Uuid, created_at: DateTime<Utc>) -> Banner {
    Banner {
      id,
      title: self.title,
      subtitle: self.subtitle,
      image_url: self.image_url,
      active: self.active,
      created_at,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Enquiry {
  pub id: Uuid,
  pub product_id: Option<Uuid>,
  pub name: String,
  pub phone: String,
  pub message: String,
  pub created_at: DateTime<Utc>,
}

impl Keyed for Enquiry {
  fn key(&self) -> Uuid {
    self.id
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnquiry {
  #[serde(default)]
  pub product_id: Option<Uuid>,
  pub name: String,
  pub phone: String,
  #[serde(default)]
  pub message: String,
}

impl NewEnquiry {
  pub fn validate(&self) -> ShopResult<()> {
    require(&self.name, "name")?;
    require(&self.phone, "phone")?;
    if self.phone.trim().chars().count() < MIN_PHONE_LEN {
      return Err(ShopError::Validation(format!(
        "phone must have at least {} characters",
        MIN_PHONE_LEN
      )));
    }
    Ok(())
  }

  /// Fills an empty message from the product the enquiry was raised on.
  pub fn with_default_message(mut self, product_name: Option<&str>) -> Self {
    if self.message.trim().is_empty() {
      if let Some(name) = product_name {
        self.message = format!("Enquiry about {}", name);
      }
    }
    self
  }

  pub fn into_enquiry(self, id: Uuid, created_at: DateTime<Utc>) -> Enquiry {
    Enquiry {
      id,
      product_id: self.product_id,
      name: self.name.trim().to_string(),
      phone: self.phone.trim().to_string(),
      message: self.message,
      created_at,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Review {
  pub id: Uuid,
  pub name: String,
  pub rating: i32,
  pub message: String,
  pub photo_url: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Keyed for Review {
  fn key(&self) -> Uuid {
    self.id
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
  pub name: String,
  pub rating: i32,
  pub message: String,
  #[serde(default)]
  pub photo_url: Option<String>,
}

impl NewReview {
  pub fn validate(&self) -> ShopResult<()> {
    require(&self.name, "name")?;
    require(&self.message, "review message")?;
    if !(1..=5).contains(&self.rating) {
      return Err(ShopError::Validation("rating must be between 1 and 5".to_string()));
    }
    Ok(())
  }

  pub fn into_review(self, id: Uuid, created_at: DateTime<Utc>) -> Review {
    Review {
      id,
      name: self.name,
      rating: self.rating,
      message: self.message,
      photo_url: self.photo_url,
      created_at,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
  pub products: i64,
  pub enquiries: i64,
  pub active_banners: i64,
}
