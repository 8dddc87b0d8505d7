// shopfront/src/models/service.rs

use crate::error::{ShopError, ShopResult};
use crate::lifecycle::ServiceStatus;
use crate::models::{require, Keyed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "service_type", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
  WallMount,
  Demo,
  Repair,
}

impl ServiceType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ServiceType::WallMount => "wall_mount",
      ServiceType::Demo => "demo",
      ServiceType::Repair => "repair",
    }
  }

  /// Only repairs carry a problem description and photo.
  pub fn takes_details(&self) -> bool {
    matches!(self, ServiceType::Repair)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct ServiceRequest {
  pub id: Uuid,
  pub user_id: Uuid,
  pub full_name: String,
  pub phone: String,
  pub address: String,
  pub service_type: ServiceType,
  pub description: Option<String>,
  pub preferred_date: String,
  pub time_slot: String,
  pub status: ServiceStatus,
  pub technician_name: Option<String>,
  pub image_url: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Keyed for ServiceRequest {
  fn key(&self) -> Uuid {
    self.id
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewServiceRequest {
  pub user_id: Uuid,
  pub full_name: String,
  pub phone: String,
  pub address: String,
  pub service_type: ServiceType,
  #[serde(default)]
  pub description: Option<String>,
  pub preferred_date: String,
  pub time_slot: String,
  #[serde(default)]
  pub image_url: Option<String>,
}

impl NewServiceRequest {
  pub fn validate(&self) -> ShopResult<()> {
    require(&self.full_name, "full name")?;
    require(&self.phone, "phone")?;
    require(&self.address, "address")?;
    require(&self.preferred_date, "preferred date")?;
    require(&self.time_slot, "time slot")?;
    Ok(())
  }

  /// Drops repair-only fields from non-repair bookings and blank descriptions.
  pub fn normalized(mut self) -> Self {
    if self.service_type.takes_details() {
      self.description = self
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    } else {
      self.description = None;
      self.image_url = None;
    }
    self
  }

  pub fn into_request(self, id: Uuid, created_at: DateTime<Utc>) -> ServiceRequest {
    ServiceRequest {
      id,
      user_id: self.user_id,
      full_name: self.full_name,
      phone: self.phone,
      address: self.address,
      service_type: self.service_type,
      description: self.description,
      preferred_date: self.preferred_date,
      time_slot: self.time_slot,
      status: ServiceStatus::initial(),
      technician_name: None,
      image_url: self.image_url,
      created_at,
    }
  }
}

impl std::str::FromStr for ServiceType {
  type Err = ShopError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "wall_mount" => Ok(ServiceType::WallMount),
      "demo" => Ok(ServiceType::Demo),
      "repair" => Ok(ServiceType::Repair),
      other => Err(ShopError::Validation(format!("unknown service type '{}'", other))),
    }
  }
}
