// shopfront/src/lifecycle/service.rs

use crate::backend::Store;
use crate::error::{ShopError, ShopResult};
use crate::models::ServiceRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "service_status", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
  Pending,
  Confirmed,
  InProgress,
  Completed,
  Cancelled,
}

impl ServiceStatus {
  pub const ALL: [ServiceStatus; 5] = [
    ServiceStatus::Pending,
    ServiceStatus::Confirmed,
    ServiceStatus::InProgress,
    ServiceStatus::Completed,
    ServiceStatus::Cancelled,
  ];

  pub fn initial() -> Self {
    ServiceStatus::Pending
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      ServiceStatus::Pending => "pending",
      ServiceStatus::Confirmed => "confirmed",
      ServiceStatus::InProgress => "in_progress",
      ServiceStatus::Completed => "completed",
      ServiceStatus::Cancelled => "cancelled",
    }
  }
}

impl std::fmt::Display for ServiceStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for ServiceStatus {
  type Err = ShopError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ServiceStatus::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| ShopError::Validation(format!("unknown service status '{}'", s)))
  }
}

/// Service bookings have no guarded workflow: any status may follow any
/// other, and the technician is a separate field.
#[derive(Clone)]
pub struct ServiceLifecycle {
  store: Arc<dyn Store>,
}

impl ServiceLifecycle {
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self { store }
  }

  #[instrument(name = "ServiceLifecycle::set_status", skip(self), err(Display))]
  pub async fn set_status(&self, service_id: Uuid, to: ServiceStatus) -> ShopResult<ServiceRequest> {
    let updated = self.store.update_service_status(service_id, to).await?;
    event!(Level::INFO, %service_id, status = %to, "Service status changed.");
    Ok(updated)
  }

  /// Blank names clear the assignment.
  #[instrument(name = "ServiceLifecycle::assign_technician", skip(self), err(Display))]
  pub async fn assign_technician(&self, service_id: Uuid, technician: &str) -> ShopResult<ServiceRequest> {
    let technician = Some(technician.trim().to_string()).filter(|name| !name.is_empty());
    self.store.update_service_technician(service_id, technician).await
  }
}
