// tests/common/mod.rs
#![allow(dead_code)]

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use shopfront::models::{DeliveryContact, NewProduct, NewServiceRequest, Product, Role, ServiceType, StockStatus};
use shopfront::{AuthUser, Backend, MemoryBackend, MemoryCartStorage, Storefront, Upload};
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub fn memory() -> (MemoryBackend, Backend) {
  let memory = MemoryBackend::new();
  let backend = memory.backend();
  (memory, backend)
}

pub fn tv_draft(name: &str, price: i64) -> NewProduct {
  NewProduct {
    name: name.to_string(),
    brand: "Sonix".to_string(),
    screen_size: "55\"".to_string(),
    display_type: "OLED".to_string(),
    price: Decimal::from(price),
    emi_available: true,
    specs: "4K, HDR10".to_string(),
    warranty_info: "2 years".to_string(),
    stock_status: StockStatus::Available,
    image_url: None,
  }
}

pub async fn seed_product(backend: &Backend, name: &str, price: i64) -> Product {
  backend.store.insert_product(tv_draft(name, price)).await.unwrap()
}

pub fn contact() -> DeliveryContact {
  DeliveryContact {
    full_name: "Asha Rao".to_string(),
    phone: "9876543210".to_string(),
    address: "12 MG Road, Bengaluru".to_string(),
    notes: Some("Call before delivery".to_string()),
  }
}

pub fn screenshot() -> Upload {
  Upload::new("payment.PNG", "image/png", vec![0x89, 0x50, 0x4e, 0x47])
}

pub fn booking(service_type: ServiceType) -> NewServiceRequest {
  NewServiceRequest {
    user_id: Uuid::nil(),
    full_name: "Asha Rao".to_string(),
    phone: "9876543210".to_string(),
    address: "12 MG Road, Bengaluru".to_string(),
    service_type,
    description: Some("No picture, sound works".to_string()),
    preferred_date: "2026-11-02".to_string(),
    time_slot: "11:00 AM - 1:00 PM".to_string(),
    image_url: None,
  }
}

/// A storefront signed in as a fresh customer with an in-memory cart.
pub async fn customer_storefront(backend: &Backend) -> Storefront {
  let mut storefront = Storefront::new(backend.clone(), Box::new(MemoryCartStorage::new()));
  let email = format!("{}@example.com", Uuid::new_v4().simple());
  storefront.sign_up(&email, "hunter22").await.unwrap();
  storefront
}

pub fn seed_admin(memory: &MemoryBackend) -> AuthUser {
  memory.seed_account("admin@shop.test", "admin-pass", Role::Admin)
}

/// Lets spawned tasks run.
pub async fn settle() {
  tokio::time::sleep(Duration::from_millis(20)).await;
}
