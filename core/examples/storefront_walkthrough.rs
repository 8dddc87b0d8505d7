// shopfront/examples/storefront_walkthrough.rs

//! A customer pays by UPI, an admin verifies the screenshot, and the
//! customer's order list picks up the new status from the change feed.
//!
//! Run with `cargo run -p shopfront --example storefront_walkthrough`.

use rust_decimal::Decimal;
use shopfront::models::{DeliveryContact, NewProduct, PaymentMethod, Role, StockStatus};
use shopfront::{AdminConsole, MemoryBackend, MemoryCartStorage, ShopResult, Storefront, TransitionPolicy, Upload};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> ShopResult<()> {
  tracing_subscriber::fmt().with_max_level(Level::INFO).init();

  let memory = MemoryBackend::new();
  memory.seed_account("owner@shop.test", "owner-pass", Role::Admin);
  let admin = AdminConsole::new(memory.backend(), TransitionPolicy::default());

  let tv = admin
    .create_product(
      NewProduct {
        name: "Sonix A55".to_string(),
        brand: "Sonix".to_string(),
        screen_size: "55\"".to_string(),
        display_type: "QLED".to_string(),
        price: Decimal::from(45_000),
        emi_available: true,
        specs: "4K, 120Hz".to_string(),
        warranty_info: "2 years".to_string(),
        stock_status: StockStatus::Available,
        image_url: None,
      },
      None,
    )
    .await?;

  let mut shop = Storefront::new(memory.backend(), Box::new(MemoryCartStorage::new()));
  shop.sign_up("asha@shop.test", "hunter22").await?;
  shop.add_to_cart(tv.clone());
  shop.add_to_cart(tv);
  info!(items = shop.cart().item_count(), total = %shop.cart().total(), "Cart ready.");

  let receipt = shop
    .checkout(
      DeliveryContact {
        full_name: "Asha Rao".to_string(),
        phone: "9876543210".to_string(),
        address: "12 MG Road, Bengaluru".to_string(),
        notes: None,
      },
      PaymentMethod::Upi,
      Some(Upload::new("paid.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47])),
    )
    .await?;
  info!(order_id = %receipt.order_id, status = %receipt.order_status, "Order placed.");

  let mut my_orders = shop.watch_my_orders().await?;
  admin.approve_order(receipt.order_id).await?;
  my_orders.next().await?;

  for order in my_orders.items() {
    info!(order_id = %order.order.id, status = %order.order.order_status, "Customer sees update.");
  }
  Ok(())
}
