// tests/reconcile_tests.rs
mod common;
use common::*;
use serde_json::json;
use serial_test::serial;
use shopfront::backend::memory::Failure;
use shopfront::models::{Order, OrderWithItems, PaymentMethod, ServiceType};
use shopfront::reconcile::{apply_optimistic, merge_row, MergeView};
use shopfront::realtime::ChangeKind;
use shopfront::{
  AdminConsole, Backend, ChangeEvent, ChangeHub, MemoryBackend, OrderStatus, ServiceStatus, ShopError, Storefront,
  Table, TransitionPolicy,
};
use uuid::Uuid;

async fn placed_order(backend: &Backend) -> (Storefront, OrderWithItems) {
  let tv = seed_product(backend, "Sonix A55", 20000).await;
  let mut storefront = customer_storefront(backend).await;
  storefront.add_to_cart(tv);
  let receipt = storefront
    .checkout(contact(), PaymentMethod::Upi, Some(screenshot()))
    .await
    .unwrap();
  let order = storefront.my_order(receipt.order_id).await.unwrap();
  (storefront, order)
}

fn status_update(id: Uuid, status: &str) -> ChangeEvent {
  ChangeEvent {
    table: Table::Orders,
    kind: ChangeKind::Update,
    new: json!({ "id": id.to_string(), "order_status": status }),
    old: None,
    commit_timestamp: chrono::Utc::now(),
  }
}

#[tokio::test]
#[serial]
async fn partial_update_keeps_embedded_items() {
  setup_tracing();
  let (_memory, backend) = memory();
  let (_storefront, order) = placed_order(&backend).await;

  let merged = merge_row(&order, &json!({ "order_status": "confirmed" })).unwrap();

  assert_eq!(merged.order.order_status, OrderStatus::Confirmed);
  assert_eq!(merged.order_items, order.order_items);
  assert_eq!(merged.order.total_amount, order.order.total_amount);
}

#[tokio::test]
#[serial]
async fn merge_view_ignores_unknown_rows_and_other_kinds() {
  setup_tracing();
  let (_memory, backend) = memory();
  let (_storefront, order) = placed_order(&backend).await;
  let mut view = MergeView::new(vec![order.clone()]);

  assert!(!view.apply(&status_update(Uuid::new_v4(), "confirmed")));

  let mut insert = status_update(order.order.id, "confirmed");
  insert.kind = ChangeKind::Insert;
  assert!(!view.apply(&insert));
  assert_eq!(view.items()[0], order);

  assert!(view.apply(&status_update(order.order.id, "shipped")));
  assert_eq!(view.items()[0].order.order_status, OrderStatus::Shipped);
}

#[tokio::test]
#[serial]
async fn malformed_change_leaves_the_row_alone() {
  setup_tracing();
  let (_memory, backend) = memory();
  let (_storefront, order) = placed_order(&backend).await;
  let mut view = MergeView::new(vec![order.clone()]);

  assert!(!view.apply(&status_update(order.order.id, "teleported")));
  assert_eq!(view.items()[0], order);
}

#[tokio::test]
#[serial]
async fn customer_feed_merges_admin_decisions() {
  setup_tracing();
  let (_memory, backend) = memory();
  let (storefront, order) = placed_order(&backend).await;
  let admin = AdminConsole::new(backend.clone(), TransitionPolicy::default());
  let mut feed = storefront.watch_my_orders().await.unwrap();
  assert_eq!(feed.items().len(), 1);

  admin.approve_order(order.order.id).await.unwrap();
  assert!(feed.next().await.unwrap());

  let shown = &feed.items()[0];
  assert_eq!(shown.order.order_status, OrderStatus::Confirmed);
  assert_eq!(shown.order_items, order.order_items);
}

#[tokio::test]
#[serial]
async fn customer_feed_only_sees_own_orders() {
  setup_tracing();
  let (_memory, backend) = memory();
  let (mine, _order) = placed_order(&backend).await;
  let (_theirs, their_order) = placed_order(&backend).await;
  let admin = AdminConsole::new(backend.clone(), TransitionPolicy::default());
  let mut feed = mine.watch_my_orders().await.unwrap();

  admin.reject_order(their_order.order.id).await.unwrap();

  assert_eq!(feed.drain().await.unwrap(), 0);
  assert_eq!(feed.items()[0].order.order_status, OrderStatus::PendingVerification);
}

#[tokio::test]
#[serial]
async fn lagging_feed_resyncs_from_the_store() {
  setup_tracing();
  let memory = MemoryBackend::with_hub(ChangeHub::with_capacity(2));
  let backend = memory.backend();
  let (storefront, order) = placed_order(&backend).await;
  let admin = AdminConsole::new(backend.clone(), TransitionPolicy::Unconstrained);
  let mut feed = storefront.watch_my_orders().await.unwrap();

  admin.approve_order(order.order.id).await.unwrap();
  for status in [
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Rejected,
  ] {
    admin.set_order_status(order.order.id, status).await.unwrap();
  }

  assert!(feed.drain().await.unwrap() >= 1);
  assert_eq!(feed.items()[0].order.order_status, OrderStatus::Rejected);
  assert_eq!(feed.items()[0].order_items, order.order_items);
}

#[tokio::test]
#[serial]
async fn admin_table_refetches_on_new_orders() {
  setup_tracing();
  let (_memory, backend) = memory();
  let admin = AdminConsole::new(backend.clone(), TransitionPolicy::default());
  let mut table = admin.watch_orders(None).await.unwrap();
  assert!(table.items().is_empty());

  let (_storefront, order) = placed_order(&backend).await;

  assert!(table.drain().await.unwrap() >= 1);
  assert_eq!(table.items().len(), 1);
  assert_eq!(table.items()[0].id, order.order.id);
  assert_eq!(table.drain().await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn status_filter_applies_to_refetches() {
  setup_tracing();
  let (_memory, backend) = memory();
  let admin = AdminConsole::new(backend.clone(), TransitionPolicy::default());
  let (_storefront, order) = placed_order(&backend).await;
  let mut pending = admin.watch_orders(Some(OrderStatus::PendingVerification)).await.unwrap();
  assert_eq!(pending.items().len(), 1);

  admin.approve_order(order.order.id).await.unwrap();
  assert!(pending.next().await.unwrap());

  assert!(pending.items().is_empty());
}

#[tokio::test]
#[serial]
async fn customer_service_feed_merges_status_and_technician() {
  setup_tracing();
  let (_memory, backend) = memory();
  let storefront = customer_storefront(&backend).await;
  let other = customer_storefront(&backend).await;
  let service = storefront.book_service(booking(ServiceType::Repair), None).await.unwrap();
  let theirs = other.book_service(booking(ServiceType::Demo), None).await.unwrap();
  let admin = AdminConsole::new(backend.clone(), TransitionPolicy::default());
  let mut feed = storefront.watch_my_services().await.unwrap();
  assert_eq!(feed.items().len(), 1);

  admin.set_service_status(service.id, ServiceStatus::Confirmed).await.unwrap();
  admin.assign_technician(service.id, "Ravi").await.unwrap();
  admin.set_service_status(theirs.id, ServiceStatus::Cancelled).await.unwrap();

  assert_eq!(feed.drain().await.unwrap(), 2);
  let shown = &feed.items()[0];
  assert_eq!(shown.id, service.id);
  assert_eq!(shown.status, ServiceStatus::Confirmed);
  assert_eq!(shown.technician_name.as_deref(), Some("Ravi"));
}

#[tokio::test]
#[serial]
async fn optimistic_service_update_shows_at_once() {
  setup_tracing();
  let (_memory, backend) = memory();
  let storefront = customer_storefront(&backend).await;
  let service = storefront.book_service(booking(ServiceType::Demo), None).await.unwrap();
  let admin = AdminConsole::new(backend.clone(), TransitionPolicy::default());
  let mut table = admin.watch_services().await.unwrap();

  let stored = admin
    .set_service_status_optimistic(table.view_mut(), service.id, ServiceStatus::Confirmed)
    .await
    .unwrap();

  assert_eq!(stored.status, ServiceStatus::Confirmed);
  assert_eq!(table.items()[0].status, ServiceStatus::Confirmed);
}

#[tokio::test]
#[serial]
async fn failed_optimistic_update_rolls_back() {
  setup_tracing();
  let (memory, backend) = memory();
  let storefront = customer_storefront(&backend).await;
  let service = storefront.book_service(booking(ServiceType::Demo), None).await.unwrap();
  let admin = AdminConsole::new(backend.clone(), TransitionPolicy::default());
  let mut table = admin.watch_services().await.unwrap();
  memory.fail(Failure::Writes(Table::Services));

  let err = admin
    .set_service_status_optimistic(table.view_mut(), service.id, ServiceStatus::Cancelled)
    .await
    .unwrap_err();

  assert!(matches!(err, ShopError::Store { .. }));
  assert_eq!(table.items()[0].status, ServiceStatus::Pending);
}

#[tokio::test]
#[serial]
async fn optimistic_mutation_is_visible_while_the_write_runs() {
  setup_tracing();
  let (_memory, backend) = memory();
  let (_storefront, order) = placed_order(&backend).await;
  let mut rows = vec![order.order.clone()];
  let id = order.order.id;

  let result = apply_optimistic(&mut rows, id, |o: &mut Order| o.order_status = OrderStatus::Confirmed, async {
    Err::<Order, _>(ShopError::Conflict("raced".to_string()))
  })
  .await;

  assert!(result.is_err());
  assert_eq!(rows[0].order_status, OrderStatus::PendingVerification);
}
