// tests/booking_tests.rs
mod common;
use common::*;
use serial_test::serial;
use shopfront::backend::memory::Failure;
use shopfront::backend::SERVICE_UPLOADS_BUCKET;
use shopfront::models::ServiceType;
use shopfront::{MemoryCartStorage, ServiceStatus, ShopError, Storefront, Table, Upload};

fn photo() -> Upload {
  Upload::new("cracked-panel.jpeg", "image/jpeg", vec![0xff, 0xd8, 0xff])
}

#[tokio::test]
#[serial]
async fn repair_booking_uploads_its_photo() {
  setup_tracing();
  let (memory, backend) = memory();
  let storefront = customer_storefront(&backend).await;
  let user_id = storefront.user_id().unwrap();

  let service = storefront
    .book_service(booking(ServiceType::Repair), Some(photo()))
    .await
    .unwrap();

  assert_eq!(service.status, ServiceStatus::Pending);
  assert_eq!(service.user_id, user_id);
  assert_eq!(service.description.as_deref(), Some("No picture, sound works"));
  assert_eq!(memory.object_count(SERVICE_UPLOADS_BUCKET), 1);
  let url = service.image_url.expect("photo url stored");
  assert!(url.contains(&format!("/service-uploads/{}-", user_id)));
  assert!(url.ends_with(".jpeg"));
}

#[tokio::test]
#[serial]
async fn non_repair_bookings_drop_description_and_photo() {
  setup_tracing();
  let (memory, backend) = memory();
  let storefront = customer_storefront(&backend).await;

  let service = storefront
    .book_service(booking(ServiceType::WallMount), Some(photo()))
    .await
    .unwrap();

  assert_eq!(service.service_type, ServiceType::WallMount);
  assert_eq!(service.description, None);
  assert_eq!(service.image_url, None);
  assert_eq!(memory.object_count(SERVICE_UPLOADS_BUCKET), 0);
}

#[tokio::test]
#[serial]
async fn blank_repair_description_is_stored_as_none() {
  setup_tracing();
  let (_memory, backend) = memory();
  let storefront = customer_storefront(&backend).await;
  let mut request = booking(ServiceType::Repair);
  request.description = Some("   ".to_string());

  let service = storefront.book_service(request, None).await.unwrap();

  assert_eq!(service.description, None);
  assert_eq!(service.image_url, None);
}

#[tokio::test]
#[serial]
async fn failed_photo_upload_books_nothing() {
  setup_tracing();
  let (memory, backend) = memory();
  let storefront = customer_storefront(&backend).await;
  memory.fail(Failure::Uploads);

  let err = storefront
    .book_service(booking(ServiceType::Repair), Some(photo()))
    .await
    .unwrap_err();

  assert!(matches!(err, ShopError::Upload { .. }));
  assert!(storefront.my_services().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn failed_insert_removes_the_photo() {
  setup_tracing();
  let (memory, backend) = memory();
  let storefront = customer_storefront(&backend).await;
  memory.fail(Failure::Writes(Table::Services));

  let err = storefront
    .book_service(booking(ServiceType::Repair), Some(photo()))
    .await
    .unwrap_err();

  assert!(matches!(err, ShopError::Store { .. }));
  assert_eq!(memory.object_count(SERVICE_UPLOADS_BUCKET), 0);
}

#[tokio::test]
#[serial]
async fn booking_requires_a_session_and_the_basics() {
  setup_tracing();
  let (_memory, backend) = memory();
  let guest = Storefront::new(backend.clone(), Box::new(MemoryCartStorage::new()));
  let err = guest.book_service(booking(ServiceType::Demo), None).await.unwrap_err();
  assert!(matches!(err, ShopError::Unauthenticated));

  let storefront = customer_storefront(&backend).await;
  let mut request = booking(ServiceType::Demo);
  request.time_slot = String::new();
  let err = storefront.book_service(request, None).await.unwrap_err();
  assert!(matches!(err, ShopError::Validation(_)));
}

#[tokio::test]
#[serial]
async fn customers_only_see_their_own_bookings() {
  setup_tracing();
  let (_memory, backend) = memory();
  let mine = customer_storefront(&backend).await;
  let theirs = customer_storefront(&backend).await;
  mine.book_service(booking(ServiceType::Demo), None).await.unwrap();
  theirs.book_service(booking(ServiceType::Repair), None).await.unwrap();
  theirs.book_service(booking(ServiceType::WallMount), None).await.unwrap();

  let listed = mine.my_services().await.unwrap();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].service_type, ServiceType::Demo);
  assert_eq!(theirs.my_services().await.unwrap().len(), 2);
}
