// shopfront_app/src/web/tests.rs

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use shopfront::backend::memory::Failure;
use shopfront::backend::PAYMENT_PROOFS_BUCKET;
use shopfront::models::{NewProduct, Product, Role, StockStatus};
use shopfront::realtime::{ChangeKind, EventFilter};
use shopfront::{Delivery, MemoryBackend, Table};
use std::collections::HashMap;
use std::sync::Arc;

use super::configure_app_routes;
use super::handlers::realtime_handlers::{delivery_to_bytes, scoped_filter};
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::state::AppState;

const ADMIN_EMAIL: &str = "owner@shop.test";
const ADMIN_PASSWORD: &str = "owner-pass";

fn state_for(memory: &MemoryBackend) -> AppState {
  let vars: HashMap<&str, &str> = HashMap::from([("DATABASE_URL", "postgres://unused/shop")]);
  let config = AppConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
  AppState::new(memory.backend(), Arc::new(config))
}

macro_rules! test_app {
  ($state:expr) => {
    test::init_service(
      App::new()
        .app_data(web::Data::new($state))
        .configure(configure_app_routes),
    )
    .await
  };
}

macro_rules! call {
  ($app:expr, $req:expr) => {{
    let resp = test::call_service(&$app, $req.to_request()).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
  }};
}

fn bearer(token: &str) -> (header::HeaderName, String) {
  (header::AUTHORIZATION, format!("Bearer {}", token))
}

async fn seed_tv(memory: &MemoryBackend, name: &str, price: i64) -> Product {
  memory
    .backend()
    .store
    .insert_product(NewProduct {
      name: name.to_string(),
      brand: "Sonix".to_string(),
      screen_size: "55\"".to_string(),
      display_type: "QLED".to_string(),
      price: Decimal::from(price),
      emi_available: true,
      specs: "4K, 120Hz".to_string(),
      warranty_info: "2 years".to_string(),
      stock_status: StockStatus::Available,
      image_url: None,
    })
    .await
    .unwrap()
}

fn contact() -> Value {
  json!({"full_name": "Asha Rao", "phone": "9876543210", "address": "12 MG Road, Bengaluru"})
}

fn proof() -> Value {
  json!({"file_name": "paid.png", "content_type": "image/png", "data_hex": "89504e470d0a1a0a"})
}

macro_rules! sign_up {
  ($app:expr, $email:expr) => {{
    let (status, body) = call!(
      $app,
      test::TestRequest::post()
        .uri("/api/v1/auth/signup")
        .set_json(json!({"email": $email, "password": "hunter22"}))
    );
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["session"]["access_token"].as_str().unwrap().to_string()
  }};
}

macro_rules! sign_in_admin {
  ($app:expr, $memory:expr) => {{
    $memory.seed_account(ADMIN_EMAIL, ADMIN_PASSWORD, Role::Admin);
    let (status, body) = call!(
      $app,
      test::TestRequest::post()
        .uri("/api/v1/auth/signin")
        .set_json(json!({"email": ADMIN_EMAIL, "password": ADMIN_PASSWORD}))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
    body["session"]["access_token"].as_str().unwrap().to_string()
  }};
}

#[actix_web::test]
async fn health_is_ok() {
  let memory = MemoryBackend::new();
  let app = test_app!(state_for(&memory));
  let (status, body) = call!(app, test::TestRequest::get().uri("/api/v1/health"));
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn signup_creates_customer_session() {
  let memory = MemoryBackend::new();
  let app = test_app!(state_for(&memory));
  let token = sign_up!(app, "asha@shop.test");

  let (status, body) = call!(
    app,
    test::TestRequest::get().uri("/api/v1/auth/session").insert_header(bearer(&token))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["role"], "customer");
  assert_eq!(body["session"]["user"]["email"], "asha@shop.test");

  let (status, _) = call!(app, test::TestRequest::get().uri("/api/v1/auth/session"));
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) = call!(
    app,
    test::TestRequest::post().uri("/api/v1/auth/signout").insert_header(bearer(&token))
  );
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = call!(
    app,
    test::TestRequest::get().uri("/api/v1/auth/session").insert_header(bearer(&token))
  );
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn wrong_password_is_unauthorized() {
  let memory = MemoryBackend::new();
  let app = test_app!(state_for(&memory));
  sign_up!(app, "asha@shop.test");
  let (status, _) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/auth/signin")
      .set_json(json!({"email": "asha@shop.test", "password": "nope-nope"}))
  );
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn email_case_does_not_make_a_second_account() {
  let memory = MemoryBackend::new();
  let app = test_app!(state_for(&memory));
  sign_up!(app, "Asha@Shop.test");

  let (status, _) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/auth/signup")
      .set_json(json!({"email": "asha@shop.test", "password": "other-pass"}))
  );
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, body) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/auth/signin")
      .set_json(json!({"email": "ASHA@shop.test", "password": "hunter22"}))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["session"]["user"]["email"], "asha@shop.test");
}

#[actix_web::test]
async fn cash_checkout_confirms_and_lists_order() {
  let memory = MemoryBackend::new();
  let tv = seed_tv(&memory, "Sonix A55", 45_000).await;
  let app = test_app!(state_for(&memory));
  let token = sign_up!(app, "asha@shop.test");

  let (status, receipt) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/checkout")
      .insert_header(bearer(&token))
      .set_json(json!({
        "lines": [{"product_id": tv.id, "quantity": 2}],
        "contact": contact(),
        "payment_method": "cash",
      }))
  );
  assert_eq!(status, StatusCode::CREATED, "{}", receipt);
  assert_eq!(receipt["order_status"], "confirmed");
  let total: Decimal = serde_json::from_value(receipt["total_amount"].clone()).unwrap();
  assert_eq!(total, Decimal::from(90_000));

  let (status, orders) = call!(
    app,
    test::TestRequest::get().uri("/api/v1/orders").insert_header(bearer(&token))
  );
  assert_eq!(status, StatusCode::OK);
  let orders = orders.as_array().unwrap();
  assert_eq!(orders.len(), 1);
  assert_eq!(orders[0]["order_items"][0]["quantity"], 2);
  assert_eq!(orders[0]["order_items"][0]["products"]["name"], "Sonix A55");
}

#[actix_web::test]
async fn guest_checkout_is_refused_without_writes() {
  let memory = MemoryBackend::new();
  let tv = seed_tv(&memory, "Sonix A55", 45_000).await;
  let app = test_app!(state_for(&memory));
  let before = memory.calls();

  let (status, _) = call!(
    app,
    test::TestRequest::post().uri("/api/v1/checkout").set_json(json!({
      "lines": [{"product_id": tv.id, "quantity": 1}],
      "contact": contact(),
      "payment_method": "cash",
    }))
  );
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(memory.calls(), before);
}

#[actix_web::test]
async fn upi_checkout_needs_proof_and_serves_it_back() {
  let memory = MemoryBackend::new();
  let tv = seed_tv(&memory, "Sonix A55", 45_000).await;
  let app = test_app!(state_for(&memory));
  let token = sign_up!(app, "asha@shop.test");
  let lines = json!([{"product_id": tv.id, "quantity": 1}]);

  let (status, _) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/checkout")
      .insert_header(bearer(&token))
      .set_json(json!({"lines": lines, "contact": contact(), "payment_method": "upi"}))
  );
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(memory.object_count(PAYMENT_PROOFS_BUCKET), 0);

  let (status, _) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/checkout")
      .insert_header(bearer(&token))
      .set_json(json!({
        "lines": lines,
        "contact": contact(),
        "payment_method": "upi",
        "payment_proof": {"file_name": "paid.png", "data_hex": "zz"},
      }))
  );
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, receipt) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/checkout")
      .insert_header(bearer(&token))
      .set_json(json!({"lines": lines, "contact": contact(), "payment_method": "upi", "payment_proof": proof()}))
  );
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(receipt["order_status"], "pending_verification");
  assert_eq!(memory.object_count(PAYMENT_PROOFS_BUCKET), 1);

  let order_id = receipt["order_id"].as_str().unwrap();
  let (_, order) = call!(
    app,
    test::TestRequest::get()
      .uri(&format!("/api/v1/orders/{}", order_id))
      .insert_header(bearer(&token))
  );
  let proof_url = order["payment_proof_url"].as_str().unwrap();
  let key = proof_url.rsplit('/').next().unwrap();

  let resp = test::call_service(
    &app,
    test::TestRequest::get()
      .uri(&format!("/storage/{}/{}", PAYMENT_PROOFS_BUCKET, key))
      .to_request(),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
  let bytes = test::read_body(resp).await;
  assert_eq!(bytes.as_ref(), &hex::decode("89504e470d0a1a0a").unwrap()[..]);
}

#[actix_web::test]
async fn other_customers_orders_are_not_found() {
  let memory = MemoryBackend::new();
  let tv = seed_tv(&memory, "Sonix A55", 45_000).await;
  let app = test_app!(state_for(&memory));
  let owner = sign_up!(app, "asha@shop.test");
  let stranger = sign_up!(app, "ravi@shop.test");

  let (_, receipt) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/checkout")
      .insert_header(bearer(&owner))
      .set_json(json!({"lines": [{"product_id": tv.id, "quantity": 1}], "contact": contact(), "payment_method": "cash"}))
  );
  let uri = format!("/api/v1/orders/{}", receipt["order_id"].as_str().unwrap());

  let (status, _) = call!(app, test::TestRequest::get().uri(&uri).insert_header(bearer(&stranger)));
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, orders) = call!(
    app,
    test::TestRequest::get().uri("/api/v1/orders").insert_header(bearer(&stranger))
  );
  assert_eq!(status, StatusCode::OK);
  assert!(orders.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn customer_at_admin_gate_is_signed_out() {
  let memory = MemoryBackend::new();
  let app = test_app!(state_for(&memory));
  let token = sign_up!(app, "asha@shop.test");

  let (status, body) = call!(
    app,
    test::TestRequest::get().uri("/api/v1/admin/dashboard").insert_header(bearer(&token))
  );
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["redirect"], "/admin/login");

  let (status, _) = call!(
    app,
    test::TestRequest::get().uri("/api/v1/auth/session").insert_header(bearer(&token))
  );
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, body) = call!(app, test::TestRequest::get().uri("/api/v1/admin/orders"));
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["redirect"], "/admin/login");
}

#[actix_web::test]
async fn admin_verifies_upi_order_once() {
  let memory = MemoryBackend::new();
  let tv = seed_tv(&memory, "Sonix A55", 45_000).await;
  let app = test_app!(state_for(&memory));
  let customer = sign_up!(app, "asha@shop.test");
  let admin = sign_in_admin!(app, memory);

  let (_, receipt) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/checkout")
      .insert_header(bearer(&customer))
      .set_json(json!({
        "lines": [{"product_id": tv.id, "quantity": 1}],
        "contact": contact(),
        "payment_method": "upi",
        "payment_proof": proof(),
      }))
  );
  let order_id = receipt["order_id"].as_str().unwrap().to_string();

  let (status, pending) = call!(
    app,
    test::TestRequest::get()
      .uri("/api/v1/admin/orders?status=pending_verification")
      .insert_header(bearer(&admin))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(pending.as_array().unwrap().len(), 1);

  let approve = format!("/api/v1/admin/orders/{}/approve", order_id);
  let (status, order) = call!(app, test::TestRequest::post().uri(&approve).insert_header(bearer(&admin)));
  assert_eq!(status, StatusCode::OK);
  assert_eq!(order["order_status"], "confirmed");

  let (status, _) = call!(app, test::TestRequest::post().uri(&approve).insert_header(bearer(&admin)));
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, order) = call!(
    app,
    test::TestRequest::patch()
      .uri(&format!("/api/v1/admin/orders/{}/status", order_id))
      .insert_header(bearer(&admin))
      .set_json(json!({"status": "shipped"}))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(order["order_status"], "shipped");

  let (status, _) = call!(
    app,
    test::TestRequest::patch()
      .uri(&format!("/api/v1/admin/orders/{}/status", order_id))
      .insert_header(bearer(&admin))
      .set_json(json!({"status": "pending_verification"}))
  );
  assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn demoted_admin_cannot_approve_on_next_request() {
  let memory = MemoryBackend::new();
  let tv = seed_tv(&memory, "Sonix A55", 45_000).await;
  let app = test_app!(state_for(&memory));
  let customer = sign_up!(app, "asha@shop.test");
  let admin = sign_in_admin!(app, memory);

  let (_, receipt) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/checkout")
      .insert_header(bearer(&customer))
      .set_json(json!({
        "lines": [{"product_id": tv.id, "quantity": 1}],
        "contact": contact(),
        "payment_method": "upi",
        "payment_proof": proof(),
      }))
  );
  let order_id = receipt["order_id"].as_str().unwrap().to_string();

  let (status, _) = call!(
    app,
    test::TestRequest::get().uri("/api/v1/admin/orders").insert_header(bearer(&admin))
  );
  assert_eq!(status, StatusCode::OK);

  let backend = memory.backend();
  let admin_user = backend.identity.get_user(&admin).await.unwrap().unwrap();
  backend
    .store
    .upsert_profile(admin_user.id, &admin_user.email, Role::Customer)
    .await
    .unwrap();

  let (status, body) = call!(
    app,
    test::TestRequest::post()
      .uri(&format!("/api/v1/admin/orders/{}/approve", order_id))
      .insert_header(bearer(&admin))
  );
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["redirect"], "/admin/login");

  let (_, order) = call!(
    app,
    test::TestRequest::get()
      .uri(&format!("/api/v1/orders/{}", order_id))
      .insert_header(bearer(&customer))
  );
  assert_eq!(order["order_status"], "pending_verification");
}

#[actix_web::test]
async fn ordered_product_delete_offers_archive() {
  let memory = MemoryBackend::new();
  let tv = seed_tv(&memory, "Sonix A55", 45_000).await;
  let app = test_app!(state_for(&memory));
  let customer = sign_up!(app, "asha@shop.test");
  let admin = sign_in_admin!(app, memory);
  call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/checkout")
      .insert_header(bearer(&customer))
      .set_json(json!({"lines": [{"product_id": tv.id, "quantity": 1}], "contact": contact(), "payment_method": "cash"}))
  );

  let product_uri = format!("/api/v1/admin/products/{}", tv.id);
  let (status, body) = call!(app, test::TestRequest::delete().uri(&product_uri).insert_header(bearer(&admin)));
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["code"], "23503");
  assert_eq!(body["hint"], "archive");

  let (status, archived) = call!(
    app,
    test::TestRequest::post()
      .uri(&format!("{}/archive", product_uri))
      .insert_header(bearer(&admin))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(archived["is_archived"], true);

  let (_, catalog) = call!(app, test::TestRequest::get().uri("/api/v1/products"));
  assert!(catalog.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn admin_manages_products_and_banners() {
  let memory = MemoryBackend::new();
  let app = test_app!(state_for(&memory));
  let admin = sign_in_admin!(app, memory);

  let (status, product) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/admin/products")
      .insert_header(bearer(&admin))
      .set_json(json!({
        "product": {"name": "Sonix B65", "brand": "Sonix", "screen_size": "65\"", "display_type": "OLED", "price": "89999"},
        "image": {"file_name": "b65.webp", "content_type": "image/webp", "data_hex": "52494646"},
      }))
  );
  assert_eq!(status, StatusCode::CREATED, "{}", product);
  assert!(product["image_url"].as_str().unwrap().ends_with(".webp"));

  let price_uri = format!("/api/v1/admin/products/{}/price", product["id"].as_str().unwrap());
  let (status, _) = call!(
    app,
    test::TestRequest::patch()
      .uri(&price_uri)
      .insert_header(bearer(&admin))
      .set_json(json!({"price": "0"}))
  );
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let stock_uri = format!("/api/v1/admin/products/{}/stock", product["id"].as_str().unwrap());
  let (status, updated) = call!(
    app,
    test::TestRequest::patch()
      .uri(&stock_uri)
      .insert_header(bearer(&admin))
      .set_json(json!({"stock_status": "out_of_stock"}))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["stock_status"], "out_of_stock");

  let (status, banner) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/admin/banners")
      .insert_header(bearer(&admin))
      .set_json(json!({
        "banner": {"title": "Diwali sale"},
        "image": {"file_name": "sale.jpg", "content_type": "image/jpeg", "data_hex": "ffd8ffe0"},
      }))
  );
  assert_eq!(status, StatusCode::CREATED, "{}", banner);

  let (_, public) = call!(app, test::TestRequest::get().uri("/api/v1/banners"));
  assert_eq!(public.as_array().unwrap().len(), 1);

  let toggle = format!("/api/v1/admin/banners/{}/toggle", banner["id"].as_str().unwrap());
  let (status, toggled) = call!(app, test::TestRequest::post().uri(&toggle).insert_header(bearer(&admin)));
  assert_eq!(status, StatusCode::OK);
  assert_eq!(toggled["active"], false);
  let (_, public) = call!(app, test::TestRequest::get().uri("/api/v1/banners"));
  assert!(public.as_array().unwrap().is_empty());

  let (status, stats) = call!(
    app,
    test::TestRequest::get().uri("/api/v1/admin/dashboard").insert_header(bearer(&admin))
  );
  assert_eq!(status, StatusCode::OK);
  assert_eq!(stats["products"], 1);
  assert_eq!(stats["active_banners"], 0);
}

#[actix_web::test]
async fn repair_booking_with_photo() {
  let memory = MemoryBackend::new();
  let app = test_app!(state_for(&memory));
  let token = sign_up!(app, "asha@shop.test");

  let (status, service) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/services")
      .insert_header(bearer(&token))
      .set_json(json!({
        "full_name": "Asha Rao",
        "phone": "9876543210",
        "address": "12 MG Road",
        "service_type": "repair",
        "description": "Lines across the panel",
        "preferred_date": "2026-11-02",
        "time_slot": "10:00-12:00",
        "photo": {"file_name": "panel.jpeg", "content_type": "image/jpeg", "data_hex": "ffd8ff"},
      }))
  );
  assert_eq!(status, StatusCode::CREATED, "{}", service);
  assert_eq!(service["status"], "pending");
  assert!(service["image_url"].as_str().unwrap().contains("/service-uploads/"));

  let (_, mine) = call!(
    app,
    test::TestRequest::get().uri("/api/v1/services").insert_header(bearer(&token))
  );
  assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn booking_rolls_back_photo_when_insert_fails() {
  let memory = MemoryBackend::new();
  let app = test_app!(state_for(&memory));
  let token = sign_up!(app, "asha@shop.test");
  memory.fail(Failure::Writes(Table::Services));

  let (status, _) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/services")
      .insert_header(bearer(&token))
      .set_json(json!({
        "full_name": "Asha Rao",
        "phone": "9876543210",
        "address": "12 MG Road",
        "service_type": "repair",
        "preferred_date": "2026-11-02",
        "time_slot": "10:00-12:00",
        "photo": {"file_name": "panel.jpeg", "data_hex": "ffd8ff"},
      }))
  );
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(memory.object_count("service-uploads"), 0);
}

#[actix_web::test]
async fn enquiries_and_reviews_validate() {
  let memory = MemoryBackend::new();
  let tv = seed_tv(&memory, "Sonix A55", 45_000).await;
  let app = test_app!(state_for(&memory));

  let (status, _) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/enquiries")
      .set_json(json!({"name": "Ravi", "phone": "12345"}))
  );
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, enquiry) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/enquiries")
      .set_json(json!({"product_id": tv.id, "name": "Ravi", "phone": "9123456780"}))
  );
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(enquiry["message"], "Enquiry about Sonix A55");

  let (status, _) = call!(
    app,
    test::TestRequest::post()
      .uri("/api/v1/reviews")
      .set_json(json!({"name": "Ravi", "rating": 7, "message": "Great"}))
  );
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn private_streams_need_the_right_caller() {
  let memory = MemoryBackend::new();
  let app = test_app!(state_for(&memory));
  let token = sign_up!(app, "asha@shop.test");

  let (status, _) = call!(app, test::TestRequest::get().uri("/api/v1/realtime/orders"));
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) = call!(
    app,
    test::TestRequest::get()
      .uri("/api/v1/realtime/enquiries")
      .insert_header(bearer(&token))
  );
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = call!(app, test::TestRequest::get().uri("/api/v1/realtime/widgets"));
  assert_eq!(status, StatusCode::NOT_FOUND);

  let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/realtime/products").to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "text/event-stream");
}

#[actix_web::test]
async fn customer_order_stream_is_scoped_to_owner() {
  let memory = MemoryBackend::new();
  let state = state_for(&memory);
  let customer = memory.seed_account("asha@shop.test", "hunter22", Role::Customer);
  let admin = memory.seed_account(ADMIN_EMAIL, ADMIN_PASSWORD, Role::Admin);

  let scoped = scoped_filter(&state, Table::Orders, EventFilter::Update, Some(customer.id))
    .await
    .unwrap();
  assert_eq!(scoped.row.unwrap().to_string(), format!("user_id=eq.{}", customer.id));

  let unscoped = scoped_filter(&state, Table::Orders, EventFilter::All, Some(admin.id))
    .await
    .unwrap();
  assert!(unscoped.row.is_none());

  let err = scoped_filter(&state, Table::Services, EventFilter::All, None).await.unwrap_err();
  assert!(matches!(err, AppError::Shop { .. }));

  let public = scoped_filter(&state, Table::Reviews, EventFilter::Insert, None).await.unwrap();
  assert_eq!(public.events, EventFilter::Insert);
}

#[actix_web::test]
async fn frames_follow_event_stream_format() {
  let memory = MemoryBackend::new();
  let mut sub = memory
    .changes()
    .subscribe(shopfront::ChangeFilter::table(Table::Products));
  let tv = seed_tv(&memory, "Sonix A55", 45_000).await;

  let delivery = sub.try_next().unwrap();
  let frame = String::from_utf8(delivery_to_bytes(&delivery).to_vec()).unwrap();
  assert!(frame.starts_with("event: change\ndata: {"));
  assert!(frame.ends_with("\n\n"));
  assert!(frame.contains(&tv.id.to_string()));
  if let Delivery::Change(change) = delivery {
    assert_eq!(change.kind, ChangeKind::Insert);
  }

  let resync = String::from_utf8(delivery_to_bytes(&Delivery::Resync { missed: 4 }).to_vec()).unwrap();
  assert_eq!(resync, "event: resync\ndata: {\"missed\":4}\n\n");
}
