// shopfront_app/src/web/routes.rs

use actix_web::web;

use crate::web::handlers::{
  admin_handlers as admin, auth_handlers as auth, catalog_handlers as catalog, checkout_handlers as checkout,
  order_handlers as orders, realtime_handlers as realtime, service_handlers as services, storage_handlers as storage,
};

async fn health_check_handler() -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .service(
      web::scope("/api/v1")
        .route("/health", web::get().to(health_check_handler))
        .service(
          web::scope("/auth")
            .route("/signup", web::post().to(auth::signup_handler))
            .route("/signin", web::post().to(auth::signin_handler))
            .route("/signout", web::post().to(auth::signout_handler))
            .route("/session", web::get().to(auth::session_handler)),
        )
        .service(
          web::scope("/products")
            .route("", web::get().to(catalog::list_products_handler))
            .route("/{product_id}", web::get().to(catalog::get_product_handler)),
        )
        .route("/banners", web::get().to(catalog::list_banners_handler))
        .service(
          web::resource("/reviews")
            .route(web::get().to(catalog::list_reviews_handler))
            .route(web::post().to(catalog::submit_review_handler)),
        )
        .route("/enquiries", web::post().to(catalog::submit_enquiry_handler))
        .route("/checkout", web::post().to(checkout::checkout_handler))
        .service(
          web::scope("/orders")
            .route("", web::get().to(orders::list_my_orders_handler))
            .route("/{order_id}", web::get().to(orders::get_my_order_handler)),
        )
        .service(
          web::resource("/services")
            .route(web::get().to(services::list_my_services_handler))
            .route(web::post().to(services::book_service_handler)),
        )
        .route("/realtime/{table}", web::get().to(realtime::stream_changes_handler))
        .service(
          web::scope("/admin")
            .route("/session", web::get().to(admin::admin_session_handler))
            .route("/dashboard", web::get().to(admin::dashboard_handler))
            .route("/enquiries", web::get().to(admin::list_enquiries_handler))
            .service(
              web::scope("/orders")
                .route("", web::get().to(admin::list_orders_handler))
                .route("/{order_id}", web::get().to(admin::order_detail_handler))
                .route("/{order_id}/approve", web::post().to(admin::approve_order_handler))
                .route("/{order_id}/reject", web::post().to(admin::reject_order_handler))
                .route("/{order_id}/status", web::patch().to(admin::set_order_status_handler)),
            )
            .service(
              web::scope("/services")
                .route("", web::get().to(admin::list_services_handler))
                .route("/{service_id}/status", web::patch().to(admin::set_service_status_handler))
                .route("/{service_id}/technician", web::patch().to(admin::assign_technician_handler)),
            )
            .service(
              web::scope("/products")
                .route("", web::get().to(admin::list_products_handler))
                .route("", web::post().to(admin::create_product_handler))
                .route("/{product_id}", web::put().to(admin::update_product_handler))
                .route("/{product_id}", web::delete().to(admin::delete_product_handler))
                .route("/{product_id}/archive", web::post().to(admin::archive_product_handler))
                .route("/{product_id}/stock", web::patch().to(admin::set_stock_handler))
                .route("/{product_id}/price", web::patch().to(admin::set_price_handler)),
            )
            .service(
              web::scope("/banners")
                .route("", web::get().to(admin::list_banners_handler))
                .route("", web::post().to(admin::create_banner_handler))
                .route("/{banner_id}", web::put().to(admin::update_banner_handler))
                .route("/{banner_id}", web::delete().to(admin::delete_banner_handler))
                .route("/{banner_id}/toggle", web::post().to(admin::toggle_banner_handler)),
            ),
        ),
    )
    .route("/storage/{bucket}/{key}", web::get().to(storage::download_object_handler));
}
