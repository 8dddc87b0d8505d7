// shopfront_app/src/web/handlers/storage_handlers.rs

use actix_web::http::header;
use actix_web::{web, HttpResponse};
use tracing::instrument;

use crate::errors::AppError;
use crate::state::AppState;

/// Public download of a stored object.
#[instrument(name = "handler::storage", skip(app_state))]
pub async fn download_object_handler(
  app_state: web::Data<AppState>,
  path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
  let (bucket, key) = path.into_inner();
  let file = app_state.backend.objects.download(&bucket, &key).await?;
  Ok(
    HttpResponse::Ok()
      .insert_header((header::CONTENT_TYPE, file.content_type))
      .insert_header((header::CACHE_CONTROL, "public, max-age=3600"))
      .body(file.bytes),
  )
}
