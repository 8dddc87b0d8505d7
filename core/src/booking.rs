// shopfront/src/booking.rs

//! Service booking: validate, upload the repair photo if there is one, insert.

use crate::backend::{random_token, Backend, Upload, SERVICE_UPLOADS_BUCKET};
use crate::context::ContextData;
use crate::error::{ShopError, ShopResult};
use crate::models::{NewServiceRequest, ServiceRequest};
use crate::workflow::{SkipCondition, StepControl, Workflow, WorkflowResult, Workflows};
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

#[derive(Clone)]
pub struct BookingCtxData {
  pub backend: Backend,
  pub request: NewServiceRequest,
  pub photo: Option<Upload>,
  pub photo_key: Option<String>,
  pub service: Option<ServiceRequest>,
}

impl BookingCtxData {
  pub fn new(backend: Backend, request: NewServiceRequest, photo: Option<Upload>) -> Self {
    Self {
      backend,
      request,
      photo,
      photo_key: None,
      service: None,
    }
  }
}

/// `<user id>-<random>.<ext>`
pub fn service_photo_key(user_id: Uuid, file: &Upload) -> String {
  format!("{}-{}.{}", user_id, random_token(12), file.extension())
}

fn validate(request: &NewServiceRequest) -> ShopResult<()> {
  if request.user_id.is_nil() {
    return Err(ShopError::Unauthenticated);
  }
  request.validate()
}

pub fn booking_workflow() -> Workflow<BookingCtxData, ShopError> {
  let no_photo: SkipCondition<BookingCtxData> = Arc::new(|ctx_data: ContextData<BookingCtxData>| {
    let data = ctx_data.read();
    !data.request.service_type.takes_details() || data.photo.is_none()
  });

  let mut w = Workflow::<BookingCtxData, ShopError>::new(
    "service_booking",
    &[
      ("validate_booking", false, None),
      ("upload_service_photo", false, Some(no_photo)),
      ("insert_service_request", false, None),
    ],
  );

  w.on_step("validate_booking", |ctx_data: ContextData<BookingCtxData>| async move {
    ctx_data.with(|data| validate(&data.request))?;
    ctx_data.update(|data| {
      data.request = data.request.clone().normalized();
      if !data.request.service_type.takes_details() {
        data.photo = None;
      }
    });
    Ok::<_, ShopError>(StepControl::Continue)
  });

  w.on_step("upload_service_photo", |ctx_data: ContextData<BookingCtxData>| async move {
    let (objects, user_id, photo) = ctx_data.with(|data| {
      (Arc::clone(&data.backend.objects), data.request.user_id, data.photo.clone())
    });
    let Some(photo) = photo else {
      return Ok(StepControl::Continue);
    };
    let key = service_photo_key(user_id, &photo);
    let url = objects.upload(SERVICE_UPLOADS_BUCKET, &key, photo).await?;
    ctx_data.update(|data| {
      data.photo_key = Some(key);
      data.request.image_url = Some(url);
    });
    Ok::<_, ShopError>(StepControl::Continue)
  });

  w.compensate_step("upload_service_photo", |ctx_data: ContextData<BookingCtxData>| async move {
    let (objects, key) = ctx_data.with(|data| (Arc::clone(&data.backend.objects), data.photo_key.clone()));
    if let Some(key) = key {
      objects.remove(SERVICE_UPLOADS_BUCKET, &[key]).await?;
    }
    Ok::<_, ShopError>(())
  });

  w.on_step("insert_service_request", |ctx_data: ContextData<BookingCtxData>| async move {
    let (store, request) = ctx_data.with(|data| (Arc::clone(&data.backend.store), data.request.clone()));
    let service = store.insert_service(request).await?;
    event!(Level::INFO, service_id = %service.id, service_type = service.service_type.as_str(), "Service booked.");
    ctx_data.write().service = Some(service);
    Ok::<_, ShopError>(StepControl::Continue)
  });

  w
}

#[instrument(name = "booking::book_service", skip_all, fields(service_type = request.service_type.as_str()))]
pub async fn book_service<E>(
  workflows: &Workflows<E>,
  backend: &Backend,
  request: NewServiceRequest,
  photo: Option<Upload>,
) -> Result<ServiceRequest, E>
where
  E: std::error::Error + From<ShopError> + Send + Sync + 'static,
{
  let ctx_data = ContextData::new(BookingCtxData::new(backend.clone(), request, photo));
  match workflows.run(ctx_data.clone()).await? {
    WorkflowResult::Completed => {}
    WorkflowResult::Stopped => return Err(E::from(ShopError::Internal("booking stopped early".to_string()))),
  }
  ctx_data
    .with(|data| data.service.clone())
    .ok_or_else(|| E::from(ShopError::Internal("booking finished without a service row".to_string())))
}
