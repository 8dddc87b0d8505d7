// shopfront_app/src/web/handlers/realtime_handlers.rs

//! Server-sent events for the change feed. Frames are `event: change` with
//! the `ChangeEvent` as data, or `event: resync` when the subscriber fell
//! behind and must refetch.

use actix_web::http::header;
use actix_web::{web, HttpResponse};
use futures_util::stream;
use serde::Deserialize;
use shopfront::realtime::{EventFilter, RowFilter};
use shopfront::{ChangeFilter, Delivery, ShopError, Subscription, Table};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::MaybeUser;

#[derive(Deserialize, Debug, Default)]
pub struct StreamQuery {
  /// `INSERT`, `UPDATE`, `DELETE` or `*`.
  pub event: Option<String>,
  /// For clients that cannot set headers on an event stream.
  pub access_token: Option<String>,
}

pub fn delivery_to_bytes(delivery: &Delivery) -> web::Bytes {
  let frame = match delivery {
    Delivery::Change(change) => {
      let payload = serde_json::to_string(change).unwrap_or_else(|_| "{}".to_string());
      format!("event: change\ndata: {}\n\n", payload)
    }
    Delivery::Resync { missed } => format!("event: resync\ndata: {{\"missed\":{}}}\n\n", missed),
  };
  web::Bytes::from(frame)
}

async fn caller_id(app_state: &AppState, user: MaybeUser, query_token: Option<&str>) -> Result<Option<Uuid>, AppError> {
  if let Some(user) = user.0 {
    return Ok(Some(user.user_id));
  }
  match query_token {
    Some(token) => Ok(app_state.backend.identity.get_user(token).await?.map(|u| u.id)),
    None => Ok(None),
  }
}

/// Public tables are open to everyone. `orders` and `services` are narrowed
/// to the caller's rows unless the caller is an admin; the remaining tables
/// are admin only.
pub async fn scoped_filter(
  app_state: &AppState,
  table: Table,
  events: EventFilter,
  caller: Option<Uuid>,
) -> Result<ChangeFilter, AppError> {
  let filter = ChangeFilter::table(table).events(events);
  if table.is_public() {
    return Ok(filter);
  }
  let user_id = caller.ok_or(ShopError::Unauthenticated)?;
  let is_admin = app_state
    .backend
    .store
    .get_profile(user_id)
    .await?
    .is_some_and(|p| p.role.is_admin());
  if is_admin {
    Ok(filter)
  } else if table.is_user_scoped() {
    Ok(filter.row(RowFilter::eq("user_id", user_id)))
  } else {
    Err(ShopError::Forbidden(format!("'{}' changes are visible to admins only", table)).into())
  }
}

#[instrument(name = "handler::realtime", skip(app_state, query, user), fields(table = %path.as_ref()))]
pub async fn stream_changes_handler(
  app_state: web::Data<AppState>,
  path: web::Path<String>,
  query: web::Query<StreamQuery>,
  user: MaybeUser,
) -> Result<HttpResponse, AppError> {
  let table: Table = path.into_inner().parse()?;
  let events: EventFilter = match query.event.as_deref() {
    Some(event) => event.parse()?,
    None => EventFilter::All,
  };
  let caller = caller_id(&app_state, user, query.access_token.as_deref()).await?;
  let filter = scoped_filter(&app_state, table, events, caller).await?;

  let subscription: Subscription = app_state.backend.changes.subscribe(filter);
  let body = stream::unfold(subscription, |mut subscription| async move {
    let delivery = subscription.next().await?;
    if let Delivery::Resync { missed } = &delivery {
      warn!(missed, "Event stream subscriber lagged, asking client to resync.");
    }
    Some((Ok::<web::Bytes, actix_web::Error>(delivery_to_bytes(&delivery)), subscription))
  });

  Ok(
    HttpResponse::Ok()
      .insert_header((header::CONTENT_TYPE, "text/event-stream"))
      .insert_header((header::CACHE_CONTROL, "no-cache"))
      .streaming(body),
  )
}
