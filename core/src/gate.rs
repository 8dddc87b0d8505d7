// shopfront/src/gate.rs

//! Admin-area access check with a stale-while-revalidate role cache.
//!
//! A cached role answers immediately while the authoritative profile row is
//! fetched in the background; if it differs the cache is replaced and a
//! `RoleUpdate` is broadcast. A session whose role is not `admin` is signed
//! out and sent back to the login view.

use crate::backend::{Backend, Identity, Session, Store};
use crate::error::ShopResult;
use crate::models::Role;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{event, instrument, Level};
use uuid::Uuid;

pub const ADMIN_LOGIN_PATH: &str = "/admin/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
  NoSession,
  NotAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
  Allow { session: Session, role: Role },
  RedirectToLogin { reason: DenyReason },
}

impl GateDecision {
  pub fn is_allowed(&self) -> bool {
    matches!(self, GateDecision::Allow { .. })
  }

  pub fn redirect_path(&self) -> Option<&'static str> {
    match self {
      GateDecision::Allow { .. } => None,
      GateDecision::RedirectToLogin { .. } => Some(ADMIN_LOGIN_PATH),
    }
  }
}

/// Emitted when revalidation finds a role different from the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleUpdate {
  pub user_id: Uuid,
  pub role: Role,
}

pub struct RoleGate {
  identity: Arc<dyn Identity>,
  store: Arc<dyn Store>,
  cache: Mutex<HashMap<Uuid, Role>>,
  updates: broadcast::Sender<RoleUpdate>,
}

impl RoleGate {
  pub fn new(backend: &Backend) -> Arc<Self> {
    let (updates, _) = broadcast::channel(32);
    Arc::new(Self {
      identity: Arc::clone(&backend.identity),
      store: Arc::clone(&backend.store),
      cache: Mutex::new(HashMap::new()),
      updates,
    })
  }

  pub fn cached_role(&self, user_id: Uuid) -> Option<Role> {
    self.cache.lock().get(&user_id).copied()
  }

  pub fn subscribe(&self) -> broadcast::Receiver<RoleUpdate> {
    self.updates.subscribe()
  }

  /// Decides whether `access_token` may enter the admin area.
  #[instrument(name = "RoleGate::authorize", skip_all, err(Display))]
  pub async fn authorize(self: &Arc<Self>, access_token: &str) -> ShopResult<GateDecision> {
    let Some(session) = self.identity.get_session(access_token).await? else {
      return Ok(GateDecision::RedirectToLogin {
        reason: DenyReason::NoSession,
      });
    };
    let user_id = session.user.id;

    let role = match self.cached_role(user_id) {
      Some(role) => {
        let gate = Arc::clone(self);
        let token = access_token.to_string();
        tokio::spawn(async move {
          if let Err(e) = gate.revalidate(user_id, &token).await {
            event!(Level::WARN, %user_id, error = %e, "Role revalidation failed, keeping cached role.");
          }
        });
        role
      }
      None => {
        let role = self.fetch_role(user_id).await?;
        self.cache.lock().insert(user_id, role);
        role
      }
    };

    if role.is_admin() {
      return Ok(GateDecision::Allow { session, role });
    }
    self.evict(user_id, access_token).await;
    Ok(GateDecision::RedirectToLogin {
      reason: DenyReason::NotAdmin,
    })
  }

  /// Decides on the stored profile only, never the cache. Servers use this
  /// before admin writes; the cache is refreshed on the way.
  #[instrument(name = "RoleGate::authorize_fresh", skip_all, err(Display))]
  pub async fn authorize_fresh(&self, access_token: &str) -> ShopResult<GateDecision> {
    let Some(session) = self.identity.get_session(access_token).await? else {
      return Ok(GateDecision::RedirectToLogin {
        reason: DenyReason::NoSession,
      });
    };
    let role = self.revalidate(session.user.id, access_token).await?;
    if role.is_admin() {
      Ok(GateDecision::Allow { session, role })
    } else {
      Ok(GateDecision::RedirectToLogin {
        reason: DenyReason::NotAdmin,
      })
    }
  }

  /// Fetches the authoritative role and replaces the cached one. A session
  /// found to be non-admin is signed out.
  pub async fn revalidate(&self, user_id: Uuid, access_token: &str) -> ShopResult<Role> {
    let role = self.fetch_role(user_id).await?;
    let previous = self.cache.lock().insert(user_id, role);
    if previous != Some(role) {
      event!(Level::INFO, %user_id, ?previous, ?role, "Cached role replaced.");
      let _ = self.updates.send(RoleUpdate { user_id, role });
    }
    if !role.is_admin() {
      self.evict(user_id, access_token).await;
    }
    Ok(role)
  }

  /// Profiles that do not exist yet count as customers.
  async fn fetch_role(&self, user_id: Uuid) -> ShopResult<Role> {
    Ok(self.store.get_profile(user_id).await?.map(|p| p.role).unwrap_or_default())
  }

  async fn evict(&self, user_id: Uuid, access_token: &str) {
    event!(Level::WARN, %user_id, "Non-admin session at the admin gate, signing out.");
    if let Err(e) = self.identity.sign_out(access_token).await {
      event!(Level::ERROR, %user_id, error = %e, "Sign-out of non-admin session failed.");
    }
  }
}
