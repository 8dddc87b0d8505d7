// shopfront_app/src/state.rs

use crate::config::AppConfig;
use crate::errors::AppError;
use shopfront::{AdminConsole, Backend, Catalog, RoleGate, Workflows};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub backend: Backend,
  pub workflows: Arc<Workflows<AppError>>,
  pub catalog: Catalog,
  pub admin: AdminConsole,
  pub gate: Arc<RoleGate>,
  pub config: Arc<AppConfig>,
}

impl AppState {
  /// Wires the services around `backend` and registers the workflows.
  pub fn new(backend: Backend, config: Arc<AppConfig>) -> Self {
    let workflows = Workflows::<AppError>::new();
    shopfront::register_workflows(&workflows);
    Self {
      catalog: Catalog::new(Arc::clone(&backend.store)),
      admin: AdminConsole::new(backend.clone(), config.order_transitions),
      gate: RoleGate::new(&backend),
      workflows: Arc::new(workflows),
      backend,
      config,
    }
  }
}
