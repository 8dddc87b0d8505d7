// shopfront/src/workflow/registry.rs

//! `Workflows<E>`: workflows registered once at startup and dispatched by the
//! type of their context data.

use crate::context::ContextData;
use crate::error::ShopError;
use crate::workflow::control::WorkflowResult;
use crate::workflow::definition::Workflow;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, Level};

#[async_trait]
trait AnyWorkflowRunner<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  /// `ctx_obj` holds a `ContextData<TData>` for the wrapped workflow.
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<WorkflowResult, AppErr>;
}

struct WorkflowWrapper<TData, StepErr, AppErr>
where
  TData: 'static + Send + Sync,
  StepErr: std::error::Error + From<ShopError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<StepErr> + From<ShopError> + Send + Sync + 'static,
{
  workflow: Arc<Workflow<TData, StepErr>>,
  _phantom: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<TData, StepErr, AppErr> AnyWorkflowRunner<AppErr> for WorkflowWrapper<TData, StepErr, AppErr>
where
  TData: 'static + Send + Sync,
  StepErr: std::error::Error + From<ShopError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<StepErr> + From<ShopError> + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<WorkflowResult, AppErr> {
    let ctx_data = match ctx_obj.downcast::<ContextData<TData>>() {
      Ok(boxed) => *boxed,
      Err(_) => {
        return Err(AppErr::from(ShopError::Internal(format!(
          "workflow '{}' received a context that is not {}",
          self.workflow.name(),
          std::any::type_name::<TData>()
        ))));
      }
    };
    self.workflow.run(ctx_data).await.map_err(AppErr::from)
  }
}

pub struct Workflows<AppErr = ShopError>
where
  AppErr: std::error::Error + From<ShopError> + Send + Sync + 'static,
{
  registry: Mutex<HashMap<TypeId, Arc<dyn AnyWorkflowRunner<AppErr>>>>,
}

impl<AppErr> Default for Workflows<AppErr>
where
  AppErr: std::error::Error + From<ShopError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<AppErr> Workflows<AppErr>
where
  AppErr: std::error::Error + From<ShopError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      registry: Mutex::new(HashMap::new()),
    }
  }

  /// Registers `workflow` for its context type, replacing an earlier one.
  pub fn register<TData, StepErr>(&self, workflow: Workflow<TData, StepErr>)
  where
    TData: 'static + Send + Sync,
    StepErr: std::error::Error + From<ShopError> + Send + Sync + 'static,
    AppErr: From<StepErr>,
  {
    event!(Level::DEBUG, workflow = %workflow.name(), tdata_type = %std::any::type_name::<TData>(), "Registering workflow.");
    let wrapper = WorkflowWrapper::<TData, StepErr, AppErr> {
      workflow: Arc::new(workflow),
      _phantom: PhantomData,
    };
    self.registry.lock().insert(TypeId::of::<TData>(), Arc::new(wrapper));
  }

  pub fn is_registered<TData: 'static>(&self) -> bool {
    self.registry.lock().contains_key(&TypeId::of::<TData>())
  }

  pub async fn run<TData>(&self, ctx_data: ContextData<TData>) -> Result<WorkflowResult, AppErr>
  where
    TData: 'static + Send + Sync,
  {
    let runner = self
      .registry
      .lock()
      .get(&TypeId::of::<TData>())
      .cloned()
      .ok_or_else(|| {
        let type_name = std::any::type_name::<TData>();
        event!(Level::ERROR, "No workflow registered for {}.", type_name);
        AppErr::from(ShopError::Internal(format!("no workflow registered for {}", type_name)))
      })?;

    runner.run_erased(Box::new(ctx_data)).await
  }
}
