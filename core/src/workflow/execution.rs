// shopfront/src/workflow/execution.rs

//! `Workflow::run()`: executes steps in order and compensates on failure.

use crate::context::ContextData;
use crate::error::ShopError;
use crate::workflow::control::{StepControl, WorkflowResult};
use crate::workflow::definition::Workflow;
use tracing::{event, instrument, span, Instrument, Level};

impl<TData, Err> Workflow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<ShopError> + Send + Sync + 'static,
{
  /// Runs every step against `ctx_data`.
  ///
  /// On the first handler error, compensations for the steps that already
  /// completed run newest-first, then the original error is returned.
  #[instrument(
    name = "Workflow::run",
    skip_all,
    fields(workflow = %self.name, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<WorkflowResult, Err> {
    let mut completed: Vec<&str> = Vec::with_capacity(self.steps.len());

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = span!(Level::INFO, "workflow_step", step_name, step_index = step_idx);

      if let Some(skip_if) = &step_def.skip_if {
        if skip_if(ctx_data.clone()) {
          event!(Level::DEBUG, step_name, "Step skipped by condition.");
          continue;
        }
      }

      let handlers = match self.on.get(step_name) {
        Some(handlers) if !handlers.is_empty() => handlers,
        _ if step_def.optional => {
          event!(Level::DEBUG, step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        _ => {
          event!(Level::ERROR, step_name, "Non-optional step has no handlers.");
          self.compensate(&completed, ctx_data.clone()).await;
          return Err(Err::from(ShopError::HandlerMissing {
            step_name: step_def.name.clone(),
          }));
        }
      };

      for handler_fn in handlers {
        match handler_fn(ctx_data.clone()).instrument(step_span.clone()).await {
          Ok(StepControl::Continue) => {}
          Ok(StepControl::Stop) => {
            event!(Level::INFO, step_name, "Workflow stopped by handler.");
            return Ok(WorkflowResult::Stopped);
          }
          Err(e) => {
            event!(Level::WARN, step_name, error = %e, "Step failed, compensating completed steps.");
            self.compensate(&completed, ctx_data.clone()).await;
            return Err(e);
          }
        }
      }

      completed.push(step_name);
    }

    event!(Level::DEBUG, "Workflow completed.");
    Ok(WorkflowResult::Completed)
  }

  async fn compensate(&self, completed: &[&str], ctx_data: ContextData<TData>) {
    for step_name in completed.iter().rev() {
      let Some(compensator) = self.compensations.get(*step_name) else {
        continue;
      };
      event!(Level::INFO, step_name, "Running compensation.");
      if let Err(e) = compensator(ctx_data.clone()).await {
        // The original failure is what the caller sees.
        event!(Level::ERROR, step_name, error = %e, "Compensation failed.");
      }
    }
  }
}
