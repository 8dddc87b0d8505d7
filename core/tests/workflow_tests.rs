// tests/workflow_tests.rs
mod common;
use common::*;
use serial_test::serial;
use shopfront::workflow::SkipCondition;
use shopfront::{ContextData, ShopError, StepControl, Workflow, WorkflowResult, Workflows};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

type StepFuture = Pin<Box<dyn Future<Output = Result<StepControl, ShopError>> + Send>>;
type UndoFuture = Pin<Box<dyn Future<Output = Result<(), ShopError>> + Send>>;

#[derive(Clone, Debug, Default)]
struct Trace {
  steps: Vec<String>,
  undone: Vec<String>,
  skip_second: bool,
}

fn record(step: &'static str) -> impl Fn(ContextData<Trace>) -> StepFuture + Send + Sync + 'static {
  move |ctx: ContextData<Trace>| -> StepFuture {
    Box::pin(async move {
      ctx.write().steps.push(step.to_string());
      Ok(StepControl::Continue)
    })
  }
}

fn undo(step: &'static str) -> impl Fn(ContextData<Trace>) -> UndoFuture + Send + Sync + 'static {
  move |ctx: ContextData<Trace>| -> UndoFuture {
    Box::pin(async move {
      ctx.write().undone.push(step.to_string());
      Ok(())
    })
  }
}

fn three_steps() -> Workflow<Trace, ShopError> {
  let mut w = Workflow::<Trace, ShopError>::new("trace", &[("one", false, None), ("two", false, None), ("three", false, None)]);
  w.on_step("one", record("one"));
  w.on_step("two", record("two"));
  w.compensate_step("one", undo("one"));
  w.compensate_step("two", undo("two"));
  w
}

#[tokio::test]
#[serial]
async fn steps_run_in_declared_order() {
  setup_tracing();
  let mut w = three_steps();
  w.on_step("three", record("three"));

  let ctx = ContextData::new(Trace::default());
  let result = w.run(ctx.clone()).await.unwrap();

  assert_eq!(result, WorkflowResult::Completed);
  assert_eq!(ctx.read().steps, vec!["one", "two", "three"]);
  assert!(ctx.read().undone.is_empty());
}

#[tokio::test]
#[serial]
async fn failure_compensates_completed_steps_newest_first() {
  setup_tracing();
  let mut w = three_steps();
  w.on_step("three", |_ctx: ContextData<Trace>| async move {
    Err::<StepControl, _>(ShopError::Validation("boom".to_string()))
  });

  let ctx = ContextData::new(Trace::default());
  let err = w.run(ctx.clone()).await.unwrap_err();

  assert!(matches!(err, ShopError::Validation(ref m) if m == "boom"));
  assert_eq!(ctx.read().undone, vec!["two", "one"]);
}

#[tokio::test]
#[serial]
async fn failing_compensation_does_not_mask_the_original_error() {
  setup_tracing();
  let mut w = three_steps();
  w.compensate_step("two", |_ctx: ContextData<Trace>| async move {
    Err::<(), _>(ShopError::Internal("cleanup failed".to_string()))
  });
  w.on_step("three", |_ctx: ContextData<Trace>| async move {
    Err::<StepControl, _>(ShopError::Conflict("original".to_string()))
  });

  let ctx = ContextData::new(Trace::default());
  let err = w.run(ctx.clone()).await.unwrap_err();

  assert!(matches!(err, ShopError::Conflict(_)));
  assert_eq!(ctx.read().undone, vec!["one"]);
}

#[tokio::test]
#[serial]
async fn stop_halts_without_compensation() {
  setup_tracing();
  let mut w = three_steps();
  w.on_step("two", |_ctx: ContextData<Trace>| async move { Ok::<_, ShopError>(StepControl::Stop) });
  w.on_step("three", record("three"));

  let ctx = ContextData::new(Trace::default());
  let result = w.run(ctx.clone()).await.unwrap();

  assert_eq!(result, WorkflowResult::Stopped);
  assert!(!ctx.read().steps.contains(&"three".to_string()));
  assert!(ctx.read().undone.is_empty());
}

#[tokio::test]
#[serial]
async fn missing_handler_on_required_step_fails_and_compensates() {
  setup_tracing();
  let w = three_steps();

  let ctx = ContextData::new(Trace::default());
  let err = w.run(ctx.clone()).await.unwrap_err();

  match err {
    ShopError::HandlerMissing { step_name } => assert_eq!(step_name, "three"),
    other => panic!("expected HandlerMissing, got {:?}", other),
  }
  assert_eq!(ctx.read().undone, vec!["two", "one"]);
}

#[tokio::test]
#[serial]
async fn optional_step_without_handler_and_skip_condition_are_skipped() {
  setup_tracing();
  let skip_second: SkipCondition<Trace> = Arc::new(|ctx: ContextData<Trace>| ctx.read().skip_second);
  let mut w = Workflow::<Trace, ShopError>::new(
    "skips",
    &[("first", false, None), ("second", false, Some(skip_second)), ("third", true, None)],
  );
  w.on_step("first", record("first"));
  w.on_step("second", record("second"));

  let ctx = ContextData::new(Trace {
    skip_second: true,
    ..Trace::default()
  });
  let result = w.run(ctx.clone()).await.unwrap();

  assert_eq!(result, WorkflowResult::Completed);
  assert_eq!(ctx.read().steps, vec!["first"]);
}

#[test]
#[should_panic(expected = "step 'nope' is not defined")]
fn registering_an_unknown_step_panics() {
  let mut w = Workflow::<Trace, ShopError>::new("trace", &[("one", false, None)]);
  w.on_step("nope", record("nope"));
}

#[tokio::test]
#[serial]
async fn registry_dispatches_by_context_type() {
  setup_tracing();
  let workflows: Workflows = Workflows::new();
  let mut w = three_steps();
  w.on_step("three", record("three"));
  workflows.register(w);

  assert!(workflows.is_registered::<Trace>());
  assert!(!workflows.is_registered::<String>());

  let ctx = ContextData::new(Trace::default());
  let result = workflows.run(ctx.clone()).await.unwrap();
  assert_eq!(result, WorkflowResult::Completed);
  assert_eq!(ctx.read().steps.len(), 3);

  let unregistered = workflows.run(ContextData::new(String::new())).await;
  assert!(matches!(unregistered, Err(ShopError::Internal(_))));
}

#[tokio::test]
#[serial]
async fn context_data_clones_share_state() {
  setup_tracing();
  let ctx = ContextData::new(Trace::default());
  let other = ctx.clone();
  other.update(|t| t.steps.push("shared".to_string()));
  assert_eq!(ctx.with(|t| t.steps.clone()), vec!["shared"]);
  assert_eq!(ctx.snapshot().steps.len(), 1);
}
