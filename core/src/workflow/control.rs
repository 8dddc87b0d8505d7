// shopfront/src/workflow/control.rs

//! Signals for controlling workflow flow and the outcome of a run.

/// Returned by a step handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  Continue,
  /// Halt the workflow without error. Completed steps are kept as they are.
  Stop,
}

/// Outcome of a workflow run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowResult {
  Completed,
  Stopped,
}
