//! Ordered, named-step workflows with compensation.
//!
//! Checkout and service booking are multi-step operations that touch more than
//! one backend (object storage, then the table store). Each is a `Workflow`
//! whose completed steps are undone in reverse order when a later step fails.

pub mod control;
pub mod definition;
pub mod execution;
pub mod registry;
pub mod step;

pub use control::{StepControl, WorkflowResult};
pub use definition::{Compensator, Handler, Workflow};
pub use registry::Workflows;
pub use step::{SkipCondition, StepDef};
