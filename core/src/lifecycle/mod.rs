//! Status state machines for orders and service requests.

pub mod order;
pub mod service;

pub use order::{OrderAction, OrderLifecycle, OrderStatus, TransitionPolicy};
pub use service::{ServiceLifecycle, ServiceStatus};
