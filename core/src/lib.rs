// shopfront/src/lib.rs

//! Shopfront: order and service-request lifecycles for an electronics store.
//!
//! The crate covers what a storefront client does on top of a hosted
//! backend:
//!  - a persistent cart (`cart`),
//!  - checkout and service booking as compensating workflows (`checkout`,
//!    `booking`, built on `workflow`),
//!  - order and service status machines (`lifecycle`),
//!  - a row-level change feed and the views reconciled from it (`realtime`,
//!    `reconcile`),
//!  - the admin role gate (`gate`) and back-office operations (`admin`).
//!
//! The backend itself is abstracted behind the `backend` traits. An
//! in-process `MemoryBackend` ships with the crate.

pub mod admin;
pub mod backend;
pub mod booking;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod context;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod models;
pub mod realtime;
pub mod reconcile;
pub mod storefront;
pub mod workflow;

pub use crate::admin::AdminConsole;
pub use crate::backend::{AuthEvent, AuthUser, Backend, Identity, MemoryBackend, ObjectStore, Session, Store, Upload};
pub use crate::cart::{Cart, CartLine, CartStorage, FileCartStorage, MemoryCartStorage, PersistentCart};
pub use crate::catalog::Catalog;
pub use crate::checkout::{CheckoutLine, CheckoutReceipt, CheckoutRequest};
pub use crate::context::ContextData;
pub use crate::error::{ShopError, ShopResult};
pub use crate::gate::{GateDecision, RoleGate};
pub use crate::lifecycle::{OrderAction, OrderLifecycle, OrderStatus, ServiceLifecycle, ServiceStatus, TransitionPolicy};
pub use crate::realtime::{ChangeEvent, ChangeFilter, ChangeHub, Delivery, Subscription, Table};
pub use crate::storefront::Storefront;
pub use crate::workflow::{StepControl, Workflow, WorkflowResult, Workflows};

/// Registers the checkout and service-booking workflows.
pub fn register_workflows<E>(workflows: &Workflows<E>)
where
  E: std::error::Error + From<ShopError> + Send + Sync + 'static,
{
  workflows.register(checkout::checkout_workflow());
  workflows.register(booking::booking_workflow());
}
