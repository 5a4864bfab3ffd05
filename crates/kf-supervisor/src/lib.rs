//! kf-supervisor: Supervision engine for k-forward
//!
//! The engine keeps one `kubectl port-forward` child per desired profile,
//! reconnects with exponential backoff when a child exits, and reconciles
//! its records against a changing profile list. All state lives in a
//! [`Supervisor`] driven from a single task by [`service::ForwardService`].

pub mod backoff;
pub mod notify;
pub mod process;
pub mod reconcile;
pub mod record;
pub mod service;
pub mod supervisor;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backoff::ExponentialBackoff;
pub use process::{KubectlLauncher, ProcessLauncher};
pub use reconcile::{Reconciler, RefreshReport};
pub use record::{ForwardRecord, ForwardStatus, LastExit, RecordSnapshot};
pub use service::{Action, ForwardService, ForwardView, ServiceError, ServiceHandle};
pub use supervisor::{Supervisor, SupervisorOptions};
