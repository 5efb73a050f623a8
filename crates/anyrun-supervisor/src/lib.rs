//! # anyrun-supervisor
//!
//! Keeps a registry of named child processes and implements the three
//! lifecycle calls the front ends use: [`Supervisor::start`],
//! [`Supervisor::stop`] and [`Supervisor::status`].
//!
//! ```rust,no_run
//! use anyrun_core::AppDescriptor;
//! use anyrun_supervisor::Supervisor;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sup = Supervisor::new();
//! let app = AppDescriptor {
//!     name: "web".into(),
//!     executable: "python".into(),
//!     path: "server.py".into(),
//!     args: "--port 8000".into(),
//!     ..AppDescriptor::default()
//! };
//!
//! let pid = sup.start(&app).await.unwrap();
//! assert_eq!(sup.status(&app).await.pid, pid);
//! sup.stop(&app).await.unwrap();
//! # }
//! ```

pub mod batch;
pub mod controller;
pub mod error;
pub mod launch;
pub mod registry;
pub mod supervisor;

pub use batch::{BatchFailure, Phase};
pub use controller::{platform_controller, ChildProcess, KillOnly, ProcessController};
#[cfg(unix)]
pub use controller::PosixSignals;
pub use error::SupervisorError;
pub use launch::Invocation;
pub use registry::{ProcessHandle, Registry};
pub use supervisor::{StopOutcome, Supervisor, KILL_REAP_WAIT, STARTUP_GRACE, TERMINATION_TIMEOUT};
