//! # WavePass Runtime
//!
//! Concurrent workers for the WavePass marketplace.
//!
//! Vendors release tickets in batches on a fixed interval; customers buy
//! one ticket per interval. Both run as tokio tasks on bounded executors,
//! managed by a [`Supervisor`] that can start, stop and reconfigure them
//! while they run, and shut everything down within a grace period.
//!
//! ## Core Components
//!
//! - **Control block**: per-actor parameters, progress and run flag,
//!   shared between the worker and the operator
//! - **Workers**: [`VendorWorker`] and [`CustomerWorker`] loops
//! - **Executor**: semaphore-bounded task spawner with graceful shutdown
//! - **Supervisor**: one live task per actor, start/stop/shutdown
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wavepass_core::{Money, TicketPool, TracingSink, VendorId};
//! use wavepass_runtime::{ReleasePlan, Supervisor, SupervisorConfig, Vendor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Arc::new(TicketPool::new(100, Money::from_cents(2_500))?);
//! let supervisor = Supervisor::new(pool, Arc::new(TracingSink), SupervisorConfig::default());
//!
//! let plan = ReleasePlan::new(20, 5, Duration::from_millis(500))?;
//! let vendor = Arc::new(Vendor::new(VendorId::new(1), "Acme Events", plan));
//! supervisor.start_vendor(&vendor)?;
//!
//! supervisor.shutdown().await;
//! # Ok(())
//! # }
//! ```

/// Per-actor control block and lifecycle states
pub mod control;

/// Customer actor and purchase loop
pub mod customer;

/// Bounded executor with graceful shutdown
pub mod executor;

/// Marketplace metrics
pub mod metrics;

/// Worker scheduling and lifecycle
pub mod supervisor;

/// Vendor actor and release loop
pub mod vendor;

/// Error types for workers and the supervisor
pub mod error {
    use thiserror::Error;
    use wavepass_core::ActorId;

    /// Invalid worker parameters
    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum WorkerError {
        /// A run must aim for at least one ticket
        #[error("total tickets must be greater than zero")]
        ZeroTarget,

        /// A release batch must hold at least one ticket
        #[error("tickets per release must be greater than zero")]
        ZeroBatch,
    }

    /// Errors from supervisor operations
    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SupervisorError {
        /// The actor's previous task has not finished
        #[error("{0} is already running")]
        AlreadyRunning(ActorId),

        /// The actor has no live task to stop
        #[error("{0} is not currently running")]
        NotRunning(ActorId),

        /// The supervisor no longer accepts work
        #[error("supervisor is shut down")]
        ShutDown,
    }
}

pub use control::{ControlSnapshot, Plan, WorkerControl, WorkerState};
pub use customer::{Customer, CustomerWorker, PurchasePlan};
pub use error::{SupervisorError, WorkerError};
pub use executor::{Executor, ShutdownReport};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use vendor::{ReleasePlan, Vendor, VendorWorker};
