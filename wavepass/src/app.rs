//! Application composition.
//!
//! [`WavePassApp`] owns the single pool, the activity sinks, the account
//! registry and the supervisor, and exposes the operations an operator
//! performs on them.

use crate::activity_file::FileActivitySink;
use crate::config::{Config, ConfigError};
use crate::registry::{Principal, Registry, RegistryError, SignUp};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use wavepass_core::environment::{Clock, SystemClock};
use wavepass_core::{
    ActivityEvent, ActivityLog, ActivitySink, ActorId, CustomerId, FanoutSink, PoolError,
    PoolStats, Ticket, TicketId, TicketPool, TracingSink, VendorId,
};
use wavepass_runtime::{
    Customer, PurchasePlan, ReleasePlan, ShutdownReport, Supervisor, SupervisorError, Vendor,
    WorkerError, metrics,
};

/// Errors from application operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The pool could not be created
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Registration failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Worker parameters are invalid
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Start or stop was refused
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// The activity file could not be opened
    #[error("activity log {path}: {source}")]
    ActivityFile {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configured capacity does not fit this platform's address space
    #[error("max capacity {0} is too large")]
    CapacityTooLarge(u64),
}

/// System-wide counters for the status screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStatus {
    /// Pool counters from one critical section
    pub pool: PoolStats,
    /// Tickets the system-wide ceiling still allows vendors to release
    pub remaining_allowance: u64,
    /// Registered vendors
    pub vendors: usize,
    /// Registered customers
    pub customers: usize,
    /// Actors with a live worker
    pub running: Vec<ActorId>,
}

/// The assembled marketplace.
pub struct WavePassApp {
    config: Config,
    pool: Arc<TicketPool>,
    log: Arc<ActivityLog>,
    sink: Arc<dyn ActivitySink>,
    registry: Registry,
    supervisor: Supervisor,
}

impl WavePassApp {
    /// Build the application from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if the configuration is invalid or the activity
    /// file cannot be opened.
    pub fn new(config: Config) -> Result<Self, AppError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new), stamping activity with `clock`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        config.validate()?;

        let capacity = usize::try_from(config.tickets.max_capacity)
            .map_err(|_| AppError::CapacityTooLarge(config.tickets.max_capacity))?;
        let pool = Arc::new(TicketPool::new(capacity, config.tickets.ticket_price)?);

        let log = Arc::new(ActivityLog::new(Arc::clone(&clock)));
        let mut fanout = FanoutSink::new()
            .with(log.clone())
            .with(Arc::new(TracingSink));
        if let Some(path) = &config.logging.activity_log_path {
            let file = FileActivitySink::open(path, clock).map_err(|source| {
                AppError::ActivityFile {
                    path: path.clone(),
                    source,
                }
            })?;
            fanout = fanout.with(Arc::new(file));
        }
        let sink: Arc<dyn ActivitySink> = Arc::new(fanout);

        let supervisor = Supervisor::new(Arc::clone(&pool), Arc::clone(&sink), config.supervisor());

        info!(
            capacity,
            total_tickets = config.tickets.total_tickets,
            price = %config.tickets.ticket_price,
            "WavePass initialized"
        );

        Ok(Self {
            config,
            pool,
            log,
            sink,
            registry: Registry::new(),
            supervisor,
        })
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The shared pool
    #[must_use]
    pub const fn pool(&self) -> &Arc<TicketPool> {
        &self.pool
    }

    /// The in-memory activity log
    #[must_use]
    pub const fn activity(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    /// The account registry
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Tickets vendors may still release under the system-wide ceiling
    #[must_use]
    pub fn remaining_allowance(&self) -> u64 {
        self.config
            .tickets
            .total_tickets
            .saturating_sub(self.pool.released())
    }

    /// Register a vendor who will release `total` tickets, `per_release` at
    /// a time, on the configured release interval.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Worker`] for zero counts and
    /// [`AppError::Registry`] for validation or ceiling failures.
    pub fn register_vendor(
        &self,
        sign_up: &SignUp,
        total: u32,
        per_release: u32,
    ) -> Result<Arc<Vendor>, AppError> {
        let plan = ReleasePlan::new(total, per_release, self.config.release_interval())?;
        Ok(self
            .registry
            .register_vendor(sign_up, plan, self.remaining_allowance())?)
    }

    /// Register a customer who will buy `total` tickets on the configured
    /// retrieval interval.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Worker`] for a zero total and
    /// [`AppError::Registry`] for validation failures.
    pub fn register_customer(
        &self,
        sign_up: &SignUp,
        total: u32,
    ) -> Result<Arc<Customer>, AppError> {
        let plan = PurchasePlan::new(total, self.config.retrieval_interval())?;
        Ok(self.registry.register_customer(sign_up, plan)?)
    }

    /// Look up an account by email and password
    #[must_use]
    pub fn login(&self, email: &str, password: &str) -> Option<Principal> {
        self.registry.authenticate(email, password)
    }

    /// Schedule the principal's worker.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] if it is already running or the app is
    /// shutting down.
    pub fn start(&self, principal: &Principal) -> Result<(), SupervisorError> {
        match principal {
            Principal::Vendor(vendor) => self.supervisor.start_vendor(vendor),
            Principal::Customer(customer) => self.supervisor.start_customer(customer),
        }
    }

    /// Stop the principal's worker.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotRunning`] if it has no live worker.
    pub fn stop(&self, principal: &Principal) -> Result<(), SupervisorError> {
        self.supervisor.stop(principal.actor())
    }

    /// Whether the principal has a live worker
    #[must_use]
    pub fn is_running(&self, principal: &Principal) -> bool {
        self.supervisor.is_running(principal.actor())
    }

    /// Replace a vendor's plan; the configured release interval is kept.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] for zero counts.
    pub fn update_vendor(
        &self,
        vendor: &Vendor,
        total: u32,
        per_release: u32,
    ) -> Result<(), WorkerError> {
        let interval = self.config.release_interval();
        vendor.update_plan(ReleasePlan::new(total, per_release, interval)?);
        Ok(())
    }

    /// Replace a customer's plan; the configured retrieval interval is kept.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] for a zero total.
    pub fn update_customer(&self, customer: &Customer, total: u32) -> Result<(), WorkerError> {
        customer.update_plan(PurchasePlan::new(total, self.config.retrieval_interval())?);
        Ok(())
    }

    /// Return a ticket the customer owns to the pool.
    ///
    /// Returns `false`, changing nothing, if the ticket does not exist, is
    /// not sold, or belongs to someone else.
    #[must_use]
    pub fn refund(&self, customer: CustomerId, ticket: TicketId) -> bool {
        if !self.pool.refund(customer, ticket) {
            return false;
        }
        self.sink.record(ActivityEvent::TicketRefunded { customer, ticket });
        metrics::record_refund(self.pool.available());
        true
    }

    /// Every ticket a vendor released, in release order
    #[must_use]
    pub fn vendor_tickets(&self, vendor: VendorId) -> Vec<Ticket> {
        self.pool.tickets_by_vendor(vendor)
    }

    /// Every ticket a customer currently holds, in release order
    #[must_use]
    pub fn customer_tickets(&self, customer: CustomerId) -> Vec<Ticket> {
        self.pool.tickets_by_customer(customer)
    }

    /// Current system counters
    #[must_use]
    pub fn status(&self) -> SystemStatus {
        let pool = self.pool.stats();
        SystemStatus {
            remaining_allowance: self
                .config
                .tickets
                .total_tickets
                .saturating_sub(pool.released),
            pool,
            vendors: self.registry.vendor_count(),
            customers: self.registry.customer_count(),
            running: self.supervisor.running(),
        }
    }

    /// Stop every worker, wait out the grace period, and report the final
    /// counters.
    pub async fn shutdown(&self) -> (ShutdownReport, SystemStatus) {
        let report = self.supervisor.shutdown().await;
        let status = self.status();
        info!(
            released = status.pool.released,
            sold = status.pool.sold,
            available = status.pool.available,
            "WavePass stopped"
        );
        (report, status)
    }
}

impl std::fmt::Debug for WavePassApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavePassApp")
            .field("pool", &self.pool)
            .field("registry", &self.registry)
            .field("supervisor", &self.supervisor)
            .finish_non_exhaustive()
    }
}
