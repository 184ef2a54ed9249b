//! # WavePass Core
//!
//! Domain types and the shared ticket pool for the WavePass marketplace.
//!
//! Vendors release tickets into a single bounded [`TicketPool`]; customers
//! buy them back out. Everything that mutates ticket state goes through the
//! pool's synchronized operations, so the pool is the only place where
//! concurrency correctness has to be argued.
//!
//! ## Core Concepts
//!
//! - **Ticket**: a sellable unit with a fixed identity and producer, and a
//!   status that is either `Available` or `Sold` to exactly one customer
//! - **Pool**: the bounded inventory (`add`, `remove`, `refund` + queries)
//! - **Activity sink**: append-only record of everything that happened
//! - **Clock**: injected time source so activity timestamps are testable
//!
//! ## Example
//!
//! ```
//! use wavepass_core::{CustomerId, Money, TicketPool, VendorId};
//!
//! let pool = TicketPool::new(5, Money::from_cents(1_500))?;
//! let outcome = pool.add(3, VendorId::new(1));
//! assert_eq!(outcome.added(), 3);
//!
//! let ticket = pool.remove(CustomerId::new(7))?;
//! assert_eq!(ticket.owner(), Some(CustomerId::new(7)));
//! assert!(pool.refund(CustomerId::new(7), ticket.id()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod activity;
pub mod pool;
pub mod types;

/// Environment module - Dependency injection traits
///
/// External dependencies of the core are abstracted behind traits so tests
/// can substitute deterministic implementations.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use wavepass_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let earlier = clock.now();
    /// assert!(clock.now() >= earlier);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use activity::{
    ActivityEntry, ActivityEvent, ActivityLog, ActivitySink, FanoutSink, TracingSink,
};
pub use pool::{AddOutcome, PoolError, PoolStats, SaleRejected, TicketPool};
pub use types::{
    ActorId, CustomerId, CustomerOutcome, Money, Role, Ticket, TicketId, TicketStatus,
    VendorId, VendorOutcome,
};
