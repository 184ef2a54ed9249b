//! Activity events and the append-only sinks that record them.
//!
//! Workers and the application report every admission, rejection, sale,
//! refund and stop as an [`ActivityEvent`]. Sinks only ever append; entries
//! are never edited or removed. Ordering across actors is arrival order at
//! the sink and nothing stronger.

use crate::environment::Clock;
use crate::types::{ActorId, CustomerId, CustomerOutcome, TicketId, VendorId, VendorOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Something that happened in the marketplace.
///
/// `Display` renders the human-readable log line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityEvent {
    /// A worker was scheduled
    WorkerStarted {
        /// Actor whose worker started
        actor: ActorId,
    },
    /// An operator stopped a running worker
    WorkerStopped {
        /// Actor whose worker was stopped
        actor: ActorId,
    },
    /// A vendor released one ticket
    TicketReleased {
        /// Releasing vendor
        vendor: VendorId,
        /// Admitted ticket
        ticket: TicketId,
        /// Tickets purchasable right after the batch
        available: u64,
    },
    /// A vendor tried to release one ticket but the pool was at capacity
    ReleaseRejected {
        /// Releasing vendor
        vendor: VendorId,
        /// Tickets purchasable right after the batch
        available: u64,
    },
    /// A vendor worker reached a terminal state
    VendorFinished {
        /// Vendor
        vendor: VendorId,
        /// Why it finished
        outcome: VendorOutcome,
        /// Tickets released during this run
        released: u32,
    },
    /// A customer bought a ticket
    TicketPurchased {
        /// Buyer
        customer: CustomerId,
        /// Ticket bought
        ticket: TicketId,
        /// Tickets bought so far in this run
        purchased: u32,
    },
    /// A customer found nothing to buy
    PurchaseFailed {
        /// Buyer
        customer: CustomerId,
    },
    /// A customer worker reached a terminal state
    CustomerFinished {
        /// Customer
        customer: CustomerId,
        /// Why it finished
        outcome: CustomerOutcome,
        /// Tickets bought during this run
        purchased: u32,
    },
    /// A customer returned a ticket
    TicketRefunded {
        /// Customer returning the ticket
        customer: CustomerId,
        /// Returned ticket
        ticket: TicketId,
    },
}

impl fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkerStarted { actor: ActorId::Vendor(id) } => {
                write!(f, "{id} started releasing tickets.")
            }
            Self::WorkerStarted { actor: ActorId::Customer(id) } => {
                write!(f, "{id} started purchasing tickets.")
            }
            Self::WorkerStopped { actor: ActorId::Vendor(id) } => {
                write!(f, "{id} stopped releasing tickets.")
            }
            Self::WorkerStopped { actor: ActorId::Customer(id) } => {
                write!(f, "{id} stopped purchasing tickets.")
            }
            Self::TicketReleased { vendor, ticket, available } => write!(
                f,
                "{vendor} released Ticket ID {ticket}. Tickets available: {available}"
            ),
            Self::ReleaseRejected { vendor, available } => write!(
                f,
                "{vendor} could not release a ticket. Ticket pool is full. \
                 Tickets available: {available}"
            ),
            Self::VendorFinished { vendor, outcome, released } => match outcome {
                VendorOutcome::Completed => {
                    write!(f, "{vendor} has released all tickets ({released}).")
                }
                VendorOutcome::PoolFull => write!(
                    f,
                    "{vendor}: Ticket pool is full. Stopping ticket releases after {released}."
                ),
                VendorOutcome::Stopped => {
                    write!(f, "{vendor} releasing stopped after {released} tickets.")
                }
            },
            Self::TicketPurchased { customer, ticket, purchased } => write!(
                f,
                "{customer} purchased Ticket ID {ticket}. Total purchased: {purchased}"
            ),
            Self::PurchaseFailed { customer } => write!(
                f,
                "{customer} failed to purchase a ticket: No tickets available."
            ),
            Self::CustomerFinished { customer, outcome, purchased } => match outcome {
                CustomerOutcome::Completed => write!(
                    f,
                    "{customer} successfully purchased all desired tickets ({purchased})."
                ),
                CustomerOutcome::SoldOut => write!(
                    f,
                    "{customer} stopped purchasing: sold out. Tickets purchased: {purchased}."
                ),
                CustomerOutcome::Stopped => write!(
                    f,
                    "{customer} has stopped purchasing. Tickets purchased: {purchased}."
                ),
            },
            Self::TicketRefunded { customer, ticket } => {
                write!(f, "{customer} refunded Ticket ID {ticket}.")
            }
        }
    }
}

/// Append-only destination for activity events.
///
/// Implementations must be safe to call from many workers at once.
pub trait ActivitySink: Send + Sync {
    /// Append one event
    fn record(&self, event: ActivityEvent);
}

impl<S: ActivitySink + ?Sized> ActivitySink for Arc<S> {
    fn record(&self, event: ActivityEvent) {
        (**self).record(event);
    }
}

/// One timestamped line of the in-memory log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// When the sink received the event
    pub at: DateTime<Utc>,
    /// What happened
    pub event: ActivityEvent,
}

impl fmt::Display for ActivityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S%.3f"), self.event)
    }
}

/// In-memory activity log, guarded independently of the pool.
pub struct ActivityLog {
    clock: Arc<dyn Clock>,
    entries: RwLock<Vec<ActivityEntry>>,
}

impl ActivityLog {
    /// Create an empty log stamping entries with `clock`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of every entry so far
    #[must_use]
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries appended at or after `offset`, for tailing the log
    #[must_use]
    pub fn since(&self, offset: usize) -> Vec<ActivityEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(offset..).map(<[_]>::to_vec).unwrap_or_default()
    }

    /// The last `n` entries
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<ActivityEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries[entries.len().saturating_sub(n)..].to_vec()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityLog")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl ActivitySink for ActivityLog {
    fn record(&self, event: ActivityEvent) {
        let entry = ActivityEntry {
            at: self.clock.now(),
            event,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// Mirrors activity into `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ActivitySink for TracingSink {
    fn record(&self, event: ActivityEvent) {
        tracing::info!(target: "wavepass::activity", "{event}");
    }
}

/// Forwards each event to several sinks in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ActivitySink>>,
}

impl FanoutSink {
    /// Create an empty fan-out
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn ActivitySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl ActivitySink for FanoutSink {
    fn record(&self, event: ActivityEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(event.clone());
            }
            last.record(event);
        }
    }
}
