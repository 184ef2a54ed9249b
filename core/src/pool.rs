//! The shared, bounded ticket pool.
//!
//! One `TicketPool` exists per simulation and is handed to every worker as an
//! `Arc<TicketPool>`. All mutation happens inside a single critical section
//! per call, which gives three guarantees:
//!
//! - a batch `add` is admitted atomically, so two vendors can never race past
//!   the capacity boundary between them
//! - a `remove` claims exactly one ticket, and no two customers can claim the
//!   same one
//! - counters are never observed half-updated by any query
//!
//! ```text
//! capacity check (cumulative, sold tickets still count):
//!
//!   stored = released tickets ever admitted
//!   admit one more  ⇔  stored < max_capacity
//!
//! conservation (holds in every snapshot):
//!
//!   available == stored - sold
//!   sold <= released <= max_capacity
//! ```
//!
//! Tickets are never destroyed during a run. A sale flips a ticket to `Sold`,
//! a refund flips it back, and both keep the ticket in place for the history
//! queries.

use crate::types::{CustomerId, Money, Ticket, TicketId, VendorId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Errors constructing a pool.
///
/// These are programming-contract violations and should abort startup.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// A pool with no capacity can never admit a ticket
    #[error("ticket pool capacity must be greater than zero")]
    ZeroCapacity,
}

/// A `remove` found nothing to sell.
///
/// This is an expected condition, not a failure of the pool. The caller
/// decides whether to try again later.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleRejected {
    /// Every stored ticket is already sold
    #[error("no tickets available")]
    NoTicketsAvailable,
}

/// Result of a batch `add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct AddOutcome {
    admitted: Vec<TicketId>,
    rejected: u32,
    is_full: bool,
}

impl AddOutcome {
    /// Ids of the tickets admitted by this call, in release order
    #[must_use]
    pub fn admitted(&self) -> &[TicketId] {
        &self.admitted
    }

    /// Number of tickets admitted
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // bounded by the requested u32 count
    pub fn added(&self) -> u32 {
        self.admitted.len() as u32
    }

    /// Number of tickets refused because the pool hit capacity
    #[must_use]
    pub const fn rejected(&self) -> u32 {
        self.rejected
    }

    /// Whether the pool refused at least one ticket for lack of capacity
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.is_full
    }
}

/// Consistent snapshot of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Maximum number of tickets the pool will ever store
    pub capacity: usize,
    /// Tickets currently stored (available + sold)
    pub stored: usize,
    /// Tickets ever released into the pool
    pub released: u64,
    /// Tickets currently sold
    pub sold: u64,
    /// Tickets currently purchasable
    pub available: u64,
    /// Revenue of the currently sold tickets
    pub revenue: Money,
}

impl PoolStats {
    /// Whether the pool has reached capacity
    #[must_use]
    pub const fn is_saturated(&self) -> bool {
        self.stored >= self.capacity
    }
}

#[derive(Debug, Default)]
struct PoolInner {
    /// Every ticket ever admitted, in release order. Index `i` holds id `i + 1`.
    tickets: Vec<Ticket>,
    /// Indices of available tickets; the first entry is the oldest.
    available: BTreeSet<usize>,
    released: u64,
    sold: u64,
    revenue: Money,
}

impl PoolInner {
    fn index_of(&self, id: TicketId) -> Option<usize> {
        let index = usize::try_from(id.value().checked_sub(1)?).ok()?;
        (index < self.tickets.len()).then_some(index)
    }
}

/// Thread-safe bounded ticket inventory.
///
/// # Example
///
/// ```
/// use wavepass_core::{Money, TicketPool, VendorId};
///
/// let pool = TicketPool::new(2, Money::from_cents(1_000))?;
/// let outcome = pool.add(3, VendorId::new(1));
/// assert_eq!((outcome.added(), outcome.rejected()), (2, 1));
/// assert!(outcome.is_full());
/// # Ok::<(), wavepass_core::PoolError>(())
/// ```
#[derive(Debug)]
pub struct TicketPool {
    max_capacity: usize,
    price: Money,
    inner: Mutex<PoolInner>,
}

impl TicketPool {
    /// Create a pool that will store at most `max_capacity` tickets, each
    /// sold at `price`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ZeroCapacity`] if `max_capacity` is zero.
    pub fn new(max_capacity: usize, price: Money) -> Result<Self, PoolError> {
        if max_capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }

        Ok(Self {
            max_capacity,
            price,
            inner: Mutex::new(PoolInner {
                tickets: Vec::with_capacity(max_capacity.min(4096)),
                ..PoolInner::default()
            }),
        })
    }

    /// Maximum number of tickets the pool will store
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_capacity
    }

    /// Unit price stamped on every released ticket
    #[must_use]
    pub const fn price(&self) -> Money {
        self.price
    }

    // Every critical section leaves the state consistent before it can
    // panic, so a poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release up to `count` new tickets attributed to `vendor`.
    ///
    /// Tickets are admitted one at a time until `count` are in or the pool
    /// reaches capacity. The whole burst runs under the pool lock.
    pub fn add(&self, count: u32, vendor: VendorId) -> AddOutcome {
        let mut inner = self.lock();

        let room = self.max_capacity.saturating_sub(inner.tickets.len());
        let admit = usize::try_from(count).map_or(room, |count| count.min(room));
        let mut admitted = Vec::with_capacity(admit);

        for _ in 0..admit {
            let index = inner.tickets.len();
            let id = TicketId::new(inner.released + 1);
            inner.tickets.push(Ticket::new(id, vendor, self.price));
            inner.available.insert(index);
            inner.released += 1;
            admitted.push(id);
        }

        #[allow(clippy::cast_possible_truncation)] // admit <= count
        let rejected = count - admit as u32;
        let is_full = rejected > 0;

        debug!(
            %vendor,
            added = admit,
            rejected,
            stored = inner.tickets.len(),
            "Tickets admitted to pool"
        );

        AddOutcome {
            admitted,
            rejected,
            is_full,
        }
    }

    /// Sell the oldest available ticket to `customer`.
    ///
    /// Never blocks waiting for stock.
    ///
    /// # Errors
    ///
    /// Returns [`SaleRejected::NoTicketsAvailable`] if every stored ticket is
    /// sold.
    pub fn remove(&self, customer: CustomerId) -> Result<Ticket, SaleRejected> {
        let mut inner = self.lock();

        let Some(index) = inner.available.pop_first() else {
            debug!(%customer, "No tickets available");
            return Err(SaleRejected::NoTicketsAvailable);
        };

        let ticket = &mut inner.tickets[index];
        ticket.sell_to(customer);
        let sold = ticket.clone();

        inner.sold += 1;
        let revenue = inner.revenue.cents().saturating_add(sold.price().cents());
        inner.revenue = Money::from_cents(revenue);

        debug!(%customer, ticket = %sold.id(), remaining = inner.available.len(), "Ticket sold");
        Ok(sold)
    }

    /// Return a sold ticket to the pool.
    ///
    /// Succeeds only if `ticket` exists, is sold, and is owned by `customer`.
    /// Any mismatch returns `false` and changes nothing.
    #[must_use]
    pub fn refund(&self, customer: CustomerId, ticket: TicketId) -> bool {
        let mut inner = self.lock();

        let Some(index) = inner.index_of(ticket) else {
            return false;
        };
        if inner.tickets[index].owner() != Some(customer) {
            return false;
        }

        let price = inner.tickets[index].price();
        inner.tickets[index].return_to_pool();
        inner.available.insert(index);
        inner.sold -= 1;
        inner.revenue = Money::from_cents(inner.revenue.cents().saturating_sub(price.cents()));

        debug!(%customer, %ticket, "Ticket refunded");
        true
    }

    /// Tickets ever released
    #[must_use]
    pub fn released(&self) -> u64 {
        self.lock().released
    }

    /// Tickets currently sold
    #[must_use]
    pub fn sold(&self) -> u64 {
        self.lock().sold
    }

    /// Tickets currently purchasable
    #[must_use]
    pub fn available(&self) -> u64 {
        self.lock().available.len() as u64
    }

    /// All counters from a single critical section
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let inner = self.lock();
        PoolStats {
            capacity: self.max_capacity,
            stored: inner.tickets.len(),
            released: inner.released,
            sold: inner.sold,
            available: inner.available.len() as u64,
            revenue: inner.revenue,
        }
    }

    /// Snapshot of one ticket
    #[must_use]
    pub fn ticket(&self, id: TicketId) -> Option<Ticket> {
        let inner = self.lock();
        inner.index_of(id).map(|index| inner.tickets[index].clone())
    }

    /// Every ticket released by `vendor`, sold or not, in release order
    #[must_use]
    pub fn tickets_by_vendor(&self, vendor: VendorId) -> Vec<Ticket> {
        self.lock()
            .tickets
            .iter()
            .filter(|ticket| ticket.vendor() == vendor)
            .cloned()
            .collect()
    }

    /// Every ticket currently sold to `customer`, in release order
    #[must_use]
    pub fn tickets_by_customer(&self, customer: CustomerId) -> Vec<Ticket> {
        self.lock()
            .tickets
            .iter()
            .filter(|ticket| ticket.owner() == Some(customer))
            .cloned()
            .collect()
    }
}
