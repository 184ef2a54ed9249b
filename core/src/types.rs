//! Domain types for the WavePass marketplace.
//!
//! Identifiers, money, tickets and the terminal outcomes of the two worker
//! kinds. Identifiers are small sequential integers: tickets are numbered by
//! the pool in release order and actors are numbered by registration.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a ticket, assigned by the pool in release order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId(u64);

impl TicketId {
    /// Create a `TicketId` from its numeric value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a vendor
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VendorId(u32);

impl VendorId {
    /// Create a `VendorId` from its numeric value
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the numeric value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vendor-{}", self.0)
    }
}

/// Unique identifier for a customer
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomerId(u32);

impl CustomerId {
    /// Create a `CustomerId` from its numeric value
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the numeric value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Customer-{}", self.0)
    }
}

/// Which side of the marketplace an actor is on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Releases tickets into the pool
    Vendor,
    /// Buys tickets out of the pool
    Customer,
}

impl Role {
    /// Lowercase label, used for metric labels
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vendor => "vendor",
            Self::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of any actor, vendor or customer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorId {
    /// A vendor
    Vendor(VendorId),
    /// A customer
    Customer(CustomerId),
}

impl ActorId {
    /// The actor's role
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Vendor(_) => Role::Vendor,
            Self::Customer(_) => Role::Customer,
        }
    }
}

impl From<VendorId> for ActorId {
    fn from(id: VendorId) -> Self {
        Self::Vendor(id)
    }
}

impl From<CustomerId> for ActorId {
    fn from(id: CustomerId) -> Self {
        Self::Customer(id)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vendor(id) => id.fmt(f),
            Self::Customer(id) => id.fmt(f),
        }
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole currency units with overflow checking
    #[must_use]
    pub const fn checked_from_units(units: u64) -> Option<Self> {
        match units.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the whole-unit part of the amount
    #[must_use]
    pub const fn units(&self) -> u64 {
        self.0 / 100
    }

    /// Multiplies by a ticket count, saturating at `u64::MAX` cents
    #[must_use]
    pub const fn times(self, count: u64) -> Self {
        Self(self.0.saturating_mul(count))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LKR {}.{:02}", self.units(), self.0 % 100)
    }
}

// ============================================================================
// Tickets
// ============================================================================

/// Ticket status.
///
/// The owner lives inside the `Sold` variant, so a ticket can never be sold
/// without an owner or carry an owner while available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// In the pool and purchasable
    Available,
    /// Purchased by a customer
    Sold {
        /// Customer holding the ticket
        owner: CustomerId,
    },
}

impl TicketStatus {
    /// Lowercase label (`available` / `sold`)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Sold { .. } => "sold",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single sellable ticket.
///
/// Identity, producer and price are fixed at release. Status changes only
/// through [`TicketPool`](crate::TicketPool); callers receive snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    id: TicketId,
    vendor: VendorId,
    price: Money,
    status: TicketStatus,
}

impl Ticket {
    /// Creates a new available ticket
    #[must_use]
    pub(crate) const fn new(id: TicketId, vendor: VendorId, price: Money) -> Self {
        Self {
            id,
            vendor,
            price,
            status: TicketStatus::Available,
        }
    }

    /// Ticket identifier
    #[must_use]
    pub const fn id(&self) -> TicketId {
        self.id
    }

    /// Vendor that released this ticket
    #[must_use]
    pub const fn vendor(&self) -> VendorId {
        self.vendor
    }

    /// Unit price fixed at release
    #[must_use]
    pub const fn price(&self) -> Money {
        self.price
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> TicketStatus {
        self.status
    }

    /// Owning customer, present exactly when sold
    #[must_use]
    pub const fn owner(&self) -> Option<CustomerId> {
        match self.status {
            TicketStatus::Available => None,
            TicketStatus::Sold { owner } => Some(owner),
        }
    }

    /// Whether the ticket can be bought
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self.status, TicketStatus::Available)
    }

    pub(crate) fn sell_to(&mut self, owner: CustomerId) {
        self.status = TicketStatus::Sold { owner };
    }

    pub(crate) fn return_to_pool(&mut self) {
        self.status = TicketStatus::Available;
    }
}

// ============================================================================
// Worker outcomes
// ============================================================================

/// Why a vendor worker stopped releasing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorOutcome {
    /// Released its full target
    Completed,
    /// The pool refused tickets because it reached capacity
    PoolFull,
    /// Stopped by an operator before finishing
    Stopped,
}

impl VendorOutcome {
    /// Lowercase label, used for metric labels
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::PoolFull => "pool_full",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for VendorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a customer worker stopped buying.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CustomerOutcome {
    /// Bought its full target
    Completed,
    /// Found no available ticket on an attempt
    SoldOut,
    /// Stopped by an operator before finishing
    Stopped,
}

impl CustomerOutcome {
    /// Lowercase label, used for metric labels
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::SoldOut => "sold_out",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for CustomerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_tracks_status() {
        let mut ticket = Ticket::new(TicketId::new(1), VendorId::new(2), Money::from_cents(500));
        assert!(ticket.is_available());
        assert_eq!(ticket.owner(), None);

        ticket.sell_to(CustomerId::new(9));
        assert_eq!(ticket.owner(), Some(CustomerId::new(9)));
        assert_eq!(ticket.status().as_str(), "sold");

        ticket.return_to_pool();
        assert_eq!(ticket.owner(), None);
        assert_eq!(ticket.status(), TicketStatus::Available);
    }

    #[test]
    fn money_display_and_arithmetic() {
        assert_eq!(Money::from_cents(1_205).to_string(), "LKR 12.05");
        assert_eq!(Money::checked_from_units(3), Some(Money::from_cents(300)));
        assert_eq!(Money::checked_from_units(u64::MAX), None);
        assert_eq!(Money::from_cents(250).times(4), Money::from_cents(1_000));
        assert_eq!(Money::from_cents(u64::MAX).times(2).cents(), u64::MAX);
    }

    #[test]
    fn actor_display_names() {
        assert_eq!(VendorId::new(3).to_string(), "Vendor-3");
        assert_eq!(ActorId::from(CustomerId::new(4)).to_string(), "Customer-4");
        assert_eq!(ActorId::from(VendorId::new(1)).role(), Role::Vendor);
    }
}
