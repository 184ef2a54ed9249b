//! # WavePass Testing
//!
//! Testing utilities and helpers for WavePass.
//!
//! This crate provides:
//! - Deterministic stand-ins for environment traits (`FixedClock`)
//! - A recording activity sink for asserting on worker behavior
//! - Builders for pools, vendors and customers
//! - proptest strategies for worker plans
//!
//! ## Example
//!
//! ```ignore
//! use wavepass_testing::{RecordingSink, helpers};
//!
//! #[tokio::test(start_paused = true)]
//! async fn customer_buys_everything() {
//!     let pool = helpers::stocked_pool(10, 3);
//!     let sink = Arc::new(RecordingSink::new());
//!     let customer = helpers::customer(1, 3);
//!     CustomerWorker::new(customer, pool, sink.clone()).run(CancellationToken::new()).await;
//!     assert_eq!(sink.len(), 4);
//! }
//! ```

use chrono::{DateTime, Utc};
use wavepass_core::environment::Clock;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};
    use wavepass_core::{ActivityEvent, ActivitySink};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use wavepass_testing::mocks::FixedClock;
    /// use wavepass_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which it doesn't.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Activity sink that keeps every event for later assertions.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<ActivityEvent>>,
    }

    impl RecordingSink {
        /// Create an empty sink
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Every event recorded so far, in arrival order
        #[must_use]
        pub fn events(&self) -> Vec<ActivityEvent> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Rendered log lines
        #[must_use]
        pub fn lines(&self) -> Vec<String> {
            self.events().iter().map(ToString::to_string).collect()
        }

        /// Number of events matching `predicate`
        pub fn count(&self, predicate: impl Fn(&ActivityEvent) -> bool) -> usize {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|event| predicate(event))
                .count()
        }

        /// Total events recorded
        #[must_use]
        pub fn len(&self) -> usize {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// Whether nothing has been recorded
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    impl ActivitySink for RecordingSink {
        fn record(&self, event: ActivityEvent) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event);
        }
    }
}

/// Builders for common test scenarios.
///
/// These panic on invalid arguments; they are for tests only.
#[allow(clippy::expect_used)]
pub mod helpers {
    use std::sync::Arc;
    use std::time::Duration;
    use wavepass_core::{CustomerId, Money, TicketPool, VendorId};
    use wavepass_runtime::{Customer, PurchasePlan, ReleasePlan, Vendor};

    /// Interval used by the builders
    pub const TEST_INTERVAL: Duration = Duration::from_millis(100);

    /// Price used by the builders
    pub const TEST_PRICE: Money = Money::from_cents(1_000);

    /// Empty pool with the given capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn pool(capacity: usize) -> Arc<TicketPool> {
        Arc::new(TicketPool::new(capacity, TEST_PRICE).expect("capacity must be positive"))
    }

    /// Pool holding `available` tickets released by `Vendor-1`
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or smaller than `available`.
    #[must_use]
    pub fn stocked_pool(capacity: usize, available: u32) -> Arc<TicketPool> {
        let pool = pool(capacity);
        let outcome = pool.add(available, VendorId::new(1));
        assert_eq!(outcome.added(), available, "pool too small for requested stock");
        pool
    }

    /// Vendor releasing `total` tickets in batches of `per_release`
    ///
    /// # Panics
    ///
    /// Panics if either count is zero.
    #[must_use]
    pub fn vendor(id: u32, total: u32, per_release: u32) -> Arc<Vendor> {
        let plan = ReleasePlan::new(total, per_release, TEST_INTERVAL).expect("valid release plan");
        Arc::new(Vendor::new(VendorId::new(id), format!("Vendor {id}"), plan))
    }

    /// Customer buying `total` tickets
    ///
    /// # Panics
    ///
    /// Panics if `total` is zero.
    #[must_use]
    pub fn customer(id: u32, total: u32) -> Arc<Customer> {
        let plan = PurchasePlan::new(total, TEST_INTERVAL).expect("valid purchase plan");
        Arc::new(Customer::new(CustomerId::new(id), format!("Customer {id}"), plan))
    }

    /// Poll `condition` every millisecond until it holds or `limit` passes.
    ///
    /// Returns whether the condition was met.
    pub async fn eventually(limit: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        condition()
    }

    /// Install a test-friendly tracing subscriber; later calls are no-ops
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("debug")
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use std::time::Duration;
    use wavepass_runtime::{PurchasePlan, ReleasePlan};

    /// Release plans with small counts and a fixed interval
    pub fn release_plan() -> impl Strategy<Value = ReleasePlan> {
        (1u32..=40, 1u32..=10).prop_filter_map("valid plan", |(total, per_release)| {
            ReleasePlan::new(total, per_release, Duration::from_millis(10)).ok()
        })
    }

    /// Purchase plans with small counts and a fixed interval
    pub fn purchase_plan() -> impl Strategy<Value = PurchasePlan> {
        (1u32..=40).prop_filter_map("valid plan", |total| {
            PurchasePlan::new(total, Duration::from_millis(10)).ok()
        })
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, RecordingSink, test_clock};
