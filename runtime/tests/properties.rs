#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Property tests for single-worker runs against pools of varying size.

use proptest::prelude::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wavepass_core::{CustomerId, CustomerOutcome, VendorId, VendorOutcome};
use wavepass_runtime::{Customer, CustomerWorker, Vendor, VendorWorker};
use wavepass_testing::RecordingSink;
use wavepass_testing::helpers::{pool, stocked_pool};
use wavepass_testing::properties::{purchase_plan, release_plan};

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn vendor_fills_up_to_capacity(plan in release_plan(), capacity in 1usize..60) {
        let pool = pool(capacity);
        let vendor = Arc::new(Vendor::new(VendorId::new(1), "Prop", plan));
        let sink = Arc::new(RecordingSink::new());
        let worker = VendorWorker::new(Arc::clone(&vendor), Arc::clone(&pool), sink);

        let outcome = paused_runtime().block_on(worker.run(CancellationToken::new()));

        let total = u64::from(plan.total_tickets());
        let room = u64::try_from(capacity).unwrap();
        prop_assert_eq!(pool.released(), total.min(room));
        prop_assert_eq!(u64::from(vendor.released()), total.min(room));
        let expected = if total <= room {
            VendorOutcome::Completed
        } else {
            VendorOutcome::PoolFull
        };
        prop_assert_eq!(outcome, expected);
    }

    #[test]
    fn customer_buys_until_target_or_empty(plan in purchase_plan(), stock in 0u32..50) {
        let pool = stocked_pool(64, stock);
        let customer = Arc::new(Customer::new(CustomerId::new(1), "Prop", plan));
        let sink = Arc::new(RecordingSink::new());
        let worker = CustomerWorker::new(Arc::clone(&customer), Arc::clone(&pool), sink);

        let outcome = paused_runtime().block_on(worker.run(CancellationToken::new()));

        let wanted = plan.total_tickets();
        prop_assert_eq!(customer.purchased(), wanted.min(stock));
        prop_assert_eq!(pool.available(), u64::from(stock - wanted.min(stock)));
        let expected = if wanted <= stock {
            CustomerOutcome::Completed
        } else {
            CustomerOutcome::SoldOut
        };
        prop_assert_eq!(outcome, expected);
    }
}
