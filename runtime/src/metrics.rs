//! Marketplace metrics.
//!
//! Recording goes through the `metrics` facade, so every function here is a
//! no-op until a recorder is installed. The application installs a
//! Prometheus recorder at startup; tests usually install nothing.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `wavepass_tickets_released_total{vendor}` - Tickets admitted into the pool
//! - `wavepass_tickets_rejected_total{vendor}` - Tickets refused because the pool was full
//! - `wavepass_tickets_sold_total` - Successful purchases
//! - `wavepass_purchase_failures_total` - Purchase attempts that found nothing available
//! - `wavepass_tickets_refunded_total` - Tickets returned to the pool
//! - `wavepass_workers_finished_total{role,outcome}` - Worker runs by terminal state
//!
//! ## Gauges
//! - `wavepass_tickets_available` - Tickets currently purchasable

use metrics::{describe_counter, describe_gauge};
use wavepass_core::{Role, VendorId};

/// Register every metric description.
///
/// Call once at startup, after the recorder is installed.
pub fn register_marketplace_metrics() {
    describe_counter!(
        "wavepass_tickets_released_total",
        "Tickets admitted into the pool, by vendor"
    );
    describe_counter!(
        "wavepass_tickets_rejected_total",
        "Tickets a vendor tried to release while the pool was at capacity"
    );
    describe_counter!("wavepass_tickets_sold_total", "Tickets sold to customers");
    describe_counter!(
        "wavepass_purchase_failures_total",
        "Purchase attempts that found no available ticket"
    );
    describe_counter!(
        "wavepass_tickets_refunded_total",
        "Tickets returned to the pool by their owner"
    );
    describe_counter!(
        "wavepass_workers_finished_total",
        "Worker runs by role and terminal state (completed, pool_full, sold_out, stopped)"
    );
    describe_gauge!(
        "wavepass_tickets_available",
        "Tickets currently purchasable"
    );

    tracing::info!("Marketplace metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record one release batch.
///
/// # Arguments
///
/// * `vendor` - Releasing vendor
/// * `admitted` - Tickets the pool accepted
/// * `rejected` - Tickets the pool refused
/// * `available` - Purchasable tickets after the batch
pub fn record_release(vendor: VendorId, admitted: u32, rejected: u32, available: u64) {
    let label = vendor.to_string();
    if admitted > 0 {
        metrics::counter!("wavepass_tickets_released_total", "vendor" => label.clone())
            .increment(u64::from(admitted));
    }
    if rejected > 0 {
        metrics::counter!("wavepass_tickets_rejected_total", "vendor" => label)
            .increment(u64::from(rejected));
    }
    record_available(available);
}

/// Record a successful purchase.
pub fn record_sale(available: u64) {
    metrics::counter!("wavepass_tickets_sold_total").increment(1);
    record_available(available);
}

/// Record a purchase attempt that found nothing to buy.
pub fn record_purchase_failure() {
    metrics::counter!("wavepass_purchase_failures_total").increment(1);
}

/// Record a refund.
pub fn record_refund(available: u64) {
    metrics::counter!("wavepass_tickets_refunded_total").increment(1);
    record_available(available);
}

/// Record a worker reaching a terminal state.
pub fn record_worker_finished(role: Role, outcome: &'static str) {
    metrics::counter!(
        "wavepass_workers_finished_total",
        "role" => role.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    tracing::debug!(%role, outcome, "Recorded worker_finished metric");
}

#[allow(clippy::cast_precision_loss)] // Gauge values are f64; pool sizes stay far below 2^52
fn record_available(available: u64) {
    metrics::gauge!("wavepass_tickets_available").set(available as f64);
}
