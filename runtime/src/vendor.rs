//! Vendor actor and its release loop.

use crate::control::{Plan, WorkerControl, WorkerState};
use crate::error::WorkerError;
use crate::metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wavepass_core::{ActivityEvent, ActivitySink, Role, TicketPool, VendorId, VendorOutcome};

/// How a vendor releases tickets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReleasePlan {
    total_tickets: u32,
    tickets_per_release: u32,
    release_interval: Duration,
}

impl ReleasePlan {
    /// Build a plan.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::ZeroTarget`] if `total_tickets` is zero and
    /// [`WorkerError::ZeroBatch`] if `tickets_per_release` is zero.
    pub const fn new(
        total_tickets: u32,
        tickets_per_release: u32,
        release_interval: Duration,
    ) -> Result<Self, WorkerError> {
        if total_tickets == 0 {
            return Err(WorkerError::ZeroTarget);
        }
        if tickets_per_release == 0 {
            return Err(WorkerError::ZeroBatch);
        }
        Ok(Self {
            total_tickets,
            tickets_per_release,
            release_interval,
        })
    }

    /// Tickets to release in one run
    #[must_use]
    pub const fn total_tickets(&self) -> u32 {
        self.total_tickets
    }

    /// Upper bound on one batch
    #[must_use]
    pub const fn tickets_per_release(&self) -> u32 {
        self.tickets_per_release
    }

    /// Pause between batches
    #[must_use]
    pub const fn release_interval(&self) -> Duration {
        self.release_interval
    }
}

impl Plan for ReleasePlan {
    fn target(&self) -> u32 {
        self.total_tickets
    }
}

/// A registered vendor and its control block.
#[derive(Debug)]
pub struct Vendor {
    id: VendorId,
    name: String,
    control: WorkerControl<ReleasePlan>,
}

impl Vendor {
    /// Create an idle vendor
    #[must_use]
    pub fn new(id: VendorId, name: impl Into<String>, plan: ReleasePlan) -> Self {
        Self {
            id,
            name: name.into(),
            control: WorkerControl::new(plan),
        }
    }

    /// Vendor id
    #[must_use]
    pub const fn id(&self) -> VendorId {
        self.id
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current plan
    #[must_use]
    pub fn plan(&self) -> ReleasePlan {
        self.control.params()
    }

    /// Tickets released in the current run
    #[must_use]
    pub fn released(&self) -> u32 {
        self.control.progress()
    }

    /// Lifecycle state
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.control.state()
    }

    /// Replace the plan, reset progress and re-arm a stopped vendor
    pub fn update_plan(&self, plan: ReleasePlan) {
        self.control.update_parameters(plan);
        info!(
            vendor = %self.id,
            total = plan.total_tickets,
            per_release = plan.tickets_per_release,
            "Vendor plan updated"
        );
    }

    /// Shared control block
    #[must_use]
    pub const fn control(&self) -> &WorkerControl<ReleasePlan> {
        &self.control
    }
}

/// One run of a vendor's release loop.
pub struct VendorWorker {
    vendor: Arc<Vendor>,
    pool: Arc<TicketPool>,
    sink: Arc<dyn ActivitySink>,
}

impl VendorWorker {
    /// Bind a vendor to the pool it releases into
    #[must_use]
    pub fn new(vendor: Arc<Vendor>, pool: Arc<TicketPool>, sink: Arc<dyn ActivitySink>) -> Self {
        Self { vendor, pool, sink }
    }

    /// Release tickets until the target is reached, the pool refuses a
    /// ticket, or the worker is stopped.
    ///
    /// Stop requests are honored at the top of each iteration and while
    /// sleeping between batches.
    pub async fn run(self, cancel: CancellationToken) -> VendorOutcome {
        let id = self.vendor.id;
        let run = self.vendor.control.begin();
        debug!(vendor = %id, "Vendor worker running");

        let outcome = self.release_loop(&cancel).await;
        let released = self.vendor.released();

        if !self.vendor.control.finish(run, outcome.into()) {
            debug!(vendor = %id, "Restarted while winding down, keeping the newer state");
        }
        self.sink.record(ActivityEvent::VendorFinished {
            vendor: id,
            outcome,
            released,
        });
        metrics::record_worker_finished(Role::Vendor, outcome.as_str());
        info!(vendor = %id, %outcome, released, "Vendor worker finished");
        outcome
    }

    async fn release_loop(&self, cancel: &CancellationToken) -> VendorOutcome {
        let id = self.vendor.id;
        let control = &self.vendor.control;

        loop {
            let snapshot = control.snapshot();
            if cancel.is_cancelled() || !snapshot.runnable {
                return VendorOutcome::Stopped;
            }
            if snapshot.reached_target() {
                return VendorOutcome::Completed;
            }

            let batch = snapshot
                .params
                .tickets_per_release
                .min(snapshot.remaining());
            let added = self.pool.add(batch, id);
            let after = control.advance(added.added());
            let available = self.pool.available();

            for &ticket in added.admitted() {
                self.sink.record(ActivityEvent::TicketReleased {
                    vendor: id,
                    ticket,
                    available,
                });
            }
            for _ in 0..added.rejected() {
                self.sink.record(ActivityEvent::ReleaseRejected {
                    vendor: id,
                    available,
                });
            }
            metrics::record_release(id, added.added(), added.rejected(), available);

            if added.is_full() {
                return VendorOutcome::PoolFull;
            }
            if after.reached_target() {
                return VendorOutcome::Completed;
            }

            tokio::select! {
                () = cancel.cancelled() => return VendorOutcome::Stopped,
                () = tokio::time::sleep(after.params.release_interval) => {}
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use wavepass_core::Money;
    use wavepass_testing::RecordingSink;

    fn plan(total: u32, per_release: u32) -> ReleasePlan {
        ReleasePlan::new(total, per_release, Duration::from_millis(100)).unwrap()
    }

    fn worker(
        vendor: &Arc<Vendor>,
        capacity: usize,
    ) -> (VendorWorker, Arc<TicketPool>, Arc<RecordingSink>) {
        let pool = Arc::new(TicketPool::new(capacity, Money::from_cents(1_000)).unwrap());
        let sink = Arc::new(RecordingSink::new());
        let worker = VendorWorker::new(Arc::clone(vendor), Arc::clone(&pool), sink.clone());
        (worker, pool, sink)
    }

    #[test]
    fn plan_rejects_zero_counts() {
        assert_eq!(
            ReleasePlan::new(0, 1, Duration::ZERO),
            Err(WorkerError::ZeroTarget)
        );
        assert_eq!(
            ReleasePlan::new(1, 0, Duration::ZERO),
            Err(WorkerError::ZeroBatch)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn releases_in_batches_until_target() {
        let vendor = Arc::new(Vendor::new(VendorId::new(1), "Acme", plan(10, 3)));
        let (worker, pool, sink) = worker(&vendor, 100);

        let outcome = worker.run(CancellationToken::new()).await;

        assert_eq!(outcome, VendorOutcome::Completed);
        assert_eq!(pool.released(), 10);
        assert_eq!(vendor.released(), 10);
        assert_eq!(vendor.state(), WorkerState::Completed);
        assert_eq!(sink.count(|e| matches!(e, ActivityEvent::TicketReleased { .. })), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_pool_refuses_tickets() {
        let vendor = Arc::new(Vendor::new(VendorId::new(2), "Acme", plan(10, 4)));
        let (worker, pool, sink) = worker(&vendor, 6);

        let outcome = worker.run(CancellationToken::new()).await;

        assert_eq!(outcome, VendorOutcome::PoolFull);
        assert_eq!(pool.released(), 6);
        assert_eq!(vendor.state(), WorkerState::PoolFull);
        assert_eq!(sink.count(|e| matches!(e, ActivityEvent::ReleaseRejected { .. })), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_run_flag_stops_before_releasing() {
        let vendor = Arc::new(Vendor::new(VendorId::new(3), "Acme", plan(5, 1)));
        vendor.control().request_stop();
        let (worker, pool, _sink) = worker(&vendor, 10);

        assert_eq!(worker.run(CancellationToken::new()).await, VendorOutcome::Stopped);
        assert_eq!(pool.released(), 0);
    }
}
