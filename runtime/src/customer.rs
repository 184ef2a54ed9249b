//! Customer actor and its purchase loop.

use crate::control::{Plan, WorkerControl, WorkerState};
use crate::error::WorkerError;
use crate::metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wavepass_core::{ActivityEvent, ActivitySink, CustomerId, CustomerOutcome, Role, TicketPool};

/// How a customer buys tickets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PurchasePlan {
    total_tickets: u32,
    retrieval_interval: Duration,
}

impl PurchasePlan {
    /// Build a plan.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::ZeroTarget`] if `total_tickets` is zero.
    pub const fn new(
        total_tickets: u32,
        retrieval_interval: Duration,
    ) -> Result<Self, WorkerError> {
        if total_tickets == 0 {
            return Err(WorkerError::ZeroTarget);
        }
        Ok(Self {
            total_tickets,
            retrieval_interval,
        })
    }

    /// Tickets to buy in one run
    #[must_use]
    pub const fn total_tickets(&self) -> u32 {
        self.total_tickets
    }

    /// Pause between purchases
    #[must_use]
    pub const fn retrieval_interval(&self) -> Duration {
        self.retrieval_interval
    }
}

impl Plan for PurchasePlan {
    fn target(&self) -> u32 {
        self.total_tickets
    }
}

/// A registered customer and its control block.
#[derive(Debug)]
pub struct Customer {
    id: CustomerId,
    name: String,
    control: WorkerControl<PurchasePlan>,
}

impl Customer {
    /// Create an idle customer
    #[must_use]
    pub fn new(id: CustomerId, name: impl Into<String>, plan: PurchasePlan) -> Self {
        Self {
            id,
            name: name.into(),
            control: WorkerControl::new(plan),
        }
    }

    /// Customer id
    #[must_use]
    pub const fn id(&self) -> CustomerId {
        self.id
    }

    /// Display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current plan
    #[must_use]
    pub fn plan(&self) -> PurchasePlan {
        self.control.params()
    }

    /// Tickets bought in the current run
    #[must_use]
    pub fn purchased(&self) -> u32 {
        self.control.progress()
    }

    /// Lifecycle state
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.control.state()
    }

    /// Replace the plan, reset progress and re-arm a stopped customer
    pub fn update_plan(&self, plan: PurchasePlan) {
        self.control.update_parameters(plan);
        info!(customer = %self.id, total = plan.total_tickets, "Customer plan updated");
    }

    /// Shared control block
    #[must_use]
    pub const fn control(&self) -> &WorkerControl<PurchasePlan> {
        &self.control
    }
}

/// One run of a customer's purchase loop.
pub struct CustomerWorker {
    customer: Arc<Customer>,
    pool: Arc<TicketPool>,
    sink: Arc<dyn ActivitySink>,
}

impl CustomerWorker {
    /// Bind a customer to the pool it buys from
    #[must_use]
    pub fn new(
        customer: Arc<Customer>,
        pool: Arc<TicketPool>,
        sink: Arc<dyn ActivitySink>,
    ) -> Self {
        Self {
            customer,
            pool,
            sink,
        }
    }

    /// Buy one ticket per interval until the target is reached, an attempt
    /// finds nothing available, or the worker is stopped.
    ///
    /// A single failed attempt ends the run; there is no retry.
    pub async fn run(self, cancel: CancellationToken) -> CustomerOutcome {
        let id = self.customer.id;
        let run = self.customer.control.begin();
        debug!(customer = %id, "Customer worker running");

        let outcome = self.purchase_loop(&cancel).await;
        let purchased = self.customer.purchased();

        if !self.customer.control.finish(run, outcome.into()) {
            debug!(customer = %id, "Restarted while winding down, keeping the newer state");
        }
        self.sink.record(ActivityEvent::CustomerFinished {
            customer: id,
            outcome,
            purchased,
        });
        metrics::record_worker_finished(Role::Customer, outcome.as_str());
        info!(customer = %id, %outcome, purchased, "Customer worker finished");
        outcome
    }

    async fn purchase_loop(&self, cancel: &CancellationToken) -> CustomerOutcome {
        let id = self.customer.id;
        let control = &self.customer.control;

        loop {
            let snapshot = control.snapshot();
            if cancel.is_cancelled() || !snapshot.runnable {
                return CustomerOutcome::Stopped;
            }
            if snapshot.reached_target() {
                return CustomerOutcome::Completed;
            }

            let Ok(ticket) = self.pool.remove(id) else {
                self.sink.record(ActivityEvent::PurchaseFailed { customer: id });
                metrics::record_purchase_failure();
                return CustomerOutcome::SoldOut;
            };

            let after = control.advance(1);
            self.sink.record(ActivityEvent::TicketPurchased {
                customer: id,
                ticket: ticket.id(),
                purchased: after.progress,
            });
            metrics::record_sale(self.pool.available());

            if after.reached_target() {
                return CustomerOutcome::Completed;
            }

            tokio::select! {
                () = cancel.cancelled() => return CustomerOutcome::Stopped,
                () = tokio::time::sleep(after.params.retrieval_interval) => {}
            }
        }
    }
}
