//! Task supervisor: schedules, tracks and stops vendor and customer workers.
//!
//! Vendors and customers run on separate bounded executors. At most one live
//! task is kept per actor; starting an actor whose previous run has finished
//! replaces the stale handle.

use crate::customer::{Customer, CustomerWorker};
use crate::error::SupervisorError;
use crate::executor::{Executor, ShutdownReport};
use crate::vendor::{Vendor, VendorWorker};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wavepass_core::{ActivityEvent, ActivitySink, ActorId, TicketPool};

/// Executor widths and shutdown grace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Vendor workers running at once
    pub vendor_concurrency: usize,
    /// Customer workers running at once
    pub customer_concurrency: usize,
    /// How long shutdown waits before aborting workers
    pub shutdown_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            vendor_concurrency: 10,
            customer_concurrency: 50,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Anything the supervisor can stop.
trait Supervised: Send + Sync {
    fn request_stop(&self);
}

impl Supervised for Vendor {
    fn request_stop(&self) {
        self.control().request_stop();
    }
}

impl Supervised for Customer {
    fn request_stop(&self) {
        self.control().request_stop();
    }
}

struct TaskSlot {
    actor: Arc<dyn Supervised>,
    cancel: CancellationToken,
    handle: JoinHandle<Option<()>>,
}

impl TaskSlot {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }

    fn stop(&self) {
        self.actor.request_stop();
        self.cancel.cancel();
    }
}

/// Owns the two executors and the per-actor task handles.
pub struct Supervisor {
    pool: Arc<TicketPool>,
    sink: Arc<dyn ActivitySink>,
    config: SupervisorConfig,
    vendors: Executor,
    customers: Executor,
    tasks: Mutex<HashMap<ActorId, TaskSlot>>,
    root: CancellationToken,
    shut_down: AtomicBool,
}

impl Supervisor {
    /// Create a supervisor for workers trading on `pool`
    #[must_use]
    pub fn new(
        pool: Arc<TicketPool>,
        sink: Arc<dyn ActivitySink>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            pool,
            sink,
            vendors: Executor::new("vendors", config.vendor_concurrency),
            customers: Executor::new("customers", config.customer_concurrency),
            config,
            tasks: Mutex::new(HashMap::new()),
            root: CancellationToken::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<ActorId, TaskSlot>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim_slot(
        &self,
        tasks: &HashMap<ActorId, TaskSlot>,
        actor: ActorId,
    ) -> Result<CancellationToken, SupervisorError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(SupervisorError::ShutDown);
        }
        if tasks.get(&actor).is_some_and(TaskSlot::is_live) {
            return Err(SupervisorError::AlreadyRunning(actor));
        }
        Ok(self.root.child_token())
    }

    /// Schedule a vendor's release loop.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::AlreadyRunning`] if the vendor's previous
    /// task has not finished, or [`SupervisorError::ShutDown`] after
    /// [`shutdown`](Self::shutdown).
    pub fn start_vendor(&self, vendor: &Arc<Vendor>) -> Result<(), SupervisorError> {
        let actor = ActorId::from(vendor.id());
        let mut tasks = self.tasks();
        let cancel = self.claim_slot(&tasks, actor)?;

        vendor.control().prepare_start();
        let worker = VendorWorker::new(
            Arc::clone(vendor),
            Arc::clone(&self.pool),
            Arc::clone(&self.sink),
        );
        let run = worker.run(cancel.clone());
        let handle = self.vendors.spawn(cancel.clone(), async move {
            run.await;
        });

        let supervised: Arc<dyn Supervised> = Arc::clone(vendor) as Arc<dyn Supervised>;
        tasks.insert(actor, TaskSlot {
            actor: supervised,
            cancel,
            handle,
        });
        drop(tasks);

        self.sink.record(ActivityEvent::WorkerStarted { actor });
        info!(%actor, "Vendor scheduled");
        Ok(())
    }

    /// Schedule a customer's purchase loop.
    ///
    /// # Errors
    ///
    /// Same as [`start_vendor`](Self::start_vendor).
    pub fn start_customer(&self, customer: &Arc<Customer>) -> Result<(), SupervisorError> {
        let actor = ActorId::from(customer.id());
        let mut tasks = self.tasks();
        let cancel = self.claim_slot(&tasks, actor)?;

        customer.control().prepare_start();
        let worker = CustomerWorker::new(
            Arc::clone(customer),
            Arc::clone(&self.pool),
            Arc::clone(&self.sink),
        );
        let run = worker.run(cancel.clone());
        let handle = self.customers.spawn(cancel.clone(), async move {
            run.await;
        });

        let supervised: Arc<dyn Supervised> = Arc::clone(customer) as Arc<dyn Supervised>;
        tasks.insert(actor, TaskSlot {
            actor: supervised,
            cancel,
            handle,
        });
        drop(tasks);

        self.sink.record(ActivityEvent::WorkerStarted { actor });
        info!(%actor, "Customer scheduled");
        Ok(())
    }

    /// Stop an actor's live task.
    ///
    /// Clears the run flag, cancels the task and forgets its handle. The
    /// worker observes the stop at its next check or immediately if it is
    /// sleeping between iterations.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotRunning`] if the actor has no live task.
    pub fn stop(&self, actor: ActorId) -> Result<(), SupervisorError> {
        let slot = {
            let mut tasks = self.tasks();
            match tasks.remove(&actor) {
                Some(slot) if slot.is_live() => slot,
                _ => return Err(SupervisorError::NotRunning(actor)),
            }
        };

        slot.stop();
        self.sink.record(ActivityEvent::WorkerStopped { actor });
        info!(%actor, "Worker stop requested");
        Ok(())
    }

    /// Whether `actor` has a task that has not finished
    #[must_use]
    pub fn is_running(&self, actor: ActorId) -> bool {
        self.tasks().get(&actor).is_some_and(TaskSlot::is_live)
    }

    /// Actors with a live task, in id order
    #[must_use]
    pub fn running(&self) -> Vec<ActorId> {
        let mut live: Vec<ActorId> = self
            .tasks()
            .iter()
            .filter(|(_, slot)| slot.is_live())
            .map(|(actor, _)| *actor)
            .collect();
        live.sort_by_key(|actor| actor_order(*actor));
        live
    }

    /// Pool the workers trade on
    #[must_use]
    pub const fn pool(&self) -> &Arc<TicketPool> {
        &self.pool
    }

    /// Executor widths and grace period in use
    #[must_use]
    pub const fn config(&self) -> SupervisorConfig {
        self.config
    }

    /// Whether [`shutdown`](Self::shutdown) has run
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stop every worker and wind both executors down.
    ///
    /// Each live worker gets its stop request first and a `WorkerStopped`
    /// entry; then each executor waits up to the configured grace period
    /// before aborting what is left. Calling this twice is harmless.
    pub async fn shutdown(&self) -> ShutdownReport {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!("Supervisor already shut down");
            return ShutdownReport {
                drained: true,
                aborted: 0,
            };
        }

        info!("Shutting down workers...");
        let mut live: Vec<(ActorId, TaskSlot)> = self
            .tasks()
            .drain()
            .filter(|(_, slot)| slot.is_live())
            .collect();
        live.sort_by_key(|(actor, _)| actor_order(*actor));
        for (actor, slot) in &live {
            slot.actor.request_stop();
            self.sink.record(ActivityEvent::WorkerStopped { actor: *actor });
        }
        self.root.cancel();

        let grace = self.config.shutdown_grace;
        let (vendors, customers) =
            tokio::join!(self.vendors.shutdown(grace), self.customers.shutdown(grace));
        let report = vendors.merge(customers);

        info!(
            drained = report.drained,
            aborted = report.aborted,
            "Worker shutdown complete"
        );
        report
    }
}

const fn actor_order(actor: ActorId) -> (u8, u32) {
    match actor {
        ActorId::Vendor(id) => (0, id.value()),
        ActorId::Customer(id) => (1, id.value()),
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("config", &self.config)
            .field("vendors", &self.vendors)
            .field("customers", &self.customers)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
