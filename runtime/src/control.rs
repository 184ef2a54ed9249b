//! Per-actor control block shared between a worker and its operator.
//!
//! A worker reads its parameters and progress from here on every iteration,
//! and the operator writes to it from another task. Everything sits behind
//! one mutex so a reconfiguration is never seen half-applied.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use wavepass_core::{CustomerOutcome, VendorOutcome};

/// Parameters that define how many units a run aims for.
pub trait Plan: Copy + Send + Sync + 'static {
    /// Units (tickets) one run should reach
    fn target(&self) -> u32;
}

/// Lifecycle state of an actor's worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Never scheduled
    Idle,
    /// Scheduled and waiting for an executor slot
    Pending,
    /// Running its loop
    Running,
    /// Reached its target
    Completed,
    /// Vendor only: the pool refused tickets
    PoolFull,
    /// Customer only: an attempt found nothing to buy
    SoldOut,
    /// Stopped by an operator or by shutdown
    Stopped,
}

impl WorkerState {
    /// Lowercase label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::PoolFull => "pool_full",
            Self::SoldOut => "sold_out",
            Self::Stopped => "stopped",
        }
    }

    /// Whether the worker has finished a run
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::PoolFull | Self::SoldOut | Self::Stopped
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<VendorOutcome> for WorkerState {
    fn from(outcome: VendorOutcome) -> Self {
        match outcome {
            VendorOutcome::Completed => Self::Completed,
            VendorOutcome::PoolFull => Self::PoolFull,
            VendorOutcome::Stopped => Self::Stopped,
        }
    }
}

impl From<CustomerOutcome> for WorkerState {
    fn from(outcome: CustomerOutcome) -> Self {
        match outcome {
            CustomerOutcome::Completed => Self::Completed,
            CustomerOutcome::SoldOut => Self::SoldOut,
            CustomerOutcome::Stopped => Self::Stopped,
        }
    }
}

/// Point-in-time copy of a control block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlSnapshot<P> {
    /// Current parameters
    pub params: P,
    /// Units reached in the current run
    pub progress: u32,
    /// Cleared by a stop request, set again by start or reconfiguration
    pub runnable: bool,
    /// Lifecycle state
    pub state: WorkerState,
    /// Bumped by every start; a worker only reports for its own run
    pub run: u64,
}

impl<P: Plan> ControlSnapshot<P> {
    /// Whether progress has reached the current target
    #[must_use]
    pub fn reached_target(&self) -> bool {
        self.progress >= self.params.target()
    }

    /// Units still to go in this run
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.params.target().saturating_sub(self.progress)
    }
}

/// Mutable parameters, progress and run flag for one actor.
#[derive(Debug)]
pub struct WorkerControl<P> {
    inner: Mutex<ControlSnapshot<P>>,
}

impl<P: Plan> WorkerControl<P> {
    /// New idle control block with zero progress
    #[must_use]
    pub const fn new(params: P) -> Self {
        Self {
            inner: Mutex::new(ControlSnapshot {
                params,
                progress: 0,
                runnable: true,
                state: WorkerState::Idle,
                run: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControlSnapshot<P>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> ControlSnapshot<P> {
        *self.lock()
    }

    /// Current parameters
    #[must_use]
    pub fn params(&self) -> P {
        self.lock().params
    }

    /// Units reached in the current run
    #[must_use]
    pub fn progress(&self) -> u32 {
        self.lock().progress
    }

    /// Lifecycle state
    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.lock().state
    }

    /// Whether the worker may keep going
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.lock().runnable
    }

    /// Replace the parameters and start counting from zero.
    ///
    /// A stopped actor becomes runnable again. A worker that is currently
    /// running picks the new values up at its next iteration.
    pub fn update_parameters(&self, params: P) {
        let mut inner = self.lock();
        inner.params = params;
        inner.progress = 0;
        inner.runnable = true;
    }

    /// Re-arm the run flag and mark the worker as waiting for a slot
    pub fn prepare_start(&self) {
        let mut inner = self.lock();
        inner.runnable = true;
        inner.state = WorkerState::Pending;
        inner.run = inner.run.wrapping_add(1);
    }

    /// Clear the run flag.
    ///
    /// A worker that never got an executor slot is marked `Stopped` here,
    /// since it will not run to record that itself.
    pub fn request_stop(&self) {
        let mut inner = self.lock();
        inner.runnable = false;
        if inner.state == WorkerState::Pending {
            inner.state = WorkerState::Stopped;
        }
    }

    /// Add to progress and return the state after the increment
    pub fn advance(&self, units: u32) -> ControlSnapshot<P> {
        let mut inner = self.lock();
        inner.progress = inner.progress.saturating_add(units);
        *inner
    }

    /// Mark the worker running and return the run it belongs to
    pub fn begin(&self) -> u64 {
        let mut inner = self.lock();
        inner.state = WorkerState::Running;
        inner.run
    }

    /// Record how `run` ended.
    ///
    /// Ignored if the actor has been started again since, so a stopped
    /// worker winding down cannot overwrite its successor's state.
    pub fn finish(&self, run: u64, state: WorkerState) -> bool {
        let mut inner = self.lock();
        if inner.run != run {
            return false;
        }
        inner.state = state;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Target(u32);

    impl Plan for Target {
        fn target(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn reconfiguration_resets_progress_and_rearms() {
        let control = WorkerControl::new(Target(5));
        assert_eq!(control.advance(3).remaining(), 2);

        control.request_stop();
        assert!(!control.is_runnable());

        control.update_parameters(Target(8));
        let snapshot = control.snapshot();
        assert_eq!(snapshot.progress, 0);
        assert!(snapshot.runnable);
        assert_eq!(snapshot.remaining(), 8);
    }

    #[test]
    fn stop_while_pending_marks_stopped() {
        let control = WorkerControl::new(Target(1));
        control.prepare_start();
        assert_eq!(control.state(), WorkerState::Pending);

        control.request_stop();
        assert_eq!(control.state(), WorkerState::Stopped);
    }

    #[test]
    fn stop_while_running_leaves_state_to_worker() {
        let control = WorkerControl::new(Target(1));
        control.prepare_start();
        control.begin();

        control.request_stop();
        assert_eq!(control.state(), WorkerState::Running);
        assert!(!control.is_runnable());
    }

    #[test]
    fn stale_run_cannot_overwrite_restart() {
        let control = WorkerControl::new(Target(5));
        control.prepare_start();
        let first = control.begin();

        control.request_stop();
        control.prepare_start();
        assert!(!control.finish(first, WorkerState::Stopped));
        assert_eq!(control.state(), WorkerState::Pending);

        let second = control.begin();
        assert!(control.finish(second, WorkerState::Completed));
        assert_eq!(control.state(), WorkerState::Completed);
    }

    #[test]
    fn reached_target_follows_current_params() {
        let control = WorkerControl::new(Target(2));
        assert!(control.advance(2).reached_target());

        control.update_parameters(Target(3));
        assert!(!control.snapshot().reached_target());
        assert!(WorkerState::from(VendorOutcome::PoolFull).is_terminal());
        assert!(!WorkerState::Pending.is_terminal());
    }
}
