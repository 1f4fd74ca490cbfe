//! Run-state gate and cooperative stop signal.
//!
//! # State Transitions
//! ```text
//! Idle → Starting: a start* call wins the gate
//! Starting → Running: the run has cleared any stale stop request
//! Starting/Running → Idle: guard dropped (completion, stop, error or panic)
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Whether an engine instance has a run in flight.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle = 0,
    Running = 1,
}

/// Gate held, run not yet accepting stop requests. Reported as `Idle`.
const STARTING: u8 = 2;

impl From<u8> for RunState {
    fn from(val: u8) -> Self {
        match val {
            1 => RunState::Running,
            _ => RunState::Idle,
        }
    }
}

/// Single-flight gate for ingestion runs.
#[derive(Debug)]
pub(crate) struct RunGate {
    state: AtomicU8,
}

impl RunGate {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::Idle as u8),
        }
    }

    pub(crate) fn state(&self) -> RunState {
        RunState::from(self.state.load(Ordering::Acquire))
    }

    /// Move Idle → Starting. Returns `None` if a run is already in flight.
    pub(crate) fn try_enter(&self) -> Option<RunGuard<'_>> {
        self.state
            .compare_exchange(
                RunState::Idle as u8,
                STARTING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| RunGuard { gate: self })
    }
}

/// A RAII guard that returns the gate to Idle.
#[derive(Debug)]
pub(crate) struct RunGuard<'a> {
    gate: &'a RunGate,
}

impl RunGuard<'_> {
    /// Move Starting → Running. Stop requests are honoured from here on.
    pub(crate) fn activate(&self) {
        self.gate.state.store(RunState::Running as u8, Ordering::Release);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.gate.state.store(RunState::Idle as u8, Ordering::Release);
    }
}

/// Stop flag observed by run loops at their checkpoints.
#[derive(Debug)]
pub(crate) struct StopSignal {
    tx: watch::Sender<bool>,
}

impl StopSignal {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Request the in-flight run to stop.
    pub(crate) fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Clear a stale request; called once a new run owns the gate.
    pub(crate) fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub(crate) fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Sleep for `duration`, returning early with `true` if stopped.
    pub(crate) async fn sleep(&self, duration: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        if duration.is_zero() {
            return false;
        }

        let mut rx = self.tx.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            stopped = async { rx.wait_for(|stopped| *stopped).await.is_ok() } => stopped,
        }
    }
}
