//! Scheduler service trait, loop driver and state machine
//!
//! Each per-track scheduler is a periodic service: `initialize` once, then
//! `idle` on every tick until the session is cancelled, then `finalize`.
//! A failure inside `idle` terminates that track's loop only; the sibling
//! schedulers keep running (partial-failure isolation across media).

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info, warn};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::clock::MasterClock;
use super::health::SyncHealth;
use super::types::Timestamp;

/// Trait for periodic per-track scheduler services
#[async_trait]
pub trait SchedulerService: Send {
    /// Called once when the service starts
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// The periodic step, invoked repeatedly while the service runs
    async fn idle(&mut self) -> Result<()>;

    /// Called once when the service stops
    async fn finalize(&mut self) {}

    /// Get the name of this service for logging
    fn name(&self) -> &'static str;
}

/// Scheduler service state machine
///
/// `Stopped → Initializing → Idling → Finalizing → Stopped`, driven by the
/// session orchestrator starting and stopping all schedulers together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Service is not running
    Stopped,

    /// `initialize()` is in progress
    Initializing,

    /// Periodic `idle()` loop is running
    Idling,

    /// `finalize()` is in progress
    Finalizing,
}

impl ServiceState {
    /// Check if this state transition is valid
    pub fn can_transition_to(&self, target: &ServiceState) -> bool {
        use ServiceState::*;

        match (self, target) {
            (Stopped, Initializing) => true,
            (Initializing, Idling) => true,
            (Initializing, Finalizing) => true, // aborted during startup
            (Idling, Finalizing) => true,
            (Finalizing, Stopped) => true,

            // Self-transitions
            (a, b) if a == b => true,

            _ => false,
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Stopped => write!(f, "Stopped"),
            ServiceState::Initializing => write!(f, "Initializing"),
            ServiceState::Idling => write!(f, "Idling"),
            ServiceState::Finalizing => write!(f, "Finalizing"),
        }
    }
}

/// Drive a scheduler service until the cancellation token fires
///
/// Runs `initialize` once (raced against cancellation, so a service blocked
/// waiting for its first sample cannot hang a stopping session), then `idle`
/// on every interval tick, then `finalize`. Errors from `initialize` or
/// `idle` are logged and returned, terminating this service's task while the
/// other tracks continue.
pub async fn run_service<S: SchedulerService>(
    mut svc: S,
    cancel: CancellationToken,
    tick: Duration,
) -> Result<()> {
    let mut state = ServiceState::Stopped;

    debug_assert!(state.can_transition_to(&ServiceState::Initializing));
    state = ServiceState::Initializing;
    info!("{}: initializing", svc.name());

    tokio::select! {
        _ = cancel.cancelled() => {
            debug_assert!(state.can_transition_to(&ServiceState::Finalizing));
            svc.finalize().await;
            return Ok(());
        }
        result = svc.initialize() => {
            if let Err(e) = result {
                error!("{}: initialize failed: {e:#}", svc.name());
                svc.finalize().await;
                return Err(e);
            }
        }
    }

    debug_assert!(state.can_transition_to(&ServiceState::Idling));
    state = ServiceState::Idling;

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = svc.idle().await {
                    error!("{}: idle failed, stopping this track: {e:#}", svc.name());
                    svc.finalize().await;
                    return Err(e);
                }
            }
        }
    }

    debug_assert!(state.can_transition_to(&ServiceState::Finalizing));
    state = ServiceState::Finalizing;
    svc.finalize().await;

    debug_assert!(state.can_transition_to(&ServiceState::Stopped));
    state = ServiceState::Stopped;
    let _ = state;
    Ok(())
}

/// Gating decision for the sample at the head of a scheduler's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    /// Sample is due (or was late and has been absorbed): release it
    Release,
    /// Sample is not yet inside the tolerance window: leave it queued
    Hold,
}

/// Compare a sample's timestamp against the master clock
///
/// A sample already in the past pulls the clock backward by the lag (a
/// corrective action, never a dropping one) and is then due. Otherwise the
/// sample is released only when it falls inside the track's tolerance
/// window; a zero window means "deliver as soon as not in the future".
pub(crate) fn gate_sample(
    track: &'static str,
    pts: Timestamp,
    clock: &MasterClock,
    tolerance: Duration,
    health: &SyncHealth,
) -> Gate {
    let dt = pts.delta_micros(clock.now());

    if dt < 0 {
        let lag = Duration::from_micros(dt.unsigned_abs());
        clock.update_offset(lag);
        health.record_late_correction(lag);
        warn!("{track}: stream is {lag:?} late, absorbing lag into master clock");
        return Gate::Release;
    }

    if (dt as u128) < tolerance.as_micros() {
        Gate::Release
    } else {
        Gate::Hold
    }
}
