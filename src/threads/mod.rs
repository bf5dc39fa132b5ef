//! Dual-rate runtime for GatiNav.
//!
//! Two periodic threads share one [`RobotStateSnapshot`]:
//! - Policy thread (10 Hz): obstacle tracking, oracle query, action shaping
//! - Control thread (100 Hz): mode machine and heading servo, one command per tick
//!
//! Neither thread waits on the other. Producers write into the snapshot
//! from any thread at any time.

mod control;
mod policy;

pub use control::{ChannelSink, ControlThread, VelocitySink};
pub use policy::{PolicyOutcome, PolicyThread};

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::GatiConfig;
use crate::error::{GatiError, Result};
use crate::policy::Policy;
use crate::shared::RobotStateSnapshot;

/// Thread handles for the running controller.
pub struct ThreadHandles {
    pub policy: JoinHandle<()>,
    pub control: JoinHandle<()>,
}

impl ThreadHandles {
    /// Wait for both loops to exit. Call after signalling shutdown.
    pub fn join(self) -> Result<()> {
        self.policy
            .join()
            .map_err(|_| GatiError::Thread("policy thread panicked".into()))?;
        self.control
            .join()
            .map_err(|_| GatiError::Thread("control thread panicked".into()))?;
        Ok(())
    }
}

/// Spawn the policy and control threads.
pub fn spawn_threads<S>(
    config: &GatiConfig,
    snapshot: Arc<RobotStateSnapshot>,
    policy: Box<dyn Policy>,
    sink: S,
) -> Result<ThreadHandles>
where
    S: VelocitySink + 'static,
{
    let mut policy_thread = PolicyThread::new(config, Arc::clone(&snapshot), policy);
    let mut control_thread = ControlThread::new(config, Arc::clone(&snapshot), sink);

    // Control first: it must be emitting (zero) commands before anything else runs
    let control_handle = thread::Builder::new()
        .name("control".into())
        .spawn(move || control_thread.run())
        .map_err(|e| GatiError::Thread(format!("Failed to spawn control thread: {}", e)))?;

    let policy_handle = match thread::Builder::new()
        .name("policy".into())
        .spawn(move || policy_thread.run())
    {
        Ok(handle) => handle,
        Err(e) => {
            stop_control(&snapshot, control_handle);
            return Err(GatiError::Thread(format!(
                "Failed to spawn policy thread: {}",
                e
            )));
        }
    };

    Ok(ThreadHandles {
        policy: policy_handle,
        control: control_handle,
    })
}

/// Shut down a control thread that is running alone and wait for its final stop.
fn stop_control(snapshot: &RobotStateSnapshot, control: JoinHandle<()>) {
    snapshot.signal_shutdown();
    if control.join().is_err() {
        tracing::error!("Control thread panicked during startup rollback");
    }
}

/// Fixed-rate scheduler with absolute deadlines.
///
/// A tick that overruns its slot is followed immediately by the next one;
/// missed slots are not replayed.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    pub fn new(rate_hz: f64) -> Self {
        Self::starting_at(rate_hz, Instant::now())
    }

    /// Ticker whose first deadline is one period after `start`.
    pub fn starting_at(rate_hz: f64, start: Instant) -> Self {
        let period = Duration::from_secs_f64(1.0 / rate_hz);
        Self {
            period,
            next: start + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    /// Advance to the following slot as seen at `now`.
    ///
    /// Returns how long to sleep, or `None` when the deadline has already
    /// passed and the next tick should run at once.
    pub fn advance(&mut self, now: Instant) -> Option<Duration> {
        if self.next > now {
            let remaining = self.next - now;
            self.next += self.period;
            Some(remaining)
        } else {
            self.next = now + self.period;
            None
        }
    }

    /// Sleep until the next deadline.
    pub fn wait(&mut self) {
        if let Some(remaining) = self.advance(Instant::now()) {
            thread::sleep(remaining);
        }
    }
}
