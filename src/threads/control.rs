//! Control thread: one velocity command every tick.
//!
//! Runs the mode machine and heading servo against the freshest pose and
//! desired action. Falls back to zero velocity whenever the pose is missing,
//! and always sends a final stop on shutdown.

use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::config::GatiConfig;
use crate::control::{ActionShaper, ControlLaw};
use crate::core::VelocityCommand;
use crate::error::{GatiError, Result};
use crate::shared::RobotStateSnapshot;

use super::Ticker;

/// Actuator side of the controller.
pub trait VelocitySink: Send {
    fn send(&mut self, command: VelocityCommand) -> Result<()>;
}

/// Forwards commands over a crossbeam channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<VelocityCommand>,
}

impl ChannelSink {
    pub fn new(tx: Sender<VelocityCommand>) -> Self {
        Self { tx }
    }
}

impl VelocitySink for ChannelSink {
    fn send(&mut self, command: VelocityCommand) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| GatiError::Thread("velocity receiver disconnected".into()))
    }
}

/// Control thread state and logic.
pub struct ControlThread<S: VelocitySink> {
    snapshot: Arc<RobotStateSnapshot>,
    law: ControlLaw,
    sink: S,
    rate_hz: f64,
    /// Set after the first failed send, to log it once
    sink_failed: bool,
    ticks: u64,
}

impl<S: VelocitySink> ControlThread<S> {
    pub fn new(config: &GatiConfig, snapshot: Arc<RobotStateSnapshot>, sink: S) -> Self {
        Self {
            snapshot,
            law: ControlLaw::new(
                ActionShaper::new(config.shaper.clone()),
                config.robot.heading_gain,
                config.robot.preferred_speed,
            ),
            sink,
            rate_hz: config.rates.control_hz,
            sink_failed: false,
            ticks: 0,
        }
    }

    /// Run the control loop until shutdown, then stop the robot.
    pub fn run(&mut self) {
        tracing::info!("Control thread started ({:.0} Hz)", self.rate_hz);

        let mut ticker = Ticker::new(self.rate_hz);
        while !self.snapshot.should_shutdown() {
            self.tick();
            ticker.wait();
        }

        self.stop();
        tracing::info!("Control thread exited after {} ticks", self.ticks);
    }

    /// Compute, record and send one command.
    pub fn tick(&mut self) -> VelocityCommand {
        let command = match self.snapshot.pose() {
            Some(stamped) => {
                let mode = self.snapshot.step_mode(&stamped.pose);
                let desired = self.snapshot.desired_action();
                self.law.command(mode, &stamped.pose, desired.as_ref())
            }
            None => VelocityCommand::stop(),
        };

        self.ticks += 1;
        self.emit(command);
        command
    }

    /// Send a zero command.
    pub fn stop(&mut self) {
        tracing::info!("Stopping robot");
        self.emit(VelocityCommand::stop());
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn emit(&mut self, command: VelocityCommand) {
        self.snapshot.set_last_command(command);
        match self.sink.send(command) {
            Ok(()) => self.sink_failed = false,
            Err(e) => {
                if !self.sink_failed {
                    tracing::error!("Failed to send velocity command: {}", e);
                }
                self.sink_failed = true;
            }
        }
    }
}
