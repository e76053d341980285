//! Scripted behaviour of the mock Unity client.
//!
//! Host commands are answered after configurable delays that stand in for
//! the real client's loading and rendering time. Replies are queued on the
//! [`Scheduler`] so the receive thread keeps reading while they wait.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

use spray_config::Config;
use spray_protocol::{
    Acknowledgement, CollisionReport, CommandRequest, Message, Position, SimulationCommand,
    SimulationReport,
};

use crate::PEER_TARGET;
use crate::channel::MessageSender;
use crate::errors::ChannelError;
use crate::receive::{MessageHandler, ReceiveOutcome};
use crate::schedule::{Scheduler, TaskHandle};

/// Quality score reported by every simulated run.
pub const SIMULATED_QUALITY_SCORE: f64 = 0.95;

/// Simulated latencies of the mock client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerTimings {
    /// Delay before `workpiece_loaded`.
    pub workpiece_latency: Duration,
    /// Delay before `trajectory_displayed`.
    pub trajectory_latency: Duration,
    /// Delay before `simulation_complete`.
    pub simulation_duration: Duration,
}

impl PeerTimings {
    /// Reads the latencies from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            workpiece_latency: config.workpiece_latency(),
            trajectory_latency: config.trajectory_latency(),
            simulation_duration: config.simulation_duration(),
        }
    }
}

impl Default for PeerTimings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The mock Unity client.
#[derive(Debug)]
pub struct MockPeer {
    sender: MessageSender,
    scheduler: Arc<Scheduler>,
    timings: PeerTimings,
    pending_completion: Mutex<Option<TaskHandle>>,
}

impl MockPeer {
    /// Builds a peer that replies through `sender`.
    #[must_use]
    pub fn new(sender: MessageSender, scheduler: Arc<Scheduler>, timings: PeerTimings) -> Self {
        Self {
            sender,
            scheduler,
            timings,
            pending_completion: Mutex::new(None),
        }
    }

    /// Reacts to one host message.
    pub fn dispatch(&self, message: Message) {
        match message {
            Message::WorkpieceData(payload) => {
                info!(
                    target: PEER_TARGET,
                    event = "workpiece_data",
                    payload = %payload,
                    "received workpiece data"
                );
                self.reply_after(
                    self.timings.workpiece_latency,
                    Message::WorkpieceLoaded(Acknowledgement::ok("Workpiece loaded successfully")),
                );
            }
            Message::TrajectoryData(payload) => {
                info!(
                    target: PEER_TARGET,
                    event = "trajectory_data",
                    payload = %payload,
                    "received trajectory data"
                );
                self.reply_after(
                    self.timings.trajectory_latency,
                    Message::TrajectoryDisplayed(Acknowledgement::ok(
                        "Trajectory displayed successfully",
                    )),
                );
            }
            Message::SimulationCommand(request) => self.simulation_command(&request),
            Message::CameraCommand(request) => {
                info!(
                    target: PEER_TARGET,
                    event = "camera_command",
                    command = %request.command,
                    parameters = ?request.parameters,
                    "camera command"
                );
            }
            Message::HeartbeatResponse => {
                debug!(target: PEER_TARGET, event = "heartbeat_response", "host is alive");
            }
            Message::Unknown { tag, .. } => {
                warn!(
                    target: PEER_TARGET,
                    event = "unknown_message",
                    tag = %tag,
                    "ignoring unknown message type"
                );
            }
            other => {
                warn!(
                    target: PEER_TARGET,
                    event = "unexpected_message",
                    tag = other.tag(),
                    "ignoring message meant for the host"
                );
            }
        }
    }

    /// Sends a liveness probe to the host.
    ///
    /// # Errors
    ///
    /// Returns the channel error when the send fails.
    pub fn send_heartbeat(&self) -> Result<(), ChannelError> {
        self.sender.send(&Message::Heartbeat)
    }

    /// Reports a collision between the spray gun and the workpiece.
    ///
    /// # Errors
    ///
    /// Returns the channel error when the send fails.
    pub fn simulate_collision(&self) -> Result<(), ChannelError> {
        self.sender
            .send(&Message::CollisionDetected(simulated_collision()))
    }

    /// Sends a collision report after `delay`.
    pub fn schedule_collision(&self, delay: Duration) {
        self.reply_after(delay, Message::CollisionDetected(simulated_collision()));
    }

    fn simulation_command(&self, request: &CommandRequest<SimulationCommand>) {
        info!(
            target: PEER_TARGET,
            event = "simulation_command",
            command = %request.command,
            "simulation command"
        );
        match request.command {
            SimulationCommand::Start => {
                let duration = self.timings.simulation_duration;
                let report = SimulationReport {
                    status: String::from("completed"),
                    duration: duration.as_secs_f64(),
                    quality_score: SIMULATED_QUALITY_SCORE,
                };
                let handle = self.schedule_send(duration, Message::SimulationComplete(report));
                // A restart replaces the run in flight.
                if let Some(previous) = self.replace_pending(handle) {
                    previous.cancel();
                }
            }
            SimulationCommand::Stop | SimulationCommand::Reset => {
                if let Some(pending) = self.take_unfinished_completion() {
                    pending.cancel();
                    info!(
                        target: PEER_TARGET,
                        event = "simulation_cancelled",
                        command = %request.command,
                        "pending simulation cancelled"
                    );
                }
            }
            _ => {}
        }
    }

    fn replace_pending(&self, next: Option<TaskHandle>) -> Option<TaskHandle> {
        let mut pending = self
            .pending_completion
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *pending, next)
    }

    // A completion that has already been sent is not a pending run.
    fn take_unfinished_completion(&self) -> Option<TaskHandle> {
        self.replace_pending(None)
            .filter(|pending| !pending.is_finished())
    }

    fn reply_after(&self, delay: Duration, message: Message) {
        let _ = self.schedule_send(delay, message);
    }

    fn schedule_send(&self, delay: Duration, message: Message) -> Option<TaskHandle> {
        let sender = self.sender.clone();
        let tag = message.tag().to_owned();
        let scheduled = self.scheduler.schedule(delay, move || {
            if let Err(error) = sender.send(&message) {
                warn!(
                    target: PEER_TARGET,
                    tag = message.tag(),
                    error = %error,
                    "failed to send scripted reply"
                );
            }
        });
        match scheduled {
            Ok(handle) => Some(handle),
            Err(error) => {
                warn!(
                    target: PEER_TARGET,
                    tag = %tag,
                    error = %error,
                    "failed to schedule scripted reply"
                );
                None
            }
        }
    }
}

fn simulated_collision() -> CollisionReport {
    CollisionReport {
        message: String::from("Collision detected between spray gun and workpiece"),
        position: Position {
            x: 100.0,
            y: 200.0,
            z: 150.0,
        },
        severity: String::from("high"),
    }
}

type CloseCallback = Box<dyn FnOnce(&ReceiveOutcome) + Send + 'static>;

/// Connects a [`MockPeer`] to a channel's receive loop.
pub struct PeerHandler {
    peer: Arc<MockPeer>,
    on_close: Option<CloseCallback>,
}

impl PeerHandler {
    /// Wraps a peer.
    #[must_use]
    pub fn new(peer: Arc<MockPeer>) -> Self {
        Self {
            peer,
            on_close: None,
        }
    }

    /// Runs `callback` with the loop outcome once the receive loop stops.
    #[must_use]
    pub fn on_close<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&ReceiveOutcome) + Send + 'static,
    {
        self.on_close = Some(Box::new(callback));
        self
    }
}

impl MessageHandler for PeerHandler {
    fn handle(&mut self, message: Message) {
        self.peer.dispatch(message);
    }

    fn closed(&mut self, outcome: &ReceiveOutcome) {
        if let Some(callback) = self.on_close.take() {
            callback(outcome);
        }
    }
}
