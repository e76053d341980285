//! A complete mock-peer session.
//!
//! Connect, start listening, wait out the start-up delay, announce with a
//! heartbeat, then stay connected until the host goes away or the process
//! is asked to stop.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tracing::{info, warn};

use spray_config::Config;

use crate::SESSION_TARGET;
use crate::channel::{ChannelOptions, LineChannel};
use crate::errors::{ChannelError, ScheduleError};
use crate::peer::{MockPeer, PeerHandler, PeerTimings};
use crate::receive::ReceiveOutcome;
use crate::schedule::Scheduler;
use crate::shutdown::{ShutdownError, ShutdownSignal};

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// A shutdown signal arrived.
    Interrupted,
    /// The receive loop stopped on its own.
    Closed(ReceiveOutcome),
}

/// Errors that abort a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The channel could not be established.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// The reply scheduler could not start.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    /// The shutdown listener failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// The shutdown listener thread could not start.
    #[error("failed to spawn shutdown listener: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

enum SessionEvent {
    Closed(ReceiveOutcome),
    Shutdown(Result<(), ShutdownError>),
}

/// Runs a mock-peer session against the configured endpoint.
///
/// # Errors
///
/// Returns [`SessionError`] when the connection cannot be made, a worker
/// thread cannot start, or the shutdown listener fails. A failed heartbeat
/// is logged and the session carries on.
pub fn run_peer_session(
    config: &Config,
    shutdown: Arc<dyn ShutdownSignal>,
) -> Result<SessionEnd, SessionError> {
    let mut channel = LineChannel::connect(config.endpoint(), ChannelOptions::from_config(config))?;
    let scheduler = Arc::new(Scheduler::start()?);
    let peer = Arc::new(MockPeer::new(
        channel.sender(),
        scheduler,
        PeerTimings::from_config(config),
    ));

    let (events_tx, events) = mpsc::channel();
    let closed_tx = events_tx.clone();
    channel.start_receiving(PeerHandler::new(Arc::clone(&peer)).on_close(move |outcome| {
        let _ = closed_tx.send(SessionEvent::Closed(outcome.clone()));
    }))?;

    thread::Builder::new()
        .name(String::from("spray-shutdown"))
        .spawn(move || {
            let _ = events_tx.send(SessionEvent::Shutdown(shutdown.wait()));
        })
        .map_err(|source| SessionError::Spawn { source })?;

    let event = match events.recv_timeout(config.startup_delay()) {
        Ok(event) => Some(event),
        Err(RecvTimeoutError::Timeout) => {
            announce(&peer, config);
            events.recv().ok()
        }
        Err(RecvTimeoutError::Disconnected) => None,
    };

    channel.disconnect();
    let end = match event {
        Some(SessionEvent::Closed(outcome)) => SessionEnd::Closed(outcome),
        Some(SessionEvent::Shutdown(result)) => {
            result?;
            SessionEnd::Interrupted
        }
        None => SessionEnd::Interrupted,
    };
    info!(
        target: SESSION_TARGET,
        end = ?end,
        "peer session finished"
    );
    Ok(end)
}

fn announce(peer: &MockPeer, config: &Config) {
    match peer.send_heartbeat() {
        Ok(()) => info!(target: SESSION_TARGET, event = "heartbeat", "sent heartbeat"),
        Err(error) => warn!(
            target: SESSION_TARGET,
            error = %error,
            "failed to send heartbeat"
        ),
    }
    if let Some(delay) = config.collision_delay() {
        peer.schedule_collision(delay);
    }
}
