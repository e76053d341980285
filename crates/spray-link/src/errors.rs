//! Error types for the control channel, scheduler, and host bridge.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use spray_protocol::ProtocolError;

use crate::shutdown::ShutdownError;

/// Errors surfaced by a [`crate::LineChannel`] and its senders.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Endpoint host did not resolve.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        /// Endpoint as configured.
        endpoint: String,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// TCP connect failed or timed out.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint as configured.
        endpoint: String,
        /// Connect error.
        #[source]
        source: io::Error,
    },
    /// Socket option or stream clone failed after connecting.
    #[error("failed to configure socket: {source}")]
    Configure {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The channel is not connected.
    #[error("channel is not connected")]
    NotConnected,
    /// The receive thread was already started.
    #[error("receive loop already running")]
    AlreadyReceiving,
    /// Writing a record failed; the channel is now disconnected.
    #[error("failed to write record: {source}")]
    Write {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Spawning the receive thread failed.
    #[error("failed to spawn receive thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors surfaced by the deferred task scheduler.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Spawning the worker thread failed.
    #[error("failed to spawn scheduler worker: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The worker has stopped and accepts no more tasks.
    #[error("scheduler worker has stopped")]
    Stopped,
}

/// Errors surfaced while binding or running the host bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Endpoint host did not resolve.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// Bind failed, typically because the port is in use.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// Switching the listener to non-blocking mode failed.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Spawning the accept thread failed.
    #[error("failed to spawn accept thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The shutdown listener failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// The accept thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}
