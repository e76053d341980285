//! Control channel between the spray-painting host and a mock Unity client.
//!
//! [`LineChannel`] carries newline-delimited JSON records over TCP. On top of
//! it sit the two ends of the conversation:
//!
//! - [`MockPeer`] and [`run_peer_session`] play the Unity client, answering
//!   host commands with scripted replies after simulated latencies;
//! - [`HostBridge`] and [`run_bridge`] play the host, answering heartbeats
//!   and reporting peer events to a [`BridgeObserver`].
//!
//! Delayed replies run on a [`Scheduler`] worker, never on the receive
//! thread, and every pending reply can be cancelled.

mod bridge;
mod channel;
mod errors;
mod peer;
mod receive;
mod schedule;
mod session;
mod shutdown;

pub use bridge::{
    BridgeHandle, BridgeObserver, ConsoleError, HostBridge, StructuredBridgeObserver,
    parse_console_line, run_bridge,
};
pub use channel::{ChannelOptions, LineChannel, MessageSender};
pub use errors::{BridgeError, ChannelError, ScheduleError};
pub use peer::{MockPeer, PeerHandler, PeerTimings, SIMULATED_QUALITY_SCORE};
pub use receive::{MessageHandler, ReceiveOutcome};
pub use schedule::{Scheduler, TaskHandle};
pub use session::{SessionEnd, SessionError, run_peer_session};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

/// Tracing target for channel IO.
pub(crate) const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");
/// Tracing target for the mock peer.
pub(crate) const PEER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::peer");
/// Tracing target for the host bridge.
pub(crate) const BRIDGE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bridge");
/// Tracing target for the deferred task scheduler.
pub(crate) const SCHEDULE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::schedule");
/// Tracing target for session lifecycle.
pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");
