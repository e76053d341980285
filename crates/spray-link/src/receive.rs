//! The receive loop: read, frame, decode, dispatch.

use std::fmt;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use spray_protocol::{Frame, LineFramer, Message, decode_line};

use crate::CHANNEL_TARGET;

const READ_CHUNK_BYTES: usize = 4096;

/// Receives decoded messages in stream order.
///
/// Handlers run on the receive thread, so slow work belongs on the
/// [`crate::Scheduler`].
pub trait MessageHandler: Send + 'static {
    /// Handles one inbound message.
    fn handle(&mut self, message: Message);

    /// Invoked once after the loop has exited.
    fn closed(&mut self, _outcome: &ReceiveOutcome) {}
}

/// Why a receive loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// The remote end closed the stream.
    PeerClosed,
    /// The channel was disconnected locally.
    Disconnected,
    /// A read failed.
    Failed {
        /// Kind of the read error.
        kind: io::ErrorKind,
        /// Rendered read error.
        message: String,
    },
}

impl fmt::Display for ReceiveOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => formatter.write_str("peer closed the connection"),
            Self::Disconnected => formatter.write_str("disconnected"),
            Self::Failed { message, .. } => write!(formatter, "read failed: {message}"),
        }
    }
}

/// Reads until the stream ends, the `connected` flag drops, or a read fails.
///
/// Timeouts from a configured read timeout only re-check `connected`.
/// Records that fail to parse or decode are logged and skipped.
pub(crate) fn receive_loop<R, H>(
    reader: &mut R,
    mut framer: LineFramer,
    connected: &AtomicBool,
    handler: &mut H,
) -> ReceiveOutcome
where
    R: Read + ?Sized,
    H: MessageHandler + ?Sized,
{
    let mut chunk = [0_u8; READ_CHUNK_BYTES];
    loop {
        if !connected.load(Ordering::SeqCst) {
            return ReceiveOutcome::Disconnected;
        }
        match reader.read(&mut chunk) {
            Ok(0) => {
                let tail = framer.finish();
                if tail > 0 {
                    debug!(
                        target: CHANNEL_TARGET,
                        bytes = tail,
                        "dropping unterminated record at end of stream"
                    );
                }
                return if connected.load(Ordering::SeqCst) {
                    ReceiveOutcome::PeerClosed
                } else {
                    ReceiveOutcome::Disconnected
                };
            }
            Ok(read) => {
                for frame in framer.push(&chunk[..read]) {
                    dispatch_frame(frame, handler);
                }
            }
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) => {}
            Err(error) => {
                if !connected.load(Ordering::SeqCst) {
                    return ReceiveOutcome::Disconnected;
                }
                return ReceiveOutcome::Failed {
                    kind: error.kind(),
                    message: error.to_string(),
                };
            }
        }
    }
}

fn dispatch_frame<H>(frame: Frame, handler: &mut H)
where
    H: MessageHandler + ?Sized,
{
    match frame {
        Frame::Line(line) => match decode_line(&line) {
            Ok(message) => {
                debug!(
                    target: CHANNEL_TARGET,
                    tag = message.tag(),
                    "received message"
                );
                handler.handle(message);
            }
            Err(error) => {
                warn!(
                    target: CHANNEL_TARGET,
                    error = %error,
                    "discarding unreadable record"
                );
            }
        },
        Frame::Oversized { discarded } => {
            warn!(
                target: CHANNEL_TARGET,
                bytes = discarded,
                "discarding record over the line limit"
            );
        }
    }
}
