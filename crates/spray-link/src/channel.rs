//! TCP line channel: connect, send, receive, disconnect.
//!
//! One [`LineChannel`] owns one connection. The write half sits behind a
//! mutex shared by every [`MessageSender`] clone so records from the receive
//! thread and the scheduler never interleave. The read half moves to the
//! receive thread when [`LineChannel::start_receiving`] is called.

use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use spray_config::{Config, DEFAULT_MAX_LINE_BYTES, PeerEndpoint};
use spray_protocol::{ControlMessage, LineFramer, Message};

use crate::CHANNEL_TARGET;
use crate::errors::ChannelError;
use crate::receive::{MessageHandler, receive_loop};

/// Connection bounds applied to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Bound on the TCP connect; `None` leaves it to the OS.
    pub connect_timeout: Option<Duration>,
    /// Read poll interval; `None` blocks until data or close.
    pub read_timeout: Option<Duration>,
    /// Longest accepted inbound record.
    pub max_line_bytes: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            read_timeout: None,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl ChannelOptions {
    /// Reads the channel bounds from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            max_line_bytes: config.max_line_bytes(),
        }
    }
}

/// Cloneable write handle onto a channel.
#[derive(Debug, Clone)]
pub struct MessageSender {
    writer: Arc<Mutex<Option<TcpStream>>>,
    connected: Arc<AtomicBool>,
}

impl MessageSender {
    /// Whether the owning channel is still connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Encodes, stamps, and writes a typed message.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotConnected`] after disconnect,
    /// [`ChannelError::Write`] when the socket write fails, and
    /// [`ChannelError::Protocol`] when the message cannot be encoded.
    pub fn send(&self, message: &Message) -> Result<(), ChannelError> {
        self.send_record(message.encode()?)
    }

    /// Stamps and writes a raw record.
    ///
    /// The whole line is written under the writer lock. A failed write marks
    /// the channel disconnected.
    ///
    /// # Errors
    ///
    /// As for [`Self::send`].
    pub fn send_record(&self, record: ControlMessage) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        let record = record.stamped_now();
        let line = record.to_line()?;

        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(stream) = guard.as_mut() else {
            return Err(ChannelError::NotConnected);
        };
        if let Err(source) = stream.write_all(&line).and_then(|()| stream.flush()) {
            self.connected.store(false, Ordering::SeqCst);
            return Err(ChannelError::Write { source });
        }
        debug!(
            target: CHANNEL_TARGET,
            tag = record.tag(),
            bytes = line.len(),
            "sent message"
        );
        Ok(())
    }
}

/// A connected line-delimited JSON channel.
#[derive(Debug)]
pub struct LineChannel {
    peer: String,
    options: ChannelOptions,
    reader: Option<TcpStream>,
    sender: MessageSender,
    receiver: Option<thread::JoinHandle<()>>,
}

impl LineChannel {
    /// Opens a TCP connection to `endpoint`. No retry is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Resolve`] or [`ChannelError::Connect`] when
    /// the peer is unreachable, and [`ChannelError::Configure`] when socket
    /// options cannot be applied.
    pub fn connect(endpoint: &PeerEndpoint, options: ChannelOptions) -> Result<Self, ChannelError> {
        let label = endpoint.to_string();
        let address = endpoint.resolve().map_err(|source| ChannelError::Resolve {
            endpoint: label.clone(),
            source,
        })?;
        let stream = match options.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&address, timeout),
            None => TcpStream::connect(address),
        }
        .map_err(|source| ChannelError::Connect {
            endpoint: label.clone(),
            source,
        })?;
        info!(
            target: CHANNEL_TARGET,
            endpoint = %label,
            "connected to peer"
        );
        Self::from_stream(stream, label, options)
    }

    /// Wraps an already connected stream, such as one accepted by a listener.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Configure`] if the read timeout cannot be set
    /// or the stream cannot be cloned for writing.
    pub fn from_stream(
        stream: TcpStream,
        peer: impl Into<String>,
        options: ChannelOptions,
    ) -> Result<Self, ChannelError> {
        stream
            .set_read_timeout(options.read_timeout)
            .map_err(|source| ChannelError::Configure { source })?;
        let writer = stream
            .try_clone()
            .map_err(|source| ChannelError::Configure { source })?;
        Ok(Self {
            peer: peer.into(),
            options,
            reader: Some(stream),
            sender: MessageSender {
                writer: Arc::new(Mutex::new(Some(writer))),
                connected: Arc::new(AtomicBool::new(true)),
            },
            receiver: None,
        })
    }

    /// Label of the remote end, used in log events.
    #[must_use]
    pub fn peer(&self) -> &str {
        self.peer.as_str()
    }

    /// Whether the channel is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    /// A write handle that can be moved to other threads.
    #[must_use]
    pub fn sender(&self) -> MessageSender {
        self.sender.clone()
    }

    /// Sends a message; see [`MessageSender::send`].
    ///
    /// # Errors
    ///
    /// As for [`MessageSender::send`].
    pub fn send(&self, message: &Message) -> Result<(), ChannelError> {
        self.sender.send(message)
    }

    /// Starts the receive thread, handing each decoded message to `handler`.
    ///
    /// The connected flag is cleared when the loop exits for any reason.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::AlreadyReceiving`] on a second call or after
    /// disconnect, and [`ChannelError::Spawn`] if the thread cannot start.
    pub fn start_receiving<H>(&mut self, handler: H) -> Result<(), ChannelError>
    where
        H: MessageHandler,
    {
        let Some(mut reader) = self.reader.take() else {
            return Err(ChannelError::AlreadyReceiving);
        };
        let connected = Arc::clone(&self.sender.connected);
        let framer = LineFramer::new(self.options.max_line_bytes);
        let peer = self.peer.clone();
        let mut handler = handler;

        let receiver = thread::Builder::new()
            .name(String::from("spray-receive"))
            .spawn(move || {
                let outcome = receive_loop(&mut reader, framer, &connected, &mut handler);
                connected.store(false, Ordering::SeqCst);
                info!(
                    target: CHANNEL_TARGET,
                    peer = %peer,
                    outcome = %outcome,
                    "receive loop stopped"
                );
                handler.closed(&outcome);
            })
            .map_err(|source| ChannelError::Spawn { source })?;
        self.receiver = Some(receiver);
        Ok(())
    }

    /// Marks the channel disconnected, shuts the socket down so a blocked
    /// read returns, and joins the receive thread.
    ///
    /// Must not be called from inside a [`MessageHandler`]. Calling it twice
    /// is harmless.
    pub fn disconnect(&mut self) {
        let was_connected = self.sender.connected.swap(false, Ordering::SeqCst);
        let writer = self
            .sender
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(stream) = writer {
            // The peer may already have gone; nothing to report then.
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.reader = None;
        if let Some(receiver) = self.receiver.take()
            && receiver.join().is_err()
        {
            warn!(
                target: CHANNEL_TARGET,
                peer = %self.peer,
                "receive thread panicked"
            );
        }
        if was_connected {
            info!(
                target: CHANNEL_TARGET,
                peer = %self.peer,
                "disconnected"
            );
        }
    }
}

impl Drop for LineChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}
