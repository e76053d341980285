//! Host side of the control channel.
//!
//! The bridge listens where the host application would, accepts one peer at
//! a time (a new connection replaces the old one), answers heartbeats, and
//! reports everything else to a [`BridgeObserver`]. It exists so the mock
//! peer can be driven end to end without the real host.

mod console;
mod observer;

use std::io::{self, BufRead};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use spray_config::{Config, PeerEndpoint};
use spray_protocol::{CommandRequest, Message, SimulationCommand};

pub use self::console::{ConsoleError, parse_console_line};
pub use self::observer::{BridgeObserver, StructuredBridgeObserver};

use crate::BRIDGE_TARGET;
use crate::channel::{ChannelOptions, LineChannel, MessageSender};
use crate::errors::{BridgeError, ChannelError};
use crate::receive::{MessageHandler, ReceiveOutcome};
use crate::shutdown::{ShutdownError, ShutdownSignal};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

type CurrentPeer = Arc<Mutex<Option<LineChannel>>>;

/// A bound, not yet accepting, host bridge.
#[derive(Debug)]
pub struct HostBridge {
    endpoint: PeerEndpoint,
    listener: TcpListener,
    options: ChannelOptions,
}

impl HostBridge {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Resolve`] or [`BridgeError::Bind`].
    pub fn bind(endpoint: &PeerEndpoint, options: ChannelOptions) -> Result<Self, BridgeError> {
        let addr = endpoint.resolve().map_err(|source| BridgeError::Resolve {
            host: endpoint.host().to_owned(),
            port: endpoint.port(),
            source,
        })?;
        let listener =
            TcpListener::bind(addr).map_err(|source| BridgeError::Bind { addr, source })?;
        Ok(Self {
            endpoint: endpoint.clone(),
            listener,
            options,
        })
    }

    /// Address actually bound, useful when the configured port is zero.
    ///
    /// # Errors
    ///
    /// Returns the socket error if the address cannot be read.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Starts accepting peers on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NonBlocking`] or [`BridgeError::Spawn`].
    pub fn start<O>(self, observer: O) -> Result<BridgeHandle, BridgeError>
    where
        O: BridgeObserver + 'static,
    {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| BridgeError::NonBlocking { source })?;
        let local_addr = self
            .listener
            .local_addr()
            .map_err(|source| BridgeError::NonBlocking { source })?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let current: CurrentPeer = Arc::new(Mutex::new(None));

        let accept = {
            let shutdown = Arc::clone(&shutdown);
            let current = Arc::clone(&current);
            let observer: Arc<dyn BridgeObserver> = Arc::new(observer);
            thread::Builder::new()
                .name(String::from("spray-bridge-accept"))
                .spawn(move || run_accept_loop(&self, &shutdown, &current, &observer))
                .map_err(|source| BridgeError::Spawn { source })?
        };

        Ok(BridgeHandle {
            local_addr,
            shutdown,
            current,
            accept: Some(accept),
        })
    }
}

/// Handle to a running bridge.
#[derive(Debug)]
pub struct BridgeHandle {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    current: CurrentPeer,
    accept: Option<thread::JoinHandle<()>>,
}

impl BridgeHandle {
    /// Address the bridge is listening on.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether a peer is currently connected.
    #[must_use]
    pub fn is_peer_connected(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(LineChannel::is_connected)
    }

    /// Sends a message to the connected peer.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::NotConnected`] when no peer is attached, or
    /// the channel's send error.
    pub fn send(&self, message: &Message) -> Result<(), ChannelError> {
        let sender = self.current_sender().ok_or(ChannelError::NotConnected)?;
        sender.send(message)
    }

    /// Sends a workpiece description.
    ///
    /// # Errors
    ///
    /// As for [`Self::send`].
    pub fn send_workpiece_data(&self, payload: Value) -> Result<(), ChannelError> {
        self.send(&Message::WorkpieceData(payload))
    }

    /// Sends a trajectory description.
    ///
    /// # Errors
    ///
    /// As for [`Self::send`].
    pub fn send_trajectory_data(&self, payload: Value) -> Result<(), ChannelError> {
        self.send(&Message::TrajectoryData(payload))
    }

    /// Sends a simulation command.
    ///
    /// # Errors
    ///
    /// As for [`Self::send`].
    pub fn send_simulation_command(
        &self,
        request: CommandRequest<SimulationCommand>,
    ) -> Result<(), ChannelError> {
        self.send(&Message::SimulationCommand(request))
    }

    /// Sends a camera command.
    ///
    /// # Errors
    ///
    /// As for [`Self::send`].
    pub fn send_camera_command(&self, request: CommandRequest<String>) -> Result<(), ChannelError> {
        self.send(&Message::CameraCommand(request))
    }

    /// Asks the accept thread to stop; the current peer is disconnected.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept thread to finish.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ThreadPanic`] if the accept thread panicked.
    pub fn join(mut self) -> Result<(), BridgeError> {
        match self.accept.take() {
            Some(accept) => accept.join().map_err(|_| BridgeError::ThreadPanic),
            None => Ok(()),
        }
    }

    fn current_sender(&self) -> Option<MessageSender> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(LineChannel::sender)
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_accept_loop(
    bridge: &HostBridge,
    shutdown: &AtomicBool,
    current: &CurrentPeer,
    observer: &Arc<dyn BridgeObserver>,
) {
    info!(
        target: BRIDGE_TARGET,
        endpoint = %bridge.endpoint,
        "host bridge listening"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match bridge.listener.accept() {
            Ok((stream, peer)) => {
                last_error = None;
                attach_peer(stream, peer, bridge.options, current, observer);
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: BRIDGE_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    let remaining = current
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(mut channel) = remaining {
        channel.disconnect();
    }
    info!(target: BRIDGE_TARGET, "host bridge stopped");
}

fn attach_peer(
    stream: TcpStream,
    peer: SocketAddr,
    options: ChannelOptions,
    current: &CurrentPeer,
    observer: &Arc<dyn BridgeObserver>,
) {
    let attached = stream
        .set_nonblocking(false)
        .map_err(|source| ChannelError::Configure { source })
        .and_then(|()| LineChannel::from_stream(stream, peer.to_string(), options));
    let mut channel = match attached {
        Ok(channel) => channel,
        Err(error) => {
            warn!(
                target: BRIDGE_TARGET,
                peer = %peer,
                error = %error,
                "failed to attach peer"
            );
            return;
        }
    };

    let previous = current
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(mut previous) = previous {
        info!(
            target: BRIDGE_TARGET,
            previous = previous.peer(),
            peer = %peer,
            "replacing connected peer"
        );
        previous.disconnect();
    }

    observer.peer_connected(peer);
    let handler = BridgeHandler {
        peer,
        sender: channel.sender(),
        observer: Arc::clone(observer),
    };
    if let Err(error) = channel.start_receiving(handler) {
        warn!(
            target: BRIDGE_TARGET,
            peer = %peer,
            error = %error,
            "failed to start receiving from peer"
        );
        return;
    }
    *current.lock().unwrap_or_else(PoisonError::into_inner) = Some(channel);
}

/// Routes one peer's messages to the observer.
struct BridgeHandler {
    peer: SocketAddr,
    sender: MessageSender,
    observer: Arc<dyn BridgeObserver>,
}

impl MessageHandler for BridgeHandler {
    fn handle(&mut self, message: Message) {
        match message {
            Message::Heartbeat => {
                if let Err(error) = self.sender.send(&Message::HeartbeatResponse) {
                    warn!(
                        target: BRIDGE_TARGET,
                        error = %error,
                        "failed to answer heartbeat"
                    );
                }
                self.observer.heartbeat(self.peer);
            }
            Message::WorkpieceLoaded(ack) => self.observer.workpiece_loaded(&ack),
            Message::TrajectoryDisplayed(ack) => self.observer.trajectory_displayed(&ack),
            Message::SimulationComplete(report) => self.observer.simulation_complete(&report),
            Message::CollisionDetected(report) => self.observer.collision_detected(&report),
            Message::QualityPrediction(payload) => self.observer.quality_prediction(&payload),
            Message::SceneClicked(payload) => self.observer.scene_clicked(&payload),
            Message::CameraViewChanged { view_type } => {
                self.observer.camera_view_changed(&view_type);
            }
            other => self.observer.unexpected(other.tag()),
        }
    }

    fn closed(&mut self, outcome: &ReceiveOutcome) {
        self.observer.peer_disconnected(self.peer, outcome);
    }
}

enum BridgeEvent {
    Line(String),
    ConsoleClosed,
    Shutdown(Result<(), ShutdownError>),
}

/// Runs the bridge until `shutdown` fires, sending each console line to
/// the connected peer.
///
/// Console problems and sends without a peer are logged; they never stop
/// the bridge.
///
/// # Errors
///
/// Returns [`BridgeError`] when the bridge cannot bind or start, or when the
/// shutdown listener fails.
pub fn run_bridge<R>(
    config: &Config,
    shutdown: Arc<dyn ShutdownSignal>,
    console: R,
) -> Result<(), BridgeError>
where
    R: BufRead + Send + 'static,
{
    let bridge = HostBridge::bind(config.endpoint(), ChannelOptions::from_config(config))?;
    let handle = bridge.start(StructuredBridgeObserver::new())?;

    let (events_tx, events) = mpsc::channel();
    let console_tx = events_tx.clone();
    thread::Builder::new()
        .name(String::from("spray-bridge-console"))
        .spawn(move || {
            for line in console.lines() {
                let Ok(line) = line else { break };
                if console_tx.send(BridgeEvent::Line(line)).is_err() {
                    return;
                }
            }
            let _ = console_tx.send(BridgeEvent::ConsoleClosed);
        })
        .map_err(|source| BridgeError::Spawn { source })?;
    thread::Builder::new()
        .name(String::from("spray-shutdown"))
        .spawn(move || {
            let _ = events_tx.send(BridgeEvent::Shutdown(shutdown.wait()));
        })
        .map_err(|source| BridgeError::Spawn { source })?;

    let mut outcome = Ok(());
    for event in &events {
        match event {
            BridgeEvent::Line(line) => run_console_line(&handle, &line),
            BridgeEvent::ConsoleClosed => {
                info!(target: BRIDGE_TARGET, "console closed; waiting for shutdown signal");
            }
            BridgeEvent::Shutdown(result) => {
                if let Err(error) = result {
                    outcome = Err(BridgeError::Shutdown(error));
                }
                break;
            }
        }
    }

    handle.shutdown();
    handle.join().and(outcome)
}

fn run_console_line(handle: &BridgeHandle, line: &str) {
    let message = match parse_console_line(line) {
        Ok(Some(message)) => message,
        Ok(None) => return,
        Err(error) => {
            warn!(target: BRIDGE_TARGET, error = %error, "ignoring console line");
            return;
        }
    };
    match handle.send(&message) {
        Ok(()) => info!(
            target: BRIDGE_TARGET,
            tag = message.tag(),
            "sent message to peer"
        ),
        Err(error) => warn!(
            target: BRIDGE_TARGET,
            tag = message.tag(),
            error = %error,
            "failed to send message to peer"
        ),
    }
}
