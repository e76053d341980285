//! Behavioural coverage for a mock peer driven by the host bridge.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Value, json};

use spray_config::{Config, PeerEndpoint};
use spray_link::{
    BridgeHandle, BridgeObserver, ChannelOptions, HostBridge, ReceiveOutcome, SessionEnd,
    SessionError, ShutdownError, ShutdownSignal, run_peer_session,
};
use spray_protocol::{
    Acknowledgement, CollisionReport, CommandRequest, SimulationCommand, SimulationReport,
};

const SETTLE: Duration = Duration::from_millis(400);

#[derive(Default)]
struct Counters {
    heartbeats: AtomicUsize,
    workpieces_loaded: AtomicUsize,
    completions: AtomicUsize,
}

impl BridgeObserver for Counters {
    fn peer_connected(&self, _peer: SocketAddr) {}

    fn peer_disconnected(&self, _peer: SocketAddr, _outcome: &ReceiveOutcome) {}

    fn heartbeat(&self, _peer: SocketAddr) {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
    }

    fn workpiece_loaded(&self, ack: &Acknowledgement) {
        if ack.success {
            self.workpieces_loaded.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn trajectory_displayed(&self, _ack: &Acknowledgement) {}

    fn simulation_complete(&self, report: &SimulationReport) {
        if report.status == "completed" {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn collision_detected(&self, _report: &CollisionReport) {}

    fn quality_prediction(&self, _payload: &Value) {}

    fn scene_clicked(&self, _payload: &Value) {}

    fn camera_view_changed(&self, _view_type: &str) {}

    fn unexpected(&self, _tag: &str) {}
}

/// Shutdown signal released when the world is torn down.
struct TeardownSignal {
    released: Mutex<mpsc::Receiver<()>>,
}

impl ShutdownSignal for TeardownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        if let Ok(released) = self.released.lock() {
            let _ = released.recv();
        }
        Ok(())
    }
}

struct World {
    bridge: Option<BridgeHandle>,
    counters: Arc<Counters>,
    release: Option<mpsc::Sender<()>>,
    session: Option<thread::JoinHandle<Result<SessionEnd, SessionError>>>,
}

impl World {
    fn new() -> Self {
        Self {
            bridge: None,
            counters: Arc::new(Counters::default()),
            release: None,
            session: None,
        }
    }

    fn bridge(&self) -> &BridgeHandle {
        match self.bridge.as_ref() {
            Some(bridge) => bridge,
            None => panic!("bridge is not running"),
        }
    }

    fn start_bridge(&mut self) {
        let bridge = HostBridge::bind(&PeerEndpoint::tcp("127.0.0.1", 0), ChannelOptions::default())
            .unwrap_or_else(|error| panic!("bind bridge: {error}"));
        let handle = bridge
            .start(Arc::clone(&self.counters))
            .unwrap_or_else(|error| panic!("start bridge: {error}"));
        self.bridge = Some(handle);
    }

    fn start_peer(&mut self) {
        let port = self.bridge().local_addr().port();
        let config = Config {
            endpoint: PeerEndpoint::tcp("127.0.0.1", port),
            startup_delay_ms: 10,
            workpiece_latency_ms: 20,
            trajectory_latency_ms: 20,
            simulation_duration_ms: 50,
            ..Config::default()
        };
        let (release, released) = mpsc::channel();
        let signal = Arc::new(TeardownSignal {
            released: Mutex::new(released),
        });
        self.release = Some(release);
        self.session = Some(thread::spawn(move || run_peer_session(&config, signal)));
    }

    fn wait_for(&self, counter: &AtomicUsize, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if counter.load(Ordering::SeqCst) >= expected {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.release = None;
        if let Some(session) = self.session.take() {
            let _ = session.join();
        }
        if let Some(bridge) = self.bridge.take() {
            bridge.shutdown();
            let _ = bridge.join();
        }
    }
}

#[fixture]
fn world() -> RefCell<World> {
    RefCell::new(World::new())
}

#[given("a host bridge is listening")]
fn given_bridge(world: &RefCell<World>) {
    world.borrow_mut().start_bridge();
}

#[given("a mock peer is connected")]
fn given_peer(world: &RefCell<World>) {
    world.borrow_mut().start_peer();
    let world = world.borrow();
    assert!(
        world.wait_for(&world.counters.heartbeats, 1),
        "peer never announced itself"
    );
}

#[when("a mock peer connects")]
fn when_peer_connects(world: &RefCell<World>) {
    world.borrow_mut().start_peer();
}

#[when("the host sends workpiece data")]
fn when_workpiece_sent(world: &RefCell<World>) {
    world
        .borrow()
        .bridge()
        .send_workpiece_data(json!({"name": "door panel", "thickness": 2.0}))
        .unwrap_or_else(|error| panic!("send workpiece: {error}"));
}

#[when("the host sends the simulation command \"{command}\"")]
fn when_simulation_command(world: &RefCell<World>, command: String) {
    world
        .borrow()
        .bridge()
        .send_simulation_command(CommandRequest::new(SimulationCommand::parse(&command)))
        .unwrap_or_else(|error| panic!("send {command}: {error}"));
}

#[then("the host observes a heartbeat")]
fn then_heartbeat(world: &RefCell<World>) {
    let world = world.borrow();
    assert!(world.wait_for(&world.counters.heartbeats, 1), "no heartbeat");
}

#[then("the host observes {count} successful workpiece load")]
fn then_workpiece_loaded(world: &RefCell<World>, count: usize) {
    let world = world.borrow();
    assert!(world.wait_for(&world.counters.workpieces_loaded, count));
    thread::sleep(SETTLE);
    assert_eq!(world.counters.workpieces_loaded.load(Ordering::SeqCst), count);
}

#[then("the host observes {count} simulation completion")]
fn then_completion_singular(world: &RefCell<World>, count: usize) {
    assert_completions(world, count);
}

#[then("the host observes {count} simulation completions")]
fn then_completion_plural(world: &RefCell<World>, count: usize) {
    assert_completions(world, count);
}

fn assert_completions(world: &RefCell<World>, count: usize) {
    let world = world.borrow();
    assert!(world.wait_for(&world.counters.completions, count));
    thread::sleep(SETTLE);
    assert_eq!(
        world.counters.completions.load(Ordering::SeqCst),
        count,
        "unexpected number of simulation completions"
    );
}

#[scenario(path = "tests/features/peer_bridge.feature")]
fn peer_bridge(#[from(world)] world: RefCell<World>) {
    drop(world);
}
