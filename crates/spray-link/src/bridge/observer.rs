//! Structured reporting of events raised by the connected peer.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;

use spray_protocol::{Acknowledgement, CollisionReport, SimulationReport};

use crate::BRIDGE_TARGET;
use crate::receive::ReceiveOutcome;

/// Observer trait used to surface peer events on the host side.
pub trait BridgeObserver: Send + Sync {
    /// A peer connected, replacing any previous one.
    fn peer_connected(&self, peer: SocketAddr);

    /// A peer's receive loop stopped.
    fn peer_disconnected(&self, peer: SocketAddr, outcome: &ReceiveOutcome);

    /// The peer sent a heartbeat; the bridge has already replied.
    fn heartbeat(&self, peer: SocketAddr);

    /// Workpiece load finished.
    fn workpiece_loaded(&self, ack: &Acknowledgement);

    /// Trajectory is displayed.
    fn trajectory_displayed(&self, ack: &Acknowledgement);

    /// Simulation run finished.
    fn simulation_complete(&self, report: &SimulationReport);

    /// Collision reported.
    fn collision_detected(&self, report: &CollisionReport);

    /// Quality estimate received.
    fn quality_prediction(&self, payload: &Value);

    /// Scene click received.
    fn scene_clicked(&self, payload: &Value);

    /// Camera view changed.
    fn camera_view_changed(&self, view_type: &str);

    /// A message the host does not handle arrived.
    fn unexpected(&self, tag: &str);
}

impl<T> BridgeObserver for Arc<T>
where
    T: BridgeObserver + ?Sized,
{
    fn peer_connected(&self, peer: SocketAddr) {
        (**self).peer_connected(peer);
    }

    fn peer_disconnected(&self, peer: SocketAddr, outcome: &ReceiveOutcome) {
        (**self).peer_disconnected(peer, outcome);
    }

    fn heartbeat(&self, peer: SocketAddr) {
        (**self).heartbeat(peer);
    }

    fn workpiece_loaded(&self, ack: &Acknowledgement) {
        (**self).workpiece_loaded(ack);
    }

    fn trajectory_displayed(&self, ack: &Acknowledgement) {
        (**self).trajectory_displayed(ack);
    }

    fn simulation_complete(&self, report: &SimulationReport) {
        (**self).simulation_complete(report);
    }

    fn collision_detected(&self, report: &CollisionReport) {
        (**self).collision_detected(report);
    }

    fn quality_prediction(&self, payload: &Value) {
        (**self).quality_prediction(payload);
    }

    fn scene_clicked(&self, payload: &Value) {
        (**self).scene_clicked(payload);
    }

    fn camera_view_changed(&self, view_type: &str) {
        (**self).camera_view_changed(view_type);
    }

    fn unexpected(&self, tag: &str) {
        (**self).unexpected(tag);
    }
}

/// Default observer that records peer events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredBridgeObserver;

impl StructuredBridgeObserver {
    /// Builds a new observer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BridgeObserver for StructuredBridgeObserver {
    fn peer_connected(&self, peer: SocketAddr) {
        tracing::info!(
            target: BRIDGE_TARGET,
            event = "peer_connected",
            peer = %peer,
            "Unity peer connected"
        );
    }

    fn peer_disconnected(&self, peer: SocketAddr, outcome: &ReceiveOutcome) {
        tracing::info!(
            target: BRIDGE_TARGET,
            event = "peer_disconnected",
            peer = %peer,
            outcome = %outcome,
            "Unity peer disconnected"
        );
    }

    fn heartbeat(&self, peer: SocketAddr) {
        tracing::debug!(
            target: BRIDGE_TARGET,
            event = "heartbeat",
            peer = %peer,
            "heartbeat answered"
        );
    }

    fn workpiece_loaded(&self, ack: &Acknowledgement) {
        tracing::info!(
            target: BRIDGE_TARGET,
            event = "workpiece_loaded",
            success = ack.success,
            message = %ack.message,
            "workpiece loaded"
        );
    }

    fn trajectory_displayed(&self, ack: &Acknowledgement) {
        tracing::info!(
            target: BRIDGE_TARGET,
            event = "trajectory_displayed",
            success = ack.success,
            message = %ack.message,
            "trajectory displayed"
        );
    }

    fn simulation_complete(&self, report: &SimulationReport) {
        tracing::info!(
            target: BRIDGE_TARGET,
            event = "simulation_complete",
            status = %report.status,
            duration = report.duration,
            quality_score = report.quality_score,
            "simulation complete"
        );
    }

    fn collision_detected(&self, report: &CollisionReport) {
        tracing::warn!(
            target: BRIDGE_TARGET,
            event = "collision_detected",
            message = %report.message,
            x = report.position.x,
            y = report.position.y,
            z = report.position.z,
            severity = %report.severity,
            "collision detected"
        );
    }

    fn quality_prediction(&self, payload: &Value) {
        tracing::info!(
            target: BRIDGE_TARGET,
            event = "quality_prediction",
            payload = %payload,
            "quality prediction"
        );
    }

    fn scene_clicked(&self, payload: &Value) {
        tracing::info!(
            target: BRIDGE_TARGET,
            event = "scene_clicked",
            payload = %payload,
            "scene clicked"
        );
    }

    fn camera_view_changed(&self, view_type: &str) {
        tracing::info!(
            target: BRIDGE_TARGET,
            event = "camera_view_changed",
            view_type,
            "camera view changed"
        );
    }

    fn unexpected(&self, tag: &str) {
        tracing::warn!(
            target: BRIDGE_TARGET,
            event = "unexpected_message",
            tag,
            "unhandled message type"
        );
    }
}
