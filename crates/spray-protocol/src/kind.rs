//! Message-type tags understood by both ends of the channel.

use std::fmt;

/// Known values of the `type` tag.
///
/// Tags outside this set are still valid records; they decode to
/// [`crate::Message::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Host → peer: workpiece geometry description.
    WorkpieceData,
    /// Host → peer: spray trajectory description.
    TrajectoryData,
    /// Host → peer: simulation control command.
    SimulationCommand,
    /// Host → peer: camera control command.
    CameraCommand,
    /// Peer → host liveness probe.
    Heartbeat,
    /// Host → peer reply to a heartbeat.
    HeartbeatResponse,
    /// Peer → host: workpiece loading finished.
    WorkpieceLoaded,
    /// Peer → host: trajectory is on screen.
    TrajectoryDisplayed,
    /// Peer → host: simulation run finished.
    SimulationComplete,
    /// Peer → host: the spray gun hit something.
    CollisionDetected,
    /// Peer → host: coating quality estimate.
    QualityPrediction,
    /// Peer → host: user clicked the scene.
    SceneClicked,
    /// Peer → host: active camera view changed.
    CameraViewChanged,
}

impl MessageKind {
    /// Every known kind, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::WorkpieceData,
        Self::TrajectoryData,
        Self::SimulationCommand,
        Self::CameraCommand,
        Self::Heartbeat,
        Self::HeartbeatResponse,
        Self::WorkpieceLoaded,
        Self::TrajectoryDisplayed,
        Self::SimulationComplete,
        Self::CollisionDetected,
        Self::QualityPrediction,
        Self::SceneClicked,
        Self::CameraViewChanged,
    ];

    /// Parses a wire tag. Matching is exact; tags are case-sensitive.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Returns the wire tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorkpieceData => "workpiece_data",
            Self::TrajectoryData => "trajectory_data",
            Self::SimulationCommand => "simulation_command",
            Self::CameraCommand => "camera_command",
            Self::Heartbeat => "heartbeat",
            Self::HeartbeatResponse => "heartbeat_response",
            Self::WorkpieceLoaded => "workpiece_loaded",
            Self::TrajectoryDisplayed => "trajectory_displayed",
            Self::SimulationComplete => "simulation_complete",
            Self::CollisionDetected => "collision_detected",
            Self::QualityPrediction => "quality_prediction",
            Self::SceneClicked => "scene_clicked",
            Self::CameraViewChanged => "camera_view_changed",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_its_tag() {
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn tags_are_case_sensitive() {
        assert_eq!(MessageKind::parse("Heartbeat"), None);
        assert_eq!(MessageKind::parse("heartbeat"), Some(MessageKind::Heartbeat));
    }
}
