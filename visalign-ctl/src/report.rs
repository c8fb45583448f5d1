//! Per-frame status reported back to the operator surface

use crate::mode::RepeatMode;
use serde::Serialize;
use visalign_core::{Axis, AxisError, Command};

/// What the controller did with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrameOutcome {
    /// No primary detection this frame
    NoTarget,
    /// Nothing to correct: locked, already aligned, or waiting for the head
    Idle,
    /// A correction was due but the link is down
    LinkDown,
    /// Head rotation command sent
    Rotating,
    /// Head lined up with the body; x/y correction unlocked
    SecondarySettled,
    /// Rotation mode switched off mid-cycle; rz correction dropped
    SecondaryAbandoned,
    /// Directional command sent on one axis
    Correcting(Axis),
    /// Both axes centered
    CycleComplete(RepeatMode),
    /// A send was attempted and failed; state left untouched
    SendFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub primary_error: Option<AxisError>,
    pub secondary_error: Option<AxisError>,
    /// Commands delivered this frame, in order
    pub sent: Vec<Command>,
    pub outcome: FrameOutcome,
    pub link_connected: bool,
}

impl FrameReport {
    pub(crate) fn new(link_connected: bool) -> Self {
        Self {
            primary_error: None,
            secondary_error: None,
            sent: Vec::new(),
            outcome: FrameOutcome::Idle,
            link_connected,
        }
    }

    /// `X: .. Y: .. rx: .. ry: ..`, with `-` for unknown values
    pub fn status_line(&self) -> String {
        fn show(value: Option<i32>) -> String {
            value.map_or_else(|| "-".to_string(), |v| v.to_string())
        }

        format!(
            "X: {}   Y: {}   rx: {}   ry: {}",
            show(self.primary_error.map(|e| e.x)),
            show(self.primary_error.map(|e| e.y)),
            show(self.secondary_error.map(|e| e.x)),
            show(self.secondary_error.map(|e| e.y)),
        )
    }
}
