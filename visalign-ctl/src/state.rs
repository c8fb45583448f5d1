//! Alignment state flags

use serde::Serialize;

/// Flags owned by the alignment controller.
///
/// `position_locked` blocks x/y correction. It is raised when both axes
/// settle inside the dead band, or by a reset while the head is being
/// lined up, and lowered once the head settles (or rz handling is
/// switched off). `aligned_once` marks a finished single-mode cycle and is
/// only cleared by a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlignmentState {
    pub adjusting_secondary: bool,
    pub position_locked: bool,
    pub aligned_once: bool,
}

impl AlignmentState {
    /// Armed for a fresh cycle
    pub fn armed() -> Self {
        Self {
            adjusting_secondary: true,
            position_locked: true,
            aligned_once: false,
        }
    }

    /// Whether x/y correction may run this frame
    pub fn correcting_position(&self) -> bool {
        !self.position_locked && !self.aligned_once
    }
}

impl Default for AlignmentState {
    /// Idle until the operator arms the first cycle
    fn default() -> Self {
        Self {
            adjusting_secondary: false,
            position_locked: true,
            aligned_once: false,
        }
    }
}
