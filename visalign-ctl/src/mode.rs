//! Operator-selected modes, passed into every frame evaluation

use serde::{Deserialize, Serialize};

/// What happens once an object is fully aligned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after one object; wait for an explicit reset
    #[default]
    Single,
    /// Settle, then re-arm for the next object
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeContext {
    /// Rotate the head (rz) into line with the body before x/y
    pub secondary_axis_enabled: bool,
    pub repeat: RepeatMode,
}

impl ModeContext {
    pub fn new(secondary_axis_enabled: bool, repeat: RepeatMode) -> Self {
        Self {
            secondary_axis_enabled,
            repeat,
        }
    }
}

impl Default for ModeContext {
    fn default() -> Self {
        Self::new(true, RepeatMode::Single)
    }
}
