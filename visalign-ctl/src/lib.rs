//! visalign-ctl: closed-loop alignment controller
//!
//! Provides:
//! - Per-frame evaluation of primary/secondary detections
//! - Explicit alignment state machine with single and continuous modes
//! - Frame reports for the operator surface

pub mod mode;
pub mod state;
pub mod report;
pub mod controller;

pub use mode::{ModeContext, RepeatMode};
pub use state::AlignmentState;
pub use report::{FrameOutcome, FrameReport};
pub use controller::{AlignmentController, ControllerConfig, FrameObservation};
