//! visalign-core: shared vocabulary for visual robot alignment
//!
//! Provides:
//! - Wire command tokens
//! - Detections and image-space error
//! - Direction rule tables mapping pixel error to commands
//! - Robot and tracking configuration

pub mod error;
pub mod command;
pub mod detection;
pub mod rules;
pub mod config;

pub use error::{Error, Result};
pub use command::{Axis, Command};
pub use detection::{select_closest, AxisError, BoundingBox, Detection, FrameSize, LabeledBox};
pub use rules::{DirectionRule, RuleTable};
pub use config::{ConfigFormat, Endpoint, RobotConfig, SettleDelays};
