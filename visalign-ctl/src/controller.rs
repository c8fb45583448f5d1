//! Alignment controller
//!
//! Converts the primary object's image-space error into one directional
//! command per frame, after first rotating the head (rz) into line with
//! the body when that mode is on. Only one axis is corrected at a time:
//! x until it reaches its dead band, then y.

use crate::mode::{ModeContext, RepeatMode};
use crate::report::{FrameOutcome, FrameReport};
use crate::state::AlignmentState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use visalign_core::{Axis, Command, Detection, FrameSize, RobotConfig, RuleTable, SettleDelays};
use visalign_link::RobotLink;

/// Controller tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Allowed vertical offset between head and body, in pixels
    pub head_tolerance_px: i32,
    pub settle: SettleDelays,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            head_tolerance_px: 1,
            settle: SettleDelays::default(),
        }
    }
}

impl From<&RobotConfig> for ControllerConfig {
    fn from(config: &RobotConfig) -> Self {
        Self {
            head_tolerance_px: config.head_tolerance_px,
            settle: config.settle,
        }
    }
}

/// Detections resolved for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameObservation {
    pub frame: FrameSize,
    pub primary: Option<Detection>,
    pub secondary: Option<Detection>,
}

impl FrameObservation {
    pub fn new(frame: FrameSize, primary: Option<Detection>, secondary: Option<Detection>) -> Self {
        Self {
            frame,
            primary,
            secondary,
        }
    }
}

pub struct AlignmentController {
    link: Arc<RobotLink>,
    x_rules: RuleTable,
    y_rules: RuleTable,
    config: ControllerConfig,
    state: AlignmentState,
}

impl AlignmentController {
    pub fn new(link: Arc<RobotLink>, config: ControllerConfig) -> Self {
        Self {
            link,
            x_rules: RuleTable::x_axis(),
            y_rules: RuleTable::y_axis(),
            config,
            state: AlignmentState::default(),
        }
    }

    pub fn link(&self) -> &Arc<RobotLink> {
        &self.link
    }

    pub fn state(&self) -> AlignmentState {
        self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Re-arm for a fresh cycle regardless of the current state
    pub fn reset_alignment(&mut self) {
        self.state = AlignmentState::armed();
        info!("Alignment reset, starting over");
    }

    /// Evaluate one frame, sending at most one corrective command.
    ///
    /// A continuous-mode cycle completion waits for the configured settle
    /// delays before returning, stalling the caller's frame loop.
    pub async fn evaluate(&mut self, observation: &FrameObservation, mode: ModeContext) -> FrameReport {
        let mut report = FrameReport::new(self.link.is_connected());

        let primary = match observation.primary {
            Some(primary) => primary,
            None => {
                report.outcome = FrameOutcome::NoTarget;
                return report;
            }
        };

        let error = observation.frame.error_of(&primary);
        report.primary_error = Some(error);
        if mode.secondary_axis_enabled {
            report.secondary_error = observation
                .secondary
                .map(|secondary| observation.frame.error_of(&secondary));
        }

        if self.state.adjusting_secondary {
            if !mode.secondary_axis_enabled {
                self.state.adjusting_secondary = false;
                self.state.position_locked = false;
                report.outcome = FrameOutcome::SecondaryAbandoned;
                info!("Rotation mode off, dropping rz correction");
            } else if let Some(secondary) = observation.secondary {
                if !self.link.is_connected() {
                    debug!("Link down, skipping rz correction");
                    report.outcome = FrameOutcome::LinkDown;
                    return report;
                }
                report.outcome = self.correct_secondary(&primary, &secondary, &mut report.sent).await;
                return report;
            }
        }

        if !self.state.correcting_position() {
            return report;
        }

        if !self.link.is_connected() {
            debug!("Link down, skipping x/y correction");
            report.outcome = FrameOutcome::LinkDown;
            return report;
        }

        report.outcome = self
            .correct_position(error.x as f64, error.y as f64, mode.repeat, &mut report.sent)
            .await;
        report
    }

    async fn correct_secondary(
        &mut self,
        primary: &Detection,
        secondary: &Detection,
        sent: &mut Vec<Command>,
    ) -> FrameOutcome {
        let tolerance = self.config.head_tolerance_px;
        let command = if secondary.cy < primary.cy.saturating_sub(tolerance) {
            Command::RotatePositive
        } else if secondary.cy > primary.cy.saturating_add(tolerance) {
            Command::RotateNegative
        } else {
            Command::StopRotation
        };

        if !self.dispatch(command, sent).await {
            return FrameOutcome::SendFailed;
        }

        if command == Command::StopRotation {
            self.state.adjusting_secondary = false;
            self.state.position_locked = false;
            info!("Head aligned, starting x/y correction");
            FrameOutcome::SecondarySettled
        } else {
            FrameOutcome::Rotating
        }
    }

    async fn correct_position(
        &mut self,
        x: f64,
        y: f64,
        repeat: RepeatMode,
        sent: &mut Vec<Command>,
    ) -> FrameOutcome {
        let x_command = self.x_rules.command_for(x);
        if !x_command.is_stop() {
            return self.correct_axis(Axis::X, x_command, sent).await;
        }

        let y_command = self.y_rules.command_for(y);
        if !y_command.is_stop() {
            return self.correct_axis(Axis::Y, y_command, sent).await;
        }

        if !self.dispatch(Command::StopZ, sent).await {
            return FrameOutcome::SendFailed;
        }
        self.complete_cycle(repeat, sent).await;
        FrameOutcome::CycleComplete(repeat)
    }

    async fn correct_axis(&mut self, axis: Axis, command: Command, sent: &mut Vec<Command>) -> FrameOutcome {
        if self.dispatch(command, sent).await {
            FrameOutcome::Correcting(axis)
        } else {
            FrameOutcome::SendFailed
        }
    }

    async fn complete_cycle(&mut self, repeat: RepeatMode, sent: &mut Vec<Command>) {
        match repeat {
            RepeatMode::Single => {
                self.state = AlignmentState {
                    adjusting_secondary: false,
                    position_locked: true,
                    aligned_once: true,
                };
                info!("Object aligned, waiting for reset");
                self.dispatch(Command::StopZ, sent).await;
            }
            RepeatMode::Continuous => {
                self.state = AlignmentState::armed();
                info!(
                    "Object aligned, settling for {:?} before the next one",
                    self.config.settle.total()
                );
                tokio::time::sleep(self.config.settle.first()).await;
                self.dispatch(Command::StopZ, sent).await;
                tokio::time::sleep(self.config.settle.second()).await;
            }
        }
    }

    async fn dispatch(&self, command: Command, sent: &mut Vec<Command>) -> bool {
        match self.link.send(command).await {
            Ok(()) => {
                debug!(axis = ?command.axis(), "Sent {}", command);
                sent.push(command);
                true
            }
            Err(e) => {
                warn!("Could not send {}: {}", command, e);
                false
            }
        }
    }
}
