//! Scripted frame orchestrator
//!
//! Drives the controller from a JSON Lines script standing in for the
//! camera, detector and operator buttons.

use serde::Deserialize;
use tracing::{info, warn};
use visalign_core::{select_closest, BoundingBox, Endpoint, FrameSize, LabeledBox, RobotConfig};
use visalign_ctl::{AlignmentController, FrameObservation, FrameReport, ModeContext, RepeatMode};

/// One line of a frame script
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// Detector output for one camera frame
    Frame {
        width: u32,
        height: u32,
        #[serde(default)]
        objects: Vec<ScriptObject>,
    },
    /// Operator "again"
    Reset,
    /// Operator mode change; omitted fields keep their value
    Mode {
        secondary_axis: Option<bool>,
        repeat: Option<RepeatMode>,
    },
    Connect,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptObject {
    pub label: String,
    /// `[x1, y1, x2, y2]`
    pub bbox: [i32; 4],
}

impl From<ScriptObject> for LabeledBox {
    fn from(object: ScriptObject) -> Self {
        let [x1, y1, x2, y2] = object.bbox;
        LabeledBox {
            label: object.label,
            bbox: BoundingBox::new(x1, y1, x2, y2),
        }
    }
}

/// Running totals for a script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptSummary {
    pub frames: usize,
    pub commands: usize,
    pub resets: usize,
    pub refused_resets: usize,
}

pub struct FrameScript {
    controller: AlignmentController,
    endpoint: Endpoint,
    primary_label: Option<String>,
    secondary_label: Option<String>,
    flip_image: bool,
    mode: ModeContext,
    summary: ScriptSummary,
}

impl FrameScript {
    pub fn new(controller: AlignmentController, config: &RobotConfig, mode: ModeContext) -> Self {
        Self {
            controller,
            endpoint: config.endpoint(),
            primary_label: config.primary_label.clone(),
            secondary_label: config.secondary_label.clone(),
            flip_image: config.flip_image,
            mode,
            summary: ScriptSummary::default(),
        }
    }

    pub fn summary(&self) -> ScriptSummary {
        self.summary
    }

    pub fn controller(&self) -> &AlignmentController {
        &self.controller
    }

    /// Parse and apply one script line. Blank lines and `#` comments are skipped.
    pub async fn apply_line(&mut self, line: &str) -> anyhow::Result<Option<FrameReport>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let event: ScriptEvent = serde_json::from_str(line)?;
        Ok(self.apply(event).await)
    }

    pub async fn apply(&mut self, event: ScriptEvent) -> Option<FrameReport> {
        match event {
            ScriptEvent::Frame {
                width,
                height,
                objects,
            } => {
                let frame = FrameSize::new(width, height);
                let candidates: Vec<LabeledBox> = objects.into_iter().map(LabeledBox::from).collect();
                let observation = self.resolve(frame, &candidates);

                let report = self.controller.evaluate(&observation, self.mode).await;
                self.summary.frames += 1;
                self.summary.commands += report.sent.len();
                info!("{}  {:?}", report.status_line(), report.outcome);
                Some(report)
            }
            ScriptEvent::Reset => {
                if !self.controller.link().is_connected() {
                    warn!("Not connected, connect to the robot before resetting");
                    self.summary.refused_resets += 1;
                } else {
                    self.controller.reset_alignment();
                    self.summary.resets += 1;
                }
                None
            }
            ScriptEvent::Mode {
                secondary_axis,
                repeat,
            } => {
                if let Some(enabled) = secondary_axis {
                    self.mode.secondary_axis_enabled = enabled;
                }
                if let Some(repeat) = repeat {
                    self.mode.repeat = repeat;
                }
                info!("Mode set to {:?}", self.mode);
                None
            }
            ScriptEvent::Connect => {
                if let Err(e) = self.controller.link().connect(self.endpoint.clone()).await {
                    warn!("Still not connected to the robot: {}", e);
                }
                None
            }
            ScriptEvent::Disconnect => {
                self.controller.link().disconnect().await;
                None
            }
        }
    }

    fn resolve(&self, frame: FrameSize, candidates: &[LabeledBox]) -> FrameObservation {
        let pick = |label: &Option<String>| {
            select_closest(candidates, label.as_deref(), frame).map(|detection| {
                if self.flip_image {
                    detection.flipped(frame)
                } else {
                    detection
                }
            })
        };

        FrameObservation::new(frame, pick(&self.primary_label), pick(&self.secondary_label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use visalign_core::Command;
    use visalign_ctl::{ControllerConfig, FrameOutcome};
    use visalign_link::{MemoryLog, RobotLink};

    async fn script(flip_image: bool) -> (FrameScript, MemoryLog) {
        let mut config = RobotConfig::default();
        config.flip_image = flip_image;
        let (link, log) = RobotLink::memory();
        let controller = AlignmentController::new(Arc::new(link), ControllerConfig::from(&config));
        let script = FrameScript::new(controller, &config, ModeContext::new(false, RepeatMode::Single));
        (script, log)
    }

    #[test]
    fn test_parse_events() {
        let event: ScriptEvent = serde_json::from_str(
            r#"{"event":"frame","width":640,"height":480,"objects":[{"label":"grey","bbox":[0,0,10,10]}]}"#,
        )
        .unwrap();
        assert!(matches!(event, ScriptEvent::Frame { width: 640, .. }));

        let event: ScriptEvent =
            serde_json::from_str(r#"{"event":"mode","repeat":"continuous"}"#).unwrap();
        assert_eq!(
            event,
            ScriptEvent::Mode {
                secondary_axis: None,
                repeat: Some(RepeatMode::Continuous)
            }
        );

        assert!(serde_json::from_str::<ScriptEvent>(r#"{"event":"jump"}"#).is_err());
    }

    #[tokio::test]
    async fn test_reset_refused_while_disconnected() {
        let (mut script, _log) = script(false).await;

        script.apply(ScriptEvent::Reset).await;
        assert_eq!(script.summary().refused_resets, 1);
        assert!(!script.controller().state().adjusting_secondary);
    }

    #[tokio::test]
    async fn test_frame_uses_configured_labels() {
        let (mut script, log) = script(false).await;
        script.apply(ScriptEvent::Connect).await;
        script.apply(ScriptEvent::Reset).await;

        let report = script
            .apply_line(
                r#"{"event":"frame","width":640,"height":480,"objects":[
                    {"label":"box","bbox":[0,0,20,20]},
                    {"label":"grey","bbox":[280,220,320,260]}]}"#
                    .replace('\n', " ")
                    .as_str(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.sent, vec![Command::MidLeft]);
        assert_eq!(log.delivered(), vec!["mleft"]);
        assert_eq!(script.summary().frames, 1);
        assert_eq!(script.summary().commands, 1);
    }

    #[tokio::test]
    async fn test_flip_mirrors_detections() {
        let (mut script, log) = script(true).await;
        script.apply(ScriptEvent::Connect).await;
        script.apply(ScriptEvent::Reset).await;

        // Left of center in the raw image is right of center once flipped
        let report = script
            .apply(ScriptEvent::Frame {
                width: 640,
                height: 480,
                objects: vec![ScriptObject {
                    label: "grey".to_string(),
                    bbox: [190, 229, 210, 249],
                }],
            })
            .await
            .unwrap();

        assert_eq!(report.primary_error.map(|e| e.x), Some(119));
        assert_eq!(log.delivered(), vec!["lright"]);
    }

    #[tokio::test]
    async fn test_frame_without_target_label() {
        let (mut script, log) = script(false).await;
        script.apply(ScriptEvent::Connect).await;
        script.apply(ScriptEvent::Reset).await;

        let report = script
            .apply(ScriptEvent::Frame {
                width: 640,
                height: 480,
                objects: vec![],
            })
            .await
            .unwrap();

        assert_eq!(report.outcome, FrameOutcome::NoTarget);
        assert!(log.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_boxes_at_the_coordinate_limit() {
        let (mut script, log) = script(false).await;
        script.apply(ScriptEvent::Connect).await;
        script.apply(ScriptEvent::Reset).await;

        let report = script
            .apply_line(
                r#"{"event":"frame","width":640,"height":480,"objects":[{"label":"grey","bbox":[2147483000,0,2147483000,10]}]}"#,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.primary_error.map(|e| e.x), Some(2147483000 - 320));
        assert_eq!(log.delivered(), vec!["lright"]);

        let (mut flipped, log) = self::script(true).await;
        flipped.apply(ScriptEvent::Connect).await;
        flipped.apply(ScriptEvent::Reset).await;

        let report = flipped
            .apply_line(
                r#"{"event":"frame","width":4294967295,"height":480,"objects":[{"label":"grey","bbox":[2147483000,0,2147483000,10]}]}"#,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.primary_error.map(|e| (e.x, e.y)), Some((0, -234)));
        assert_eq!(log.delivered(), vec!["ltop"]);
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_link_down() {
        let (mut script, log) = script(false).await;
        log.refuse_connections(true);

        script.apply(ScriptEvent::Connect).await;
        assert!(!script.controller().link().is_connected());
        assert_eq!(log.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_comments_and_blank_lines_are_skipped() {
        let (mut script, _log) = script(false).await;
        assert!(script.apply_line("").await.unwrap().is_none());
        assert!(script.apply_line("# warm-up").await.unwrap().is_none());
        assert!(script.apply_line("{oops").await.is_err());
    }
}
