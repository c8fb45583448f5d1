//! Tests for the alignment state machine

use std::sync::Arc;
use std::time::Duration;
use visalign_core::{Axis, Command, Detection, Endpoint, FrameSize, SettleDelays};
use visalign_ctl::{
    AlignmentController, AlignmentState, ControllerConfig, FrameObservation, FrameOutcome,
    ModeContext, RepeatMode,
};
use visalign_link::{MemoryLog, RobotLink};

const FRAME: FrameSize = FrameSize {
    width: 640,
    height: 480,
};

fn observe(primary: Option<(i32, i32)>, secondary: Option<(i32, i32)>) -> FrameObservation {
    FrameObservation::new(
        FRAME,
        primary.map(|(x, y)| Detection::at(x, y)),
        secondary.map(|(x, y)| Detection::at(x, y)),
    )
}

fn xy_only(repeat: RepeatMode) -> ModeContext {
    ModeContext::new(false, repeat)
}

fn with_rz(repeat: RepeatMode) -> ModeContext {
    ModeContext::new(true, repeat)
}

async fn connected_controller() -> (AlignmentController, MemoryLog) {
    let (link, log) = RobotLink::memory();
    link.connect(Endpoint::new("robot", 6601)).await.unwrap();
    let controller = AlignmentController::new(Arc::new(link), ControllerConfig::default());
    (controller, log)
}

fn sent(log: &MemoryLog) -> Vec<String> {
    log.delivered()
}

#[tokio::test]
async fn test_idle_until_first_reset() {
    let (mut controller, log) = connected_controller().await;

    let report = controller
        .evaluate(&observe(Some((100, 100)), None), with_rz(RepeatMode::Single))
        .await;

    assert_eq!(report.outcome, FrameOutcome::Idle);
    assert!(report.sent.is_empty());
    assert!(sent(&log).is_empty());
    assert_eq!(controller.state(), AlignmentState::default());
}

#[tokio::test]
async fn test_no_primary_detection_does_nothing() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();

    let report = controller
        .evaluate(&observe(None, Some((320, 200))), with_rz(RepeatMode::Single))
        .await;

    assert_eq!(report.outcome, FrameOutcome::NoTarget);
    assert_eq!(report.status_line(), "X: -   Y: -   rx: -   ry: -");
    assert!(sent(&log).is_empty());
    assert_eq!(controller.state(), AlignmentState::armed());
}

#[tokio::test]
async fn test_mid_left_scenario_corrects_x_only() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();

    let report = controller
        .evaluate(&observe(Some((300, 240)), None), xy_only(RepeatMode::Single))
        .await;

    assert_eq!(report.primary_error.map(|e| e.x), Some(-20));
    assert_eq!(report.outcome, FrameOutcome::Correcting(Axis::X));
    assert_eq!(report.sent, vec![Command::MidLeft]);
    assert_eq!(sent(&log), vec!["mleft"]);
}

#[tokio::test]
async fn test_x_is_corrected_before_y() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();
    let mode = xy_only(RepeatMode::Single);

    controller.evaluate(&observe(Some((500, 20)), None), mode).await;
    controller.evaluate(&observe(Some((330, 20)), None), mode).await;
    let report = controller.evaluate(&observe(Some((321, 20)), None), mode).await;

    // x error of 1 is inside the dead band, so y gets its turn
    assert_eq!(report.outcome, FrameOutcome::Correcting(Axis::Y));
    assert_eq!(sent(&log), vec!["lright", "right", "llow"]);
}

#[tokio::test]
async fn test_head_above_body_rotates_positive() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();

    let report = controller
        .evaluate(
            &observe(Some((320, 240)), Some((320, 235))),
            with_rz(RepeatMode::Single),
        )
        .await;

    assert_eq!(report.outcome, FrameOutcome::Rotating);
    assert_eq!(sent(&log), vec!["rzP"]);
    assert!(controller.state().adjusting_secondary);
    assert!(controller.state().position_locked);
}

#[tokio::test]
async fn test_head_below_body_rotates_negative() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();

    controller
        .evaluate(
            &observe(Some((320, 240)), Some((320, 245))),
            with_rz(RepeatMode::Single),
        )
        .await;

    assert_eq!(sent(&log), vec!["rzM"]);
    assert!(controller.state().adjusting_secondary);
}

#[tokio::test]
async fn test_head_within_tolerance_unlocks_position() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();
    let mode = with_rz(RepeatMode::Single);

    let report = controller
        .evaluate(&observe(Some((200, 240)), Some((200, 241))), mode)
        .await;
    assert_eq!(report.outcome, FrameOutcome::SecondarySettled);
    assert_eq!(sent(&log), vec!["stopc"]);
    assert!(!controller.state().adjusting_secondary);
    assert!(!controller.state().position_locked);

    // Head handling is finished; the next frame corrects x
    let report = controller
        .evaluate(&observe(Some((200, 240)), Some((200, 100))), mode)
        .await;
    assert_eq!(report.sent, vec![Command::FarLeft]);
}

#[tokio::test]
async fn test_rotation_waits_for_head_detection() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();

    let report = controller
        .evaluate(&observe(Some((100, 240)), None), with_rz(RepeatMode::Single))
        .await;

    assert_eq!(report.outcome, FrameOutcome::Idle);
    assert!(sent(&log).is_empty());
}

#[tokio::test]
async fn test_disabling_rotation_mid_cycle_abandons_it() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();

    controller
        .evaluate(
            &observe(Some((320, 240)), Some((320, 200))),
            with_rz(RepeatMode::Single),
        )
        .await;
    assert_eq!(sent(&log), vec!["rzP"]);

    let report = controller
        .evaluate(&observe(Some((250, 240)), Some((320, 200))), xy_only(RepeatMode::Single))
        .await;
    assert!(!controller.state().adjusting_secondary);
    assert_eq!(report.secondary_error, None);
    assert_eq!(sent(&log), vec!["rzP", "mleft"]);
}

#[tokio::test]
async fn test_position_locks_only_when_both_axes_centered() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();
    let mode = xy_only(RepeatMode::Single);

    for (x, y) in [(100, 240), (300, 240), (315, 240), (320, 300), (320, 250), (320, 242)] {
        controller.evaluate(&observe(Some((x, y)), None), mode).await;
        assert!(!controller.state().position_locked, "locked early at ({}, {})", x, y);
    }

    let report = controller.evaluate(&observe(Some((321, 239)), None), mode).await;
    assert_eq!(report.outcome, FrameOutcome::CycleComplete(RepeatMode::Single));
    assert!(controller.state().position_locked);
    assert_eq!(
        sent(&log),
        vec!["lleft", "mleft", "left", "mtop", "top", "top", "stopz", "stopz"]
    );
}

#[tokio::test]
async fn test_single_mode_waits_for_reset() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();
    let mode = xy_only(RepeatMode::Single);

    controller.evaluate(&observe(Some((320, 240)), None), mode).await;
    assert_eq!(
        controller.state(),
        AlignmentState {
            adjusting_secondary: false,
            position_locked: true,
            aligned_once: true,
        }
    );
    let delivered = sent(&log).len();

    for (x, y) in [(321, 240), (319, 241), (320, 239), (400, 300)] {
        let report = controller.evaluate(&observe(Some((x, y)), None), mode).await;
        assert!(report.sent.is_empty());
    }
    assert_eq!(sent(&log).len(), delivered);

    controller.reset_alignment();
    let report = controller.evaluate(&observe(Some((400, 240)), None), mode).await;
    assert_eq!(report.sent, vec![Command::MidRight]);
}

#[tokio::test(start_paused = true)]
async fn test_continuous_mode_settles_and_rearms() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();
    let mode = xy_only(RepeatMode::Continuous);

    let started = tokio::time::Instant::now();
    let report = controller.evaluate(&observe(Some((320, 240)), None), mode).await;
    let elapsed = started.elapsed();

    assert_eq!(report.outcome, FrameOutcome::CycleComplete(RepeatMode::Continuous));
    assert!(elapsed >= Duration::from_secs(4), "settled for {:?}", elapsed);
    assert_eq!(sent(&log), vec!["stopz", "stopz"]);
    assert_eq!(controller.state(), AlignmentState::armed());
    assert!(!controller.state().aligned_once);

    // Next object: no reset needed
    let report = controller.evaluate(&observe(Some((100, 240)), None), mode).await;
    assert_eq!(report.sent, vec![Command::FarLeft]);
}

#[tokio::test(start_paused = true)]
async fn test_settle_delays_are_configurable() {
    let (link, _log) = RobotLink::memory();
    link.connect(Endpoint::new("robot", 6601)).await.unwrap();
    let config = ControllerConfig {
        head_tolerance_px: 1,
        settle: SettleDelays {
            first_ms: 10,
            second_ms: 20,
        },
    };
    let mut controller = AlignmentController::new(Arc::new(link), config);
    controller.reset_alignment();

    let started = tokio::time::Instant::now();
    controller
        .evaluate(&observe(Some((320, 240)), None), xy_only(RepeatMode::Continuous))
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(30));
    assert!(elapsed < Duration::from_secs(1));
}

#[tokio::test]
async fn test_link_down_freezes_state() {
    let (link, log) = RobotLink::memory();
    let link = Arc::new(link);
    let mut controller = AlignmentController::new(link.clone(), ControllerConfig::default());
    controller.reset_alignment();

    let report = controller
        .evaluate(
            &observe(Some((100, 240)), Some((100, 200))),
            with_rz(RepeatMode::Single),
        )
        .await;
    assert_eq!(report.outcome, FrameOutcome::LinkDown);
    assert!(!report.link_connected);
    assert_eq!(controller.state(), AlignmentState::armed());

    let report = controller
        .evaluate(&observe(Some((100, 240)), None), xy_only(RepeatMode::Single))
        .await;
    assert_eq!(report.outcome, FrameOutcome::LinkDown);
    assert!(log.delivered().is_empty());
    assert_eq!(log.connect_attempts(), 0);

    link.connect(Endpoint::new("robot", 6601)).await.unwrap();
    let report = controller
        .evaluate(&observe(Some((100, 240)), None), xy_only(RepeatMode::Single))
        .await;
    assert_eq!(report.sent, vec![Command::FarLeft]);
}

#[tokio::test]
async fn test_failed_send_leaves_state_untouched() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();
    let mode = xy_only(RepeatMode::Single);

    controller.evaluate(&observe(Some((300, 240)), None), mode).await;
    let before = controller.state();

    // Write and retry both fail
    log.fail_next_writes(2);
    let report = controller.evaluate(&observe(Some((320, 240)), None), mode).await;

    assert_eq!(report.outcome, FrameOutcome::SendFailed);
    assert!(report.sent.is_empty());
    assert_eq!(controller.state(), before);
    assert!(!controller.state().position_locked);
    assert!(!controller.link().is_connected());
}

#[tokio::test]
async fn test_failed_stop_rotation_keeps_adjusting() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();
    log.fail_next_writes(2);

    let report = controller
        .evaluate(
            &observe(Some((320, 240)), Some((320, 240))),
            with_rz(RepeatMode::Single),
        )
        .await;

    assert_eq!(report.outcome, FrameOutcome::SendFailed);
    assert_eq!(controller.state(), AlignmentState::armed());
}

#[tokio::test]
async fn test_recovered_write_still_counts() {
    let (mut controller, log) = connected_controller().await;
    controller.reset_alignment();
    log.fail_next_writes(1);

    let report = controller
        .evaluate(&observe(Some((360, 240)), None), xy_only(RepeatMode::Single))
        .await;

    assert_eq!(report.outcome, FrameOutcome::Correcting(Axis::X));
    assert_eq!(log.delivered_on(2), vec!["mright"]);
}
