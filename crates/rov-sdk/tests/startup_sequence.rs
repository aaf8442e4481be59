//! 启动流程端到端测试：真实链路（本机 UDP）+ 模拟 ROV

mod common;

use common::FakeRov;
use rov_sdk::client::{MotorInitPhase, PreflightPhase};
use rov_sdk::prelude::*;
use std::time::Duration;

const TELEMETRY: &str = r#"{"depth":1.24,"temperature":22.5}"#;

fn link_to(rov: &FakeRov) -> TelemetryLink {
    TelemetryLinkBuilder::new()
        .remote(rov.addr().to_string())
        .local_port(0)
        .build()
        .unwrap()
}

fn sequencer(preflight_timeout: Duration) -> StartupSequencer {
    StartupSequencer::new(SequencerConfig {
        poll_interval: Duration::from_millis(10),
        preflight_timeout,
        video_reconnect_after: Duration::from_secs(60),
        motor_max_retries: 3,
    })
}

#[test]
fn test_without_video_startup_degrades_but_initializes_motors() {
    let rov = FakeRov::start(Some(TELEMETRY));
    let link = link_to(&rov);
    let mut signals = StationSignals::new(&link, None, || true);

    let outcome =
        sequencer(Duration::from_millis(300)).run(&mut signals, |_| PumpEvent::Continue);

    assert_eq!(outcome.preflight, PreflightPhase::Degraded);
    assert!(outcome.state.sensor_ready);
    assert!(outcome.state.command_path_ready);
    assert!(outcome.state.controller_ready);
    assert!(!outcome.state.video_ready);

    assert_eq!(outcome.motors, MotorInitPhase::Ready);
    // 逐条发送期间不判定失败，一轮即完成
    assert_eq!(outcome.state.retry.motor_attempts, 1);
    assert!(link.all_motors_initialized());
    assert_eq!(outcome.status_banner().as_deref(), Some("DEGRADED: no video"));
    assert!(common::wait_until(Duration::from_secs(2), || {
        let mut inits = rov.motor_inits();
        inits.sort_unstable();
        inits == vec![0, 1, 2, 3, 4, 5]
    }));
}

#[test]
fn test_operator_override_forces_start() {
    let rov = FakeRov::start(None);
    let link = link_to(&rov);
    let mut signals = StationSignals::new(&link, None, || false);

    let mut ticks = 0;
    let outcome = sequencer(Duration::from_secs(30)).run(&mut signals, |_| {
        ticks += 1;
        if ticks == 3 {
            PumpEvent::OverridePressed
        } else {
            PumpEvent::Continue
        }
    });

    assert_eq!(outcome.preflight, PreflightPhase::Forced);
    assert!(outcome.state.force_override);
    assert_eq!(outcome.state.retry.preflight_ticks, 3);
    // 强制启动后电机初始化只跑一轮
    assert_eq!(outcome.state.retry.motor_attempts, 1);
    assert!(matches!(
        outcome.motors,
        MotorInitPhase::Ready | MotorInitPhase::Forced
    ));
    assert!(outcome.status_banner().unwrap().contains("FORCED START"));
}

#[test]
fn test_quit_during_startup() {
    let rov = FakeRov::start(Some(TELEMETRY));
    let link = link_to(&rov);
    let mut signals = StationSignals::new(&link, None, || true);

    let outcome = sequencer(Duration::from_secs(30)).run(&mut signals, |_| PumpEvent::Quit);
    assert!(outcome.aborted);
    assert!(!outcome.is_nominal());
    assert!(!link.all_motors_initialized());
}
