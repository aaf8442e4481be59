//! 启动流程驱动
//!
//! 在主线程上运行两级状态机：每轮先交给事件泵（界面保持响应），
//! 再读取各子系统的就绪信号，最后固定间隔休眠。

use super::machine::{
    ALL_MOTORS, MotorInitMachine, MotorInitPhase, Observation, PreflightMachine, PreflightPhase,
    ReadinessState, motors_in,
};
use rov_protocol::MotorId;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 每轮电机初始化等待链路线程逐条发完的最长时间
const MOTOR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 事件泵的返回值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpEvent {
    Continue,
    /// 操作员按下任意控制器按键
    OverridePressed,
    /// 窗口关闭 / Ctrl+C
    Quit,
}

/// 就绪信号来源
///
/// 实现者只做非阻塞查询；耗时操作（发送、重连）投递给各自的后台线程。
pub trait StartupSignals {
    /// 视频已连接且帧缓冲非空
    fn video_ready(&mut self) -> bool;

    /// 请求视频重连
    fn reconnect_video(&mut self);

    /// 检测到输入设备
    fn controller_ready(&mut self) -> bool;

    /// 重新枚举输入设备
    fn rescan_controller(&mut self) {}

    /// 收到过有效遥测
    fn telemetry_ready(&self) -> bool;

    /// 至少一次指令发送成功
    fn command_path_ready(&self) -> bool;

    /// 触发一次指令/遥测交换
    fn trigger_exchange(&mut self);

    /// 投递单个电机的标定参数
    fn send_motor_init(&mut self, motor: MotorId);

    /// 已发送成功的电机位掩码
    fn motors_initialized(&self) -> u8;

    /// 本轮投递的标定是否仍在发送中
    fn motor_inits_pending(&self) -> bool {
        false
    }
}

/// 启动流程参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerConfig {
    /// 轮询间隔
    pub poll_interval: Duration,
    /// 预检总时限
    pub preflight_timeout: Duration,
    /// 视频持续未就绪多久后重连
    pub video_reconnect_after: Duration,
    /// 电机初始化最大重试轮数
    pub motor_max_retries: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            preflight_timeout: Duration::from_secs(30),
            video_reconnect_after: Duration::from_secs(5),
            motor_max_retries: 10,
        }
    }
}

/// 启动结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessOutcome {
    pub preflight: PreflightPhase,
    pub motors: MotorInitPhase,
    pub state: ReadinessState,
    /// 电机初始化结束时仍未发送的通道（位掩码）
    pub unsent: u8,
    /// 启动过程中收到退出请求
    pub aborted: bool,
}

impl ReadinessOutcome {
    /// 全部检查通过、全部电机初始化
    pub fn is_nominal(&self) -> bool {
        !self.aborted
            && self.preflight == PreflightPhase::Ready
            && self.motors == MotorInitPhase::Ready
    }

    /// 非正常启动时的状态提示
    ///
    /// 主循环需要每一帧都渲染该提示，而不是只显示一次。
    pub fn status_banner(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.aborted {
            parts.push("STARTUP ABORTED".to_string());
        }
        match self.preflight {
            PreflightPhase::Forced => parts.push("FORCED START: checks skipped".to_string()),
            PreflightPhase::Degraded => parts.push(format!(
                "DEGRADED: no {}",
                self.state.missing().join(", ")
            )),
            PreflightPhase::Checking | PreflightPhase::Ready => {},
        }
        match self.motors {
            MotorInitPhase::PartialFailure { unsent } => {
                parts.push(format!("MOTOR INIT FAILED: {}", motor_list(unsent)))
            },
            MotorInitPhase::Forced if self.unsent != 0 => {
                parts.push(format!("MOTOR INIT FORCED: {}", motor_list(self.unsent)))
            },
            _ => {},
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" | "))
        }
    }
}

fn motor_list(mask: u8) -> String {
    motors_in(mask).map(|m| m.to_string()).collect::<Vec<_>>().join(", ")
}

/// 启动流程
///
/// # Example
///
/// ```rust
/// use rov_client::{PumpEvent, SequencerConfig, StartupSequencer, StartupSignals};
/// use rov_protocol::MotorId;
///
/// struct AllReady(u8);
///
/// impl StartupSignals for AllReady {
///     fn video_ready(&mut self) -> bool { true }
///     fn reconnect_video(&mut self) {}
///     fn controller_ready(&mut self) -> bool { true }
///     fn telemetry_ready(&self) -> bool { true }
///     fn command_path_ready(&self) -> bool { true }
///     fn trigger_exchange(&mut self) {}
///     fn send_motor_init(&mut self, motor: MotorId) { self.0 |= motor.bit(); }
///     fn motors_initialized(&self) -> u8 { self.0 }
/// }
///
/// let sequencer = StartupSequencer::new(SequencerConfig {
///     poll_interval: std::time::Duration::from_millis(1),
///     ..Default::default()
/// });
/// let outcome = sequencer.run(&mut AllReady(0), |_| PumpEvent::Continue);
/// assert!(outcome.is_nominal());
/// assert!(outcome.status_banner().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StartupSequencer {
    config: SequencerConfig,
}

impl StartupSequencer {
    pub fn new(config: SequencerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// 运行启动流程直到终态
    ///
    /// # 参数
    ///
    /// - `signals`: 就绪信号来源
    /// - `poll`: 事件泵，每轮调用一次（可用于渲染启动进度）
    pub fn run<S, F>(&self, signals: &mut S, mut poll: F) -> ReadinessOutcome
    where
        S: StartupSignals + ?Sized,
        F: FnMut(&ReadinessState) -> PumpEvent,
    {
        let start = Instant::now();
        let mut preflight =
            PreflightMachine::new(self.config.preflight_timeout, self.config.video_reconnect_after);

        info!("Startup checks running");
        loop {
            let event = poll(preflight.state());
            if event == PumpEvent::Quit {
                warn!("Startup aborted during pre-flight");
                return ReadinessOutcome {
                    preflight: preflight.phase(),
                    motors: MotorInitPhase::Init,
                    state: *preflight.state(),
                    unsent: ALL_MOTORS & !signals.motors_initialized(),
                    aborted: true,
                };
            }

            signals.trigger_exchange();
            let obs = Observation {
                video: signals.video_ready(),
                controller: signals.controller_ready(),
                telemetry: signals.telemetry_ready(),
                command_path: signals.command_path_ready(),
                override_pressed: event == PumpEvent::OverridePressed,
                elapsed: start.elapsed(),
            };
            let action = preflight.step(obs);
            if action.reconnect_video {
                debug!("Video not ready, requesting reconnect");
                signals.reconnect_video();
            }
            if action.rescan_controller {
                signals.rescan_controller();
            }
            if preflight.phase().is_terminal() {
                break;
            }
            spin_sleep::sleep(self.config.poll_interval);
        }

        let preflight_phase = preflight.phase();
        let mut state = preflight.into_state();
        match preflight_phase {
            PreflightPhase::Ready => info!("Pre-flight checks passed"),
            PreflightPhase::Forced => warn!("Pre-flight checks skipped by operator"),
            _ => warn!("Pre-flight timed out, missing: {}", state.missing().join(", ")),
        }

        let mut motors = MotorInitMachine::new(
            self.config.motor_max_retries,
            preflight_phase == PreflightPhase::Forced,
        );
        let mut aborted = false;
        while let Some(pending) = motors.begin_attempt(signals.motors_initialized()) {
            state.retry.motor_attempts += 1;
            for motor in motors_in(pending) {
                signals.send_motor_init(motor);
            }

            let drain_deadline = Instant::now() + MOTOR_DRAIN_TIMEOUT;
            let event = loop {
                spin_sleep::sleep(self.config.poll_interval);
                let event = poll(&state);
                if event != PumpEvent::Continue
                    || !signals.motor_inits_pending()
                    || Instant::now() >= drain_deadline
                {
                    break event;
                }
            };
            if event == PumpEvent::Quit {
                warn!("Startup aborted during motor init");
                aborted = true;
                break;
            }
            let override_pressed = event == PumpEvent::OverridePressed;
            state.force_override |= override_pressed;
            let phase = motors.complete_attempt(signals.motors_initialized(), override_pressed);
            debug!("Motor init attempt {}: {:?}", state.retry.motor_attempts, phase);
        }

        state.motors_ready = motors.phase() == MotorInitPhase::Ready;
        match motors.phase() {
            MotorInitPhase::Ready => info!("All motors initialized"),
            MotorInitPhase::PartialFailure { unsent } => {
                warn!("Motor init incomplete, unsent: {}", motor_list(unsent))
            },
            phase => warn!("Motor init ended in {:?}", phase),
        }

        ReadinessOutcome {
            preflight: preflight_phase,
            motors: motors.phase(),
            state,
            unsent: motors.unsent(),
            aborted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// 脚本化信号：每个信号在第 N 次查询时变为就绪
    #[derive(Default)]
    struct Scripted {
        ticks: u32,
        video_at: Option<u32>,
        controller_at: Option<u32>,
        telemetry_at: Option<u32>,
        command_at: Option<u32>,
        /// 永远发送失败的电机
        broken_motors: u8,
        initialized: u8,
        sends: Vec<MotorId>,
        reconnects: u32,
    }

    impl Scripted {
        fn ready_at(at: Option<u32>, ticks: u32) -> bool {
            at.is_some_and(|n| ticks >= n)
        }
    }

    impl StartupSignals for Scripted {
        fn video_ready(&mut self) -> bool {
            Self::ready_at(self.video_at, self.ticks)
        }
        fn reconnect_video(&mut self) {
            self.reconnects += 1;
        }
        fn controller_ready(&mut self) -> bool {
            Self::ready_at(self.controller_at, self.ticks)
        }
        fn telemetry_ready(&self) -> bool {
            Self::ready_at(self.telemetry_at, self.ticks)
        }
        fn command_path_ready(&self) -> bool {
            Self::ready_at(self.command_at, self.ticks)
        }
        fn trigger_exchange(&mut self) {
            self.ticks += 1;
        }
        fn send_motor_init(&mut self, motor: MotorId) {
            self.sends.push(motor);
            if self.broken_motors & motor.bit() == 0 {
                self.initialized |= motor.bit();
            }
        }
        fn motors_initialized(&self) -> u8 {
            self.initialized
        }
    }

    /// 链路逐条发送：一轮投递需要 `polls_per_batch` 次轮询才发完
    struct PacedLink {
        queued: Cell<u8>,
        initialized: Cell<u8>,
        polls_per_batch: u32,
        remaining: Cell<u32>,
        sends: u32,
    }

    impl PacedLink {
        fn new(polls_per_batch: u32) -> Self {
            Self {
                queued: Cell::new(0),
                initialized: Cell::new(0),
                polls_per_batch,
                remaining: Cell::new(0),
                sends: 0,
            }
        }
    }

    impl StartupSignals for PacedLink {
        fn video_ready(&mut self) -> bool {
            true
        }
        fn reconnect_video(&mut self) {}
        fn controller_ready(&mut self) -> bool {
            true
        }
        fn telemetry_ready(&self) -> bool {
            true
        }
        fn command_path_ready(&self) -> bool {
            true
        }
        fn trigger_exchange(&mut self) {}
        fn send_motor_init(&mut self, motor: MotorId) {
            self.sends += 1;
            self.queued.set(self.queued.get() | motor.bit());
            self.remaining.set(self.polls_per_batch);
        }
        fn motors_initialized(&self) -> u8 {
            self.initialized.get()
        }
        fn motor_inits_pending(&self) -> bool {
            if self.queued.get() == 0 {
                return false;
            }
            let left = self.remaining.get();
            if left > 1 {
                self.remaining.set(left - 1);
                return true;
            }
            self.initialized.set(self.initialized.get() | self.queued.get());
            self.queued.set(0);
            false
        }
    }

    fn fast_config() -> SequencerConfig {
        SequencerConfig {
            poll_interval: Duration::from_millis(1),
            preflight_timeout: Duration::from_secs(10),
            video_reconnect_after: Duration::from_secs(5),
            motor_max_retries: 3,
        }
    }

    #[test]
    fn test_nominal_startup() {
        let mut signals = Scripted {
            video_at: Some(3),
            controller_at: Some(1),
            telemetry_at: Some(2),
            command_at: Some(1),
            ..Default::default()
        };
        let outcome = StartupSequencer::new(fast_config()).run(&mut signals, |_| PumpEvent::Continue);

        assert!(outcome.is_nominal());
        assert_eq!(outcome.state.retry.preflight_ticks, 3);
        assert_eq!(outcome.state.retry.motor_attempts, 1);
        assert_eq!(signals.sends.len(), 6);
        assert_eq!(outcome.status_banner(), None);
    }

    #[test]
    fn test_override_skips_checks_and_runs_motor_init_once() {
        let mut signals = Scripted {
            broken_motors: 0b0000_0100,
            ..Default::default()
        };
        let mut polls = 0;
        let outcome = StartupSequencer::new(fast_config()).run(&mut signals, |_| {
            polls += 1;
            if polls == 4 {
                PumpEvent::OverridePressed
            } else {
                PumpEvent::Continue
            }
        });

        assert_eq!(outcome.preflight, PreflightPhase::Forced);
        assert_eq!(outcome.state.retry.preflight_ticks, 4);
        assert_eq!(outcome.motors, MotorInitPhase::Forced);
        assert_eq!(outcome.state.retry.motor_attempts, 1);
        assert_eq!(signals.sends.len(), 6);
        assert!(!outcome.is_nominal());
        let banner = outcome.status_banner().unwrap();
        assert!(banner.contains("FORCED START"));
        assert!(banner.contains("MOTOR INIT FORCED: m2"));
        assert_eq!(outcome.unsent, 0b0000_0100);
    }

    #[test]
    fn test_partial_failure_is_reported() {
        let mut signals = Scripted {
            video_at: Some(1),
            controller_at: Some(1),
            telemetry_at: Some(1),
            command_at: Some(1),
            broken_motors: 0b0010_0001,
            ..Default::default()
        };
        let outcome = StartupSequencer::new(fast_config()).run(&mut signals, |_| PumpEvent::Continue);

        assert_eq!(outcome.preflight, PreflightPhase::Ready);
        assert_eq!(outcome.motors, MotorInitPhase::PartialFailure { unsent: 0b0010_0001 });
        // 首轮 6 个 + 3 轮重试各 2 个
        assert_eq!(signals.sends.len(), 6 + 3 * 2);
        assert_eq!(signals.initialized, ALL_MOTORS & !0b0010_0001);
        assert_eq!(outcome.status_banner().unwrap(), "MOTOR INIT FAILED: m0, m5");
    }

    #[test]
    fn test_degraded_after_timeout() {
        let mut signals = Scripted {
            controller_at: Some(1),
            telemetry_at: Some(1),
            command_at: Some(1),
            ..Default::default()
        };
        let config = SequencerConfig {
            preflight_timeout: Duration::from_millis(30),
            video_reconnect_after: Duration::from_millis(10),
            ..fast_config()
        };
        let outcome = StartupSequencer::new(config).run(&mut signals, |_| PumpEvent::Continue);

        assert_eq!(outcome.preflight, PreflightPhase::Degraded);
        assert_eq!(outcome.motors, MotorInitPhase::Ready);
        assert!(signals.reconnects >= 1);
        assert_eq!(outcome.status_banner().unwrap(), "DEGRADED: no video");
    }

    #[test]
    fn test_motor_attempt_waits_for_paced_sends() {
        let mut signals = PacedLink::new(5);
        let config = SequencerConfig {
            motor_max_retries: 0,
            ..fast_config()
        };
        let outcome = StartupSequencer::new(config).run(&mut signals, |_| PumpEvent::Continue);

        assert_eq!(outcome.motors, MotorInitPhase::Ready);
        assert_eq!(outcome.state.retry.motor_attempts, 1);
        assert_eq!(signals.sends, 6);
        assert!(outcome.is_nominal());
    }

    #[test]
    fn test_quit_aborts() {
        let mut signals = Scripted::default();
        let outcome = StartupSequencer::new(fast_config()).run(&mut signals, |_| PumpEvent::Quit);
        assert!(outcome.aborted);
        assert_eq!(outcome.preflight, PreflightPhase::Checking);
        assert!(signals.sends.is_empty());
        assert!(outcome.status_banner().unwrap().starts_with("STARTUP ABORTED"));
    }
}
