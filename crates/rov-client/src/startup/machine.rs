//! 启动状态机（纯转换函数）
//!
//! 两级状态机都不涉及线程与时间源：调用方传入观测值和已用时间，
//! 状态机只返回下一状态与需要执行的动作，便于单元测试。

use rov_protocol::{MOTOR_COUNT, MotorId};
use std::time::Duration;

/// 全部电机的位掩码
pub const ALL_MOTORS: u8 = ((1u16 << MOTOR_COUNT) - 1) as u8;

// ==================== 就绪状态 ====================

/// 重试计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryCounters {
    /// 预检轮询次数
    pub preflight_ticks: u32,
    /// 触发的视频重连次数
    pub video_reconnects: u32,
    /// 控制器重新枚举次数
    pub controller_rescans: u32,
    /// 电机初始化发送轮数（含首轮）
    pub motor_attempts: u32,
}

/// 启动就绪状态
///
/// 各标志只会由 `false` 变为 `true`；`force_override` 一旦置位在本次会话内不可撤销。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessState {
    pub video_ready: bool,
    pub controller_ready: bool,
    pub sensor_ready: bool,
    pub command_path_ready: bool,
    pub motors_ready: bool,
    pub retry: RetryCounters,
    pub force_override: bool,
}

impl ReadinessState {
    /// 四项预检是否全部就绪
    pub fn preflight_complete(&self) -> bool {
        self.video_ready && self.controller_ready && self.sensor_ready && self.command_path_ready
    }

    /// 未就绪的预检项名称
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.video_ready, "video"),
            (self.controller_ready, "controller"),
            (self.sensor_ready, "telemetry"),
            (self.command_path_ready, "command path"),
        ]
        .into_iter()
        .filter(|(ready, _)| !ready)
        .map(|(_, name)| name)
        .collect()
    }

    fn absorb(&mut self, obs: &Observation) {
        self.video_ready |= obs.video;
        self.controller_ready |= obs.controller;
        self.sensor_ready |= obs.telemetry;
        self.command_path_ready |= obs.command_path;
    }
}

// ==================== 预检状态机 ====================

/// 预检阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightPhase {
    /// 检查中
    Checking,
    /// 四项全部就绪
    Ready,
    /// 操作员强制跳过
    Forced,
    /// 超出时限，带缺失项继续
    Degraded,
}

impl PreflightPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PreflightPhase::Checking)
    }
}

/// 单次轮询的观测值
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Observation {
    pub video: bool,
    pub controller: bool,
    pub telemetry: bool,
    pub command_path: bool,
    /// 本次轮询期间检测到操作员按键
    pub override_pressed: bool,
    /// 自预检开始经过的时间
    pub elapsed: Duration,
}

/// 预检状态机要求执行的动作
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreflightAction {
    pub reconnect_video: bool,
    pub rescan_controller: bool,
}

/// 预检状态机：`Checking → Ready | Forced | Degraded`
#[derive(Debug, Clone)]
pub struct PreflightMachine {
    phase: PreflightPhase,
    state: ReadinessState,
    timeout: Duration,
    video_reconnect_after: Duration,
    /// 上次视频重连（或预检开始）时的 elapsed
    video_window_start: Duration,
}

impl PreflightMachine {
    /// # 参数
    ///
    /// - `timeout`: 预检总时限，超时进入 `Degraded`
    /// - `video_reconnect_after`: 视频持续未就绪多久后请求一次重连
    pub fn new(timeout: Duration, video_reconnect_after: Duration) -> Self {
        Self {
            phase: PreflightPhase::Checking,
            state: ReadinessState::default(),
            timeout,
            video_reconnect_after,
            video_window_start: Duration::ZERO,
        }
    }

    pub fn phase(&self) -> PreflightPhase {
        self.phase
    }

    pub fn state(&self) -> &ReadinessState {
        &self.state
    }

    pub fn into_state(self) -> ReadinessState {
        self.state
    }

    /// 推进一步
    ///
    /// 优先级：操作员按键 > 全部就绪 > 超时。终态下调用无效果。
    pub fn step(&mut self, obs: Observation) -> PreflightAction {
        if self.phase.is_terminal() {
            return PreflightAction::default();
        }
        self.state.retry.preflight_ticks += 1;
        self.state.absorb(&obs);

        if obs.override_pressed {
            self.state.force_override = true;
            self.phase = PreflightPhase::Forced;
            return PreflightAction::default();
        }
        if self.state.preflight_complete() {
            self.phase = PreflightPhase::Ready;
            return PreflightAction::default();
        }
        if obs.elapsed >= self.timeout {
            self.phase = PreflightPhase::Degraded;
            return PreflightAction::default();
        }

        let mut action = PreflightAction::default();
        if !self.state.video_ready
            && obs.elapsed.saturating_sub(self.video_window_start) >= self.video_reconnect_after
        {
            action.reconnect_video = true;
            self.video_window_start = obs.elapsed;
            self.state.retry.video_reconnects += 1;
        }
        if !self.state.controller_ready {
            action.rescan_controller = true;
            self.state.retry.controller_rescans += 1;
        }
        action
    }
}

// ==================== 电机初始化状态机 ====================

/// 电机初始化阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorInitPhase {
    /// 首轮：六路全部发送
    Init,
    /// 重发未成功的通道（第 `attempt` 次重试）
    Retrying { attempt: u32 },
    /// 全部通道发送成功
    Ready,
    /// 操作员强制结束，或预检被强制跳过后只跑一轮
    Forced,
    /// 重试用尽仍有通道未发送（`unsent` 为位掩码）
    PartialFailure { unsent: u8 },
}

impl MotorInitPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MotorInitPhase::Ready | MotorInitPhase::Forced | MotorInitPhase::PartialFailure { .. }
        )
    }
}

/// 电机初始化状态机：`Init → Retrying → Ready | Forced | PartialFailure`
#[derive(Debug, Clone)]
pub struct MotorInitMachine {
    phase: MotorInitPhase,
    max_retries: u32,
    single_pass: bool,
    retries_used: u32,
    /// 终止时未发送的通道
    unsent: u8,
}

impl MotorInitMachine {
    /// # 参数
    ///
    /// - `max_retries`: 首轮之后最多重试的轮数
    /// - `single_pass`: 只跑首轮（预检被强制跳过时使用）
    pub fn new(max_retries: u32, single_pass: bool) -> Self {
        Self {
            phase: MotorInitPhase::Init,
            max_retries,
            single_pass,
            retries_used: 0,
            unsent: ALL_MOTORS,
        }
    }

    pub fn phase(&self) -> MotorInitPhase {
        self.phase
    }

    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }

    /// 尚未发送成功的通道（位掩码）
    pub fn unsent(&self) -> u8 {
        self.unsent
    }

    /// 开始一轮发送
    ///
    /// # 参数
    ///
    /// - `initialized`: 已发送成功的通道位掩码
    ///
    /// # 返回
    ///
    /// 本轮需要发送的通道位掩码；已处于终态或无需发送时返回 `None`
    /// （后者直接进入 `Ready`）。
    pub fn begin_attempt(&mut self, initialized: u8) -> Option<u8> {
        if self.phase.is_terminal() {
            return None;
        }
        let pending = ALL_MOTORS & !initialized;
        self.unsent = pending;
        if pending == 0 {
            self.phase = MotorInitPhase::Ready;
            return None;
        }
        Some(pending)
    }

    /// 结束一轮发送
    ///
    /// # 参数
    ///
    /// - `initialized`: 本轮结束后已发送成功的通道位掩码
    /// - `override_pressed`: 本轮期间检测到操作员按键
    pub fn complete_attempt(&mut self, initialized: u8, override_pressed: bool) -> MotorInitPhase {
        if self.phase.is_terminal() {
            return self.phase;
        }
        self.unsent = ALL_MOTORS & !initialized;

        self.phase = if self.unsent == 0 {
            MotorInitPhase::Ready
        } else if override_pressed || self.single_pass {
            MotorInitPhase::Forced
        } else if self.retries_used >= self.max_retries {
            MotorInitPhase::PartialFailure {
                unsent: self.unsent,
            }
        } else {
            self.retries_used += 1;
            MotorInitPhase::Retrying {
                attempt: self.retries_used,
            }
        };
        self.phase
    }

    /// 在两轮之间收到操作员按键
    pub fn force(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = MotorInitPhase::Forced;
        }
    }
}

/// 位掩码展开为电机编号
pub fn motors_in(mask: u8) -> impl Iterator<Item = MotorId> {
    MotorId::all().filter(move |m| mask & m.bit() != 0)
}
