//! TelemetryLink 对外 API
//!
//! 主线程持有 `TelemetryLink`，链路线程持有传输层。
//! 除 [`TelemetryLink::wait_for_telemetry`]、[`TelemetryLink::wait_idle`] 和关闭流程外，
//! 所有方法都不阻塞调用方。

use crate::error::LinkError;
use crate::metrics::{LinkMetrics, LinkMetricsSnapshot};
use crate::pipeline::{PipelineConfig, exchange_loop};
use crate::signal::{LinkSignal, TriggerOutcome, TriggerPolicy};
use crate::state::{MotorChannel, MotorTable, VehicleContext};
use crate::thread::JoinTimeout;
use crate::transport::DatagramTransport;
use rov_protocol::{CommandVector, MotorId, SensorSample};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// 连通性测试期间重新触发交换的间隔
const TELEMETRY_RETRIGGER_INTERVAL: Duration = Duration::from_millis(20);

/// 指令/遥测链路
///
/// # Example
///
/// ```rust,no_run
/// use rov_driver::TelemetryLinkBuilder;
/// use rov_protocol::CommandVector;
///
/// let link = TelemetryLinkBuilder::new()
///     .remote("192.168.21.201:5000")
///     .local_port(5001)
///     .build()
///     .unwrap();
///
/// link.send_command(CommandVector::with_servo(0.5));
/// println!("depth = {}", link.sensor().depth);
/// ```
pub struct TelemetryLink {
    /// 共享状态上下文
    ctx: Arc<VehicleContext>,
    /// 触发信号（含运行标志）
    signal: Arc<LinkSignal>,
    /// 性能指标
    metrics: Arc<LinkMetrics>,
    /// 链路线程句柄（stop 时 join）
    worker: Option<JoinHandle<()>>,
    /// 本地绑定地址（内存传输时为 None）
    local_addr: Option<SocketAddr>,
}

impl TelemetryLink {
    /// 线程退出等待时间
    pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

    /// 在任意传输层上启动链路（默认电机表与合并策略）
    pub fn new(transport: impl DatagramTransport + 'static) -> Self {
        Self::spawn(
            transport,
            MotorTable::default(),
            CommandVector::default(),
            TriggerPolicy::default(),
            PipelineConfig::default(),
            None,
        )
    }

    pub(crate) fn spawn(
        transport: impl DatagramTransport + 'static,
        motors: MotorTable,
        initial_command: CommandVector,
        policy: TriggerPolicy,
        config: PipelineConfig,
        local_addr: Option<SocketAddr>,
    ) -> Self {
        let ctx = Arc::new(VehicleContext::new(motors, initial_command));
        let signal = Arc::new(LinkSignal::new(policy));
        let metrics = Arc::new(LinkMetrics::new());

        let ctx_clone = ctx.clone();
        let signal_clone = signal.clone();
        let metrics_clone = metrics.clone();
        let worker = spawn(move || {
            exchange_loop(transport, ctx_clone, signal_clone, metrics_clone, config);
        });

        info!(
            "Telemetry link started (policy: {:?}, motor init gap {:?})",
            policy, config.motor_init_gap
        );

        Self {
            ctx,
            signal,
            metrics,
            worker: Some(worker),
            local_addr,
        }
    }

    /// 请求一次交换周期（非阻塞）
    ///
    /// 周期执行中到达的触发按 [`TriggerPolicy`] 合并或丢弃，
    /// 同一时刻最多只有一个周期在执行。
    pub fn trigger(&self) -> TriggerOutcome {
        let outcome = self.signal.trigger();
        match outcome {
            TriggerOutcome::Coalesced => {
                self.metrics.triggers_coalesced.fetch_add(1, Ordering::Relaxed);
            },
            TriggerOutcome::Dropped => {
                self.metrics.triggers_dropped.fetch_add(1, Ordering::Relaxed);
            },
            TriggerOutcome::Scheduled | TriggerOutcome::Stopped => {},
        }
        outcome
    }

    /// 更新控制向量（不触发发送）
    pub fn set_command(&self, command: CommandVector) {
        self.ctx.command.store(Arc::new(command));
    }

    /// 更新控制向量并触发一次交换
    pub fn send_command(&self, command: CommandVector) -> TriggerOutcome {
        self.set_command(command);
        self.trigger()
    }

    /// 排队下发一个电机通道的标定参数
    ///
    /// # 参数
    /// - `channel`: 电机编号（0..6）
    ///
    /// # 错误
    /// - `LinkError::InvalidChannel`: 编号越界
    /// - `LinkError::Stopped`: 链路已停止
    pub fn send_motor_init(&self, channel: u8) -> Result<(), LinkError> {
        let motor = MotorId::try_from(channel).map_err(|_| LinkError::InvalidChannel(channel))?;
        if self.signal.queue_motor_init(motor) {
            Ok(())
        } else {
            Err(LinkError::Stopped)
        }
    }

    /// 重新下发全部六个通道的标定参数
    pub fn redeploy(&self) -> Result<(), LinkError> {
        info!("Redeploying motor calibration to all channels");
        for motor in MotorId::all() {
            if !self.signal.queue_motor_init(motor) {
                return Err(LinkError::Stopped);
            }
        }
        Ok(())
    }

    /// 最近遥测快照
    pub fn sensor(&self) -> SensorSample {
        self.ctx.sensor()
    }

    /// 当前控制向量快照
    pub fn command(&self) -> CommandVector {
        self.ctx.command()
    }

    /// 是否已收到至少一个有效遥测
    pub fn telemetry_ready(&self) -> bool {
        self.ctx.samples_received() > 0
    }

    /// 是否已有至少一个指令数据报无错误发出
    pub fn command_path_ready(&self) -> bool {
        self.metrics.commands_sent.load(Ordering::Relaxed) > 0
    }

    /// 指定通道的标定是否已成功发送（越界编号返回 false）
    pub fn motor_initialized(&self, channel: u8) -> bool {
        MotorId::try_from(channel)
            .map(|m| self.ctx.motors.is_initialized(m))
            .unwrap_or(false)
    }

    pub fn all_motors_initialized(&self) -> bool {
        self.ctx.motors.all_initialized()
    }

    /// 是否还有电机标定在排队或逐条发送中
    pub fn motor_inits_pending(&self) -> bool {
        self.signal.motor_inits_pending()
    }

    /// 全部电机通道快照
    pub fn motor_channels(&self) -> Vec<MotorChannel> {
        self.ctx.motors.channels()
    }

    /// 获取性能指标快照
    pub fn metrics(&self) -> LinkMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 已完成的交换周期数
    pub fn cycles_completed(&self) -> u64 {
        self.signal.cycles_completed()
    }

    /// 共享状态上下文（供录制线程等只读消费者使用）
    pub fn context(&self) -> &Arc<VehicleContext> {
        &self.ctx
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.signal.policy()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 等待所有已排队工作执行完毕
    ///
    /// # 错误
    /// - `LinkError::Timeout`: 超时仍有工作未完成
    pub fn wait_idle(&self, timeout: Duration) -> Result<(), LinkError> {
        if self.signal.wait_idle(timeout) {
            Ok(())
        } else {
            Err(LinkError::Timeout)
        }
    }

    /// 连通性测试：阻塞调用线程，直到收到新的遥测或超时
    ///
    /// 等待期间周期性触发交换，使链路线程有机会读到迟到的回复。
    /// 仅供 CLI 连通性测试使用，主循环不得调用。
    ///
    /// # 错误
    /// - `LinkError::Timeout`: 窗口内未收到新采样
    /// - `LinkError::Stopped`: 链路已停止
    pub fn wait_for_telemetry(&self, timeout: Duration) -> Result<SensorSample, LinkError> {
        let deadline = Instant::now() + timeout;
        let seen = self.ctx.samples_received();

        loop {
            if self.trigger() == TriggerOutcome::Stopped {
                return Err(LinkError::Stopped);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if let Some(sample) = self
                .ctx
                .wait_sample_after(seen, remaining.min(TELEMETRY_RETRIGGER_INTERVAL))
            {
                return Ok(sample);
            }
            if Instant::now() >= deadline {
                return Err(LinkError::Timeout);
            }
        }
    }

    /// 链路线程是否仍在运行
    pub fn is_alive(&self) -> bool {
        self.signal.is_running()
            && self.worker.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// 停止链路线程（幂等）
    ///
    /// 置位运行标志并唤醒线程，带超时 join；超时只记录日志。
    pub fn stop(&mut self) {
        self.signal.stop();

        if let Some(handle) = self.worker.take() {
            if let Err(_e) = handle.join_timeout(Self::JOIN_TIMEOUT) {
                error!(
                    "Link thread panicked or failed to shut down within {:?}",
                    Self::JOIN_TIMEOUT
                );
            } else {
                info!("Telemetry link stopped");
            }
        }
    }
}

impl Drop for TelemetryLink {
    fn drop(&mut self) {
        self.stop();
    }
}
