//! Builder 模式实现
//!
//! 提供链式构造 `TelemetryLink` 实例的便捷方式。

use crate::error::{LinkError, TransportError};
use crate::link::TelemetryLink;
use crate::pipeline::PipelineConfig;
use crate::signal::TriggerPolicy;
use crate::state::MotorTable;
use crate::transport::{DatagramTransport, UdpTransport};
use rov_protocol::CommandVector;
use std::time::Duration;
use tracing::info;

/// TelemetryLink Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use rov_driver::{TelemetryLinkBuilder, TriggerPolicy};
///
/// let link = TelemetryLinkBuilder::new()
///     .remote("192.168.0.10:5000")
///     .local_port(5001)
///     .trigger_policy(TriggerPolicy::Coalesce)
///     .build()
///     .unwrap();
/// ```
pub struct TelemetryLinkBuilder {
    /// 远端地址（`host:port`）
    remote: Option<String>,
    /// 本地绑定端口（0 表示由系统分配）
    local_port: u16,
    /// 电机标定表（默认使用内置标定）
    motors: Option<MotorTable>,
    /// 初始控制向量（通常携带舵机初始位置）
    initial_command: CommandVector,
    /// 触发合并策略
    policy: TriggerPolicy,
    /// 链路线程参数
    pipeline: PipelineConfig,
}

impl TelemetryLinkBuilder {
    pub fn new() -> Self {
        Self {
            remote: None,
            local_port: 0,
            motors: None,
            initial_command: CommandVector::default(),
            policy: TriggerPolicy::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    /// 设置远端地址（必需，UDP 模式）
    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }

    /// 设置本地绑定端口（可选，默认由系统分配）
    pub fn local_port(mut self, port: u16) -> Self {
        self.local_port = port;
        self
    }

    /// 设置电机标定表（可选）
    pub fn motors(mut self, motors: MotorTable) -> Self {
        self.motors = Some(motors);
        self
    }

    /// 设置初始控制向量（可选）
    pub fn initial_command(mut self, command: CommandVector) -> Self {
        self.initial_command = command;
        self
    }

    /// 设置触发合并策略（可选，默认 `Coalesce`）
    pub fn trigger_policy(mut self, policy: TriggerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 设置相邻电机标定数据报的发送间隔（可选，默认 50ms）
    pub fn motor_init_gap(mut self, gap: Duration) -> Self {
        self.pipeline.motor_init_gap = gap;
        self
    }

    /// 绑定 UDP socket 并启动链路线程
    ///
    /// # 错误
    /// - `LinkError::Transport`: 远端地址未设置/无法解析，或本地端口绑定失败
    pub fn build(self) -> Result<TelemetryLink, LinkError> {
        let remote = self
            .remote
            .clone()
            .ok_or_else(|| TransportError::AddrResolve("remote address not set".to_string()))?;

        let transport = UdpTransport::bind(self.local_port, remote.as_str())?;
        let local_addr = transport.local_addr()?;
        info!(
            "Telemetry link bound to {} (remote {})",
            local_addr,
            transport.remote_addr()
        );

        Ok(self.spawn(transport, Some(local_addr)))
    }

    /// 使用自定义传输层启动链路（测试或非 UDP 链路）
    pub fn build_with_transport(self, transport: impl DatagramTransport + 'static) -> TelemetryLink {
        self.spawn(transport, None)
    }

    fn spawn(
        self,
        transport: impl DatagramTransport + 'static,
        local_addr: Option<std::net::SocketAddr>,
    ) -> TelemetryLink {
        TelemetryLink::spawn(
            transport,
            self.motors.unwrap_or_default(),
            self.initial_command,
            self.policy,
            self.pipeline,
            local_addr,
        )
    }
}

impl Default for TelemetryLinkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
