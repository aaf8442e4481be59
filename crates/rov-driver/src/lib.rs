//! 驱动层模块
//!
//! 本模块提供地面站与 ROV 之间指令/遥测链路的后台 IO 功能，包括：
//! - 链路工作线程（唯一执行 socket IO 的线程）
//! - 触发合并（同一时刻最多一个交换周期在执行）
//! - 共享状态同步（ArcSwap 快照读取）
//! - 电机标定下发（按通道位掩码排队）
//! - 原子计数器指标
//!
//! # 使用场景
//!
//! 主线程每个 tick 调用 [`TelemetryLink::trigger`]，永不阻塞；
//! 启动阶段由 `rov-client` 的启动时序状态机调用 [`TelemetryLink::send_motor_init`]。

mod builder;
mod error;
mod link;
pub mod metrics;
pub mod pipeline;
pub mod signal;
pub mod state;
pub mod thread;
pub mod transport;

pub use builder::TelemetryLinkBuilder;
pub use error::{LinkError, TransportError};
pub use link::TelemetryLink;
pub use metrics::{LinkMetrics, LinkMetricsSnapshot};
pub use pipeline::PipelineConfig;
pub use signal::{TriggerOutcome, TriggerPolicy};
pub use state::{MotorChannel, MotorTable, VehicleContext};
pub use thread::JoinTimeout;
pub use transport::{DatagramTransport, UdpTransport};
