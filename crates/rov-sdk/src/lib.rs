//! ROV SDK - 水下机器人地面站核心
//!
//! 主循环之外的三个后台子系统，以及把它们接到一起的启动流程。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 指令/遥测 JSON 数据报
//! - **驱动层** (`driver`): `TelemetryLink` 链路线程与共享状态
//! - **视频层** (`video`): 外部解码进程、帧缓冲、去畸变
//! - **工具层** (`tools`): 配置、推力曲线、传感器日志文件
//! - **客户端层** (`client`): 启动状态机、视频重连、传感器记录
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use rov_sdk::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let link = TelemetryLinkBuilder::new()
//!     .remote("192.168.0.10:5000")
//!     .local_port(5001)
//!     .build()?;
//!
//! link.send_command(CommandVector::with_servo(0.5));
//! let sample = link.wait_for_telemetry(Duration::from_millis(500))?;
//! println!("depth {:.2} m, {:.1} °C", sample.depth, sample.temperature);
//! # Ok(())
//! # }
//! ```

pub use rov_client as client;
pub use rov_driver as driver;
pub use rov_protocol as protocol;
pub use rov_tools as tools;
pub use rov_video as video;

pub mod logging;
pub mod prelude;

// --- 常用类型 ---

pub use protocol::{CommandVector, MotorCalibration, MotorId, ProtocolError, SensorSample};

pub use driver::{LinkError, TelemetryLink, TelemetryLinkBuilder, TransportError, TriggerPolicy};

pub use video::{DecoderConfig, Frame, FrameCapture, VideoError, VideoIngest};

pub use client::{
    ClientError, ReadinessOutcome, SensorRecorder, StartupSequencer, StationSignals,
    VideoSupervisor,
};

pub use tools::{ConfigError, StationConfig};

pub use logging::init_logging;
