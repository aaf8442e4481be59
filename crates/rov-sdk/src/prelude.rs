//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use rov_sdk::prelude::*;
//! ```

// 协议层
pub use crate::protocol::{CommandVector, MOTOR_COUNT, MotorCalibration, MotorId, SensorSample};

// 驱动层
pub use crate::driver::{
    MotorTable, TelemetryLink, TelemetryLinkBuilder, TriggerOutcome, TriggerPolicy,
};

// 视频层
pub use crate::video::{
    CameraCalibration, DecoderConfig, Frame, FrameCapture, IngestOptions, VideoIngest,
};

// 客户端层
pub use crate::client::{
    PumpEvent, ReadinessOutcome, RecorderConfig, SensorRecorder, SequencerConfig,
    StartupSequencer, StartupSignals, StationSignals, VideoSupervisor,
};

// 工具层
pub use crate::tools::{SensorLog, StationConfig, load_motor_table};

// 错误类型
pub use crate::client::ClientError;
pub use crate::driver::LinkError;
pub use crate::protocol::ProtocolError;
pub use crate::tools::ConfigError;
pub use crate::video::VideoError;
