//! # ROV Video
//!
//! 实时视频采集：解码交给外部 ffmpeg 进程，本 crate 负责进程生命周期、
//! 帧读取线程、有界帧缓冲（丢最旧）以及可选的镜头去畸变。
//!
//! ## 模块
//!
//! - `capture`: 截图（JPEG）
//! - `decoder`: 解码进程参数
//! - `frame`: 帧与有界帧缓冲
//! - `diagnostics`: 解码诊断输出环形日志
//! - `undistort`: 相机标定与去畸变映射
//! - `ingest`: `VideoIngest` 采集实例
//!
//! 重连策略不在本 crate 内：见 `rov-client` 的 `VideoSupervisor`。

pub mod capture;
pub mod decoder;
pub mod diagnostics;
mod error;
pub mod frame;
pub mod ingest;
pub mod metrics;
pub mod undistort;

pub use capture::FrameCapture;
pub use decoder::{DecoderConfig, HwAccel};
pub use diagnostics::DiagnosticLog;
pub use error::VideoError;
pub use frame::{Frame, FrameBuffer};
pub use ingest::{IngestOptions, VideoIngest};
pub use metrics::{VideoMetrics, VideoMetricsSnapshot};
pub use undistort::{CameraCalibration, Roi, UndistortMap};
