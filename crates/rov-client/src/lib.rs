//! 地面站客户端层
//!
//! 把 `rov-driver`（指令/遥测链路）与 `rov-video`（视频采集）组织成
//! 主循环可直接使用的组件：
//!
//! - [`startup`]: 启动检查与电机初始化状态机
//! - [`video`]: `VideoSupervisor`，负责视频重连策略
//! - [`recorder`]: `SensorRecorder`，后台记录深度/温度
//!
//! 主线程只调用这些组件的非阻塞接口；所有阻塞 I/O 都在各自的后台线程中。

mod error;
pub mod recorder;
pub mod startup;
pub mod video;

pub use error::ClientError;
pub use recorder::{RecorderConfig, SensorRecorder};
pub use startup::{
    MotorInitMachine, MotorInitPhase, Observation, PreflightAction, PreflightMachine,
    PreflightPhase, PumpEvent, ReadinessOutcome, ReadinessState, RetryCounters, SequencerConfig,
    StartupSequencer, StartupSignals, StationSignals,
};
pub use video::VideoSupervisor;
