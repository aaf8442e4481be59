//! 启动流程
//!
//! - `machine`: 预检与电机初始化两级状态机（纯转换函数）
//! - `sequencer`: 在主线程上驱动状态机
//! - `signals`: 把链路、视频、输入设备接到状态机上

pub mod machine;
pub mod sequencer;
pub mod signals;

pub use machine::{
    ALL_MOTORS, MotorInitMachine, MotorInitPhase, Observation, PreflightAction, PreflightMachine,
    PreflightPhase, ReadinessState, RetryCounters,
};
pub use sequencer::{PumpEvent, ReadinessOutcome, SequencerConfig, StartupSequencer, StartupSignals};
pub use signals::StationSignals;
