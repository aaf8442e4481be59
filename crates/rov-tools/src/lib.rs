//! # ROV Tools - 配置与数据文件
//!
//! **依赖原则**: 只依赖 `rov-protocol` 与 `rov-driver` 的纯数据类型，
//! 不引入任何线程或进程。
//!
//! ## 包含模块
//!
//! - `config` - 地面站 TOML 配置
//! - `calibration` - 推力曲线文件（`curve.json`）
//! - `sensor_log` - 深度/温度记录文件

pub mod calibration;
pub mod config;
mod error;
pub mod sensor_log;

pub use calibration::{load_motor_table, parse_curve_json, read_motor_table, write_curve_json};
pub use config::{
    CameraSection, CurveSection, LinkSection, MainLoopSection, RecorderSection, ServoSection,
    StartupSection, StationConfig, TriggerPolicySetting,
};
pub use error::ConfigError;
pub use sensor_log::SensorLog;
