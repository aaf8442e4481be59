//! # ROV Protocol
//!
//! 地面站与水下机器人之间的 UDP 数据报协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `command`: 控制指令（推进 + 舵机）
//! - `motor`: 电机推力曲线标定参数与 `thrust_init` 指令
//! - `telemetry`: 深度/温度遥测解析
//!
//! ## 帧格式
//!
//! 每个数据报恰好承载一个 JSON 对象，以 `\n` 结尾：
//!
//! ```text
//! 上行（地面站 → ROV）
//!   {"x":f,"y":f,"z":f,"yaw":f,"servo0":f}\n
//!   {"cmd":"thrust_init","motor":n,"np_mid":f,...,"pt_end":f}\n
//! 下行（ROV → 地面站）
//!   {"depth":f,"temperature":f}
//! ```

pub mod command;
pub mod motor;
pub mod telemetry;

pub use command::CommandVector;
pub use motor::{MOTOR_COUNT, MotorCalibration, MotorId, ThrustInit};
pub use telemetry::{SensorSample, decode_telemetry};

use thiserror::Error;

/// 接收缓冲区大小（单个遥测数据报的最大字节数）
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// 协议错误类型
///
/// 入站数据报的协议错误由链路层静默丢弃，不会向上层传播。
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON 编解码失败
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 数据报不是合法的 UTF-8
    #[error("Datagram is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// 电机编号越界（有效范围 0..6）
    #[error("Invalid motor index: {index} (expected 0..6)")]
    InvalidMotorIndex { index: u8 },
}

/// 将任意可序列化消息编码为一行 JSON（带结尾换行）
pub(crate) fn encode_line<T: serde::Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = serde_json::to_vec(message)?;
    buf.push(b'\n');
    Ok(buf)
}
