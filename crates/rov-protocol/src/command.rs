//! 控制指令
//!
//! 每个控制周期由主线程写入一份最新的 `CommandVector`，由链路线程编码发送。
//! 不保留历史，新值直接覆盖旧值。

use crate::{ProtocolError, encode_line};
use serde::{Deserialize, Serialize};

/// 推进/舵机控制向量
///
/// 字段顺序即线上 JSON 的字段顺序：`x, y, z, yaw, servo0`。
///
/// # Example
///
/// ```
/// use rov_protocol::CommandVector;
///
/// let cmd = CommandVector::with_servo(0.5);
/// assert_eq!(
///     cmd.encode().unwrap(),
///     b"{\"x\":0.0,\"y\":0.0,\"z\":0.0,\"yaw\":0.0,\"servo0\":0.5}\n"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandVector {
    /// 横移
    pub x: f64,
    /// 前后
    pub y: f64,
    /// 升沉
    pub z: f64,
    /// 艏向
    pub yaw: f64,
    /// 舵机位置
    #[serde(rename = "servo0")]
    pub servo_position: f64,
}

impl CommandVector {
    /// 推进量全零，仅设置舵机位置（上电初始指令）
    pub fn with_servo(servo_position: f64) -> Self {
        Self {
            servo_position,
            ..Self::default()
        }
    }

    /// 编码为一行 JSON 数据报
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_line(self)
    }
}
