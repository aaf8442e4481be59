//! 深度/温度遥测

use crate::ProtocolError;
use serde::{Deserialize, Serialize};

/// 传感器采样
///
/// 首个采样到达前为哨兵值 `(0.0, 0.0)`。缺失字段按 0.0 处理。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSample {
    /// 深度（米，原始值，不含偏移校正）
    pub depth: f64,
    /// 水温（°C）
    pub temperature: f64,
}

impl SensorSample {
    /// 哨兵值（尚未收到遥测）
    pub const SENTINEL: SensorSample = SensorSample {
        depth: 0.0,
        temperature: 0.0,
    };

    /// 是否仍为哨兵值
    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

/// 解析一个入站遥测数据报
///
/// 去除首尾空白（含 `\n`）后按 JSON 解析。调用方应丢弃返回的错误。
///
/// ```
/// use rov_protocol::decode_telemetry;
///
/// let sample = decode_telemetry(b"{\"depth\":1.24,\"temperature\":22.5}\n").unwrap();
/// assert_eq!(sample.depth, 1.24);
/// assert_eq!(sample.temperature, 22.5);
/// assert!(decode_telemetry(b"{depth").is_err());
/// ```
pub fn decode_telemetry(datagram: &[u8]) -> Result<SensorSample, ProtocolError> {
    let text = std::str::from_utf8(datagram)?;
    let sample = serde_json::from_str::<SensorSample>(text.trim())?;
    Ok(sample)
}
