//! 电机推力曲线标定
//!
//! 六个推进电机各自有一组 8 点推力曲线参数，启动时通过 `thrust_init` 指令
//! 下发到 ROV。参数含义：
//!
//! - `np_*` / `pp_*`: 负/正方向 PWM 曲线点（mid / ini）
//! - `nt_*` / `pt_*`: 负/正方向推力曲线点（end / mid）

use crate::{ProtocolError, encode_line};
use serde::{Deserialize, Serialize};

/// 推进电机数量
pub const MOTOR_COUNT: usize = 6;

/// 电机编号（0..6）
///
/// 构造时校验范围，持有 `MotorId` 即保证编号合法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MotorId(u8);

impl MotorId {
    /// 全部电机编号（0..6）
    pub fn all() -> impl Iterator<Item = MotorId> {
        (0..MOTOR_COUNT as u8).map(MotorId)
    }

    /// 编号数值
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// 位掩码中的位（bit k 对应电机 k）
    pub fn bit(self) -> u8 {
        1 << self.0
    }
}

impl TryFrom<u8> for MotorId {
    type Error = ProtocolError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        if (index as usize) < MOTOR_COUNT {
            Ok(MotorId(index))
        } else {
            Err(ProtocolError::InvalidMotorIndex { index })
        }
    }
}

impl std::fmt::Display for MotorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// 单个电机的推力曲线参数（8 个浮点数）
///
/// 字段顺序即线上 JSON 的字段顺序。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorCalibration {
    pub np_mid: f64,
    pub np_ini: f64,
    pub pp_ini: f64,
    pub pp_mid: f64,
    pub nt_end: f64,
    pub nt_mid: f64,
    pub pt_mid: f64,
    pub pt_end: f64,
}

impl MotorCalibration {
    /// 出厂默认曲线（标定文件缺失或损坏时使用）
    pub const DEFAULT: MotorCalibration = MotorCalibration {
        np_mid: 2717.21,
        np_ini: 2921.03,
        pp_ini: 3066.62,
        pp_mid: 3212.21,
        nt_end: -931.92,
        nt_mid: -137.17,
        pt_mid: 165.37,
        pt_end: 1329.89,
    };

    /// 字段名（线上顺序）
    pub const FIELD_NAMES: [&'static str; 8] = [
        "np_mid", "np_ini", "pp_ini", "pp_mid", "nt_end", "nt_mid", "pt_mid", "pt_end",
    ];

    /// 按线上顺序展开为数组
    pub fn to_array(&self) -> [f64; 8] {
        [
            self.np_mid,
            self.np_ini,
            self.pp_ini,
            self.pp_mid,
            self.nt_end,
            self.nt_mid,
            self.pt_mid,
            self.pt_end,
        ]
    }
}

impl Default for MotorCalibration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// `thrust_init` 指令
///
/// ```
/// use rov_protocol::{MotorCalibration, MotorId, ThrustInit};
///
/// let motor = MotorId::try_from(2).unwrap();
/// let msg = ThrustInit::new(motor, &MotorCalibration::DEFAULT);
/// let line = String::from_utf8(msg.encode().unwrap()).unwrap();
/// assert!(line.starts_with("{\"cmd\":\"thrust_init\",\"motor\":2,\"np_mid\":2717.21"));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ThrustInit<'a> {
    cmd: &'static str,
    motor: u8,
    #[serde(flatten)]
    calibration: &'a MotorCalibration,
}

impl<'a> ThrustInit<'a> {
    /// 指令名
    pub const CMD: &'static str = "thrust_init";

    pub fn new(motor: MotorId, calibration: &'a MotorCalibration) -> Self {
        Self {
            cmd: Self::CMD,
            motor: motor.0,
            calibration,
        }
    }

    /// 编码为一行 JSON 数据报
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_line(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_id_range() {
        assert!(MotorId::try_from(0).is_ok());
        assert!(MotorId::try_from(5).is_ok());
        match MotorId::try_from(6) {
            Err(ProtocolError::InvalidMotorIndex { index }) => assert_eq!(index, 6),
            other => panic!("Expected InvalidMotorIndex, got {:?}", other),
        }
        assert_eq!(MotorId::all().count(), MOTOR_COUNT);
    }

    #[test]
    fn test_motor_id_bits_are_distinct() {
        let mask = MotorId::all().fold(0u8, |acc, m| acc | m.bit());
        assert_eq!(mask, 0b0011_1111);
    }

    #[test]
    fn test_thrust_init_wire_format() {
        let motor = MotorId::try_from(4).unwrap();
        let line = ThrustInit::new(motor, &MotorCalibration::DEFAULT).encode().unwrap();
        let text = std::str::from_utf8(&line).unwrap();
        assert_eq!(
            text,
            "{\"cmd\":\"thrust_init\",\"motor\":4,\"np_mid\":2717.21,\"np_ini\":2921.03,\
             \"pp_ini\":3066.62,\"pp_mid\":3212.21,\"nt_end\":-931.92,\"nt_mid\":-137.17,\
             \"pt_mid\":165.37,\"pt_end\":1329.89}\n"
        );
    }

    #[test]
    fn test_calibration_array_order() {
        let arr = MotorCalibration::DEFAULT.to_array();
        assert_eq!(arr[0], 2717.21);
        assert_eq!(arr[4], -931.92);
        assert_eq!(arr[7], 1329.89);
    }
}
