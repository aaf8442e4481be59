//! # 推力曲线文件
//!
//! `curve.json` 以 `m0`..`m5` 为键，每项包含 8 个曲线参数（另有可选的
//! `num` 字段，读取时忽略）：
//!
//! ```json
//! {
//!   "m0": {"num": 0, "np_mid": 2717.21, "np_ini": 2921.03, "pp_ini": 3066.62,
//!          "pp_mid": 3212.21, "nt_end": -931.92, "nt_mid": -137.17,
//!          "pt_mid": 165.37, "pt_end": 1329.89},
//!   ...
//! }
//! ```

use crate::ConfigError;
use rov_driver::MotorTable;
use rov_protocol::{MOTOR_COUNT, MotorCalibration, MotorId};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// 解析 `curve.json` 内容
///
/// # 错误
///
/// - JSON 语法错误: `ConfigError::Json`
/// - 任一电机或参数缺失/非数值: `ConfigError::MissingParameter`（如 `"m3.pt_end"`）
pub fn parse_curve_json(content: &str) -> Result<[MotorCalibration; MOTOR_COUNT], ConfigError> {
    let root: Value = serde_json::from_str(content)?;
    let motors = root
        .as_object()
        .ok_or_else(|| ConfigError::MissingParameter("m0".to_string()))?;

    let mut table = [MotorCalibration::DEFAULT; MOTOR_COUNT];
    for motor in MotorId::all() {
        let key = motor.to_string();
        let entry = motors
            .get(&key)
            .and_then(Value::as_object)
            .ok_or_else(|| ConfigError::MissingParameter(key.clone()))?;
        table[motor.index()] = parse_motor(&key, entry)?;
    }
    Ok(table)
}

fn parse_motor(key: &str, entry: &Map<String, Value>) -> Result<MotorCalibration, ConfigError> {
    let mut values = [0.0; 8];
    for (slot, field) in values.iter_mut().zip(MotorCalibration::FIELD_NAMES) {
        *slot = entry
            .get(field)
            .and_then(Value::as_f64)
            .ok_or_else(|| ConfigError::MissingParameter(format!("{key}.{field}")))?;
    }
    let [np_mid, np_ini, pp_ini, pp_mid, nt_end, nt_mid, pt_mid, pt_end] = values;
    Ok(MotorCalibration {
        np_mid,
        np_ini,
        pp_ini,
        pp_mid,
        nt_end,
        nt_mid,
        pt_mid,
        pt_end,
    })
}

/// 读取推力曲线文件
pub fn read_motor_table<P: AsRef<Path>>(path: P) -> Result<MotorTable, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(MotorTable::new(parse_curve_json(&content)?))
}

/// 读取推力曲线文件，失败时回退到出厂曲线
///
/// 文件缺失或损坏不是致命错误：记录警告后使用 [`MotorCalibration::DEFAULT`]。
pub fn load_motor_table<P: AsRef<Path>>(path: P) -> MotorTable {
    let path = path.as_ref();
    match read_motor_table(path) {
        Ok(table) => {
            info!("Loaded thrust curves from {}", path.display());
            table
        },
        Err(e) => {
            warn!(
                "Failed to load thrust curves from {}: {}, using defaults",
                path.display(),
                e
            );
            MotorTable::default()
        },
    }
}

/// 写出推力曲线文件（带 `num` 字段，与读取格式一致）
pub fn write_curve_json<P: AsRef<Path>>(
    path: P,
    table: &[MotorCalibration; MOTOR_COUNT],
) -> Result<(), ConfigError> {
    let mut root = Map::new();
    for motor in MotorId::all() {
        let mut entry = Map::new();
        entry.insert("num".to_string(), Value::from(motor.index()));
        let values = table[motor.index()].to_array();
        for (field, value) in MotorCalibration::FIELD_NAMES.iter().zip(values) {
            entry.insert((*field).to_string(), Value::from(value));
        }
        root.insert(motor.to_string(), Value::Object(entry));
    }
    fs::write(path, serde_json::to_string_pretty(&Value::Object(root))?)?;
    Ok(())
}
