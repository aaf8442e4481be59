//! # 深度/温度记录
//!
//! 录制期间按固定间隔采样；只记录 `depth > 0` 的样本，深度取负值（水面以下为负）。
//! 保存为两列等长数组：
//!
//! ```json
//! {
//!   "temperature": [22.5, 22.4],
//!   "depth": [-1.24, -1.31]
//! }
//! ```

use crate::ConfigError;
use rov_protocol::SensorSample;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// 深度/温度记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorLog {
    pub temperature: Vec<f64>,
    pub depth: Vec<f64>,
}

impl SensorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个样本
    ///
    /// # 返回
    ///
    /// 样本被记录返回 `true`（`depth <= 0` 的样本丢弃）
    pub fn record(&mut self, sample: SensorSample) -> bool {
        if sample.depth > 0.0 {
            self.depth.push(-sample.depth);
            self.temperature.push(sample.temperature);
            true
        } else {
            false
        }
    }

    /// 已记录的样本数（两列取短）
    pub fn len(&self) -> usize {
        self.temperature.len().min(self.depth.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 截断到两列等长
    pub fn truncated(&self) -> SensorLog {
        let n = self.len();
        SensorLog {
            temperature: self.temperature[..n].to_vec(),
            depth: self.depth[..n].to_vec(),
        }
    }

    /// 写出 JSON 文件（缩进格式）
    ///
    /// # 返回
    ///
    /// 写出的样本数
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<usize, ConfigError> {
        let path = path.as_ref();
        let log = self.truncated();
        fs::write(path, serde_json::to_string_pretty(&log)?)?;
        info!("Saved {} sensor samples to {}", log.len(), path.display());
        Ok(log.len())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_skips_surface_samples() {
        let mut log = SensorLog::new();
        assert!(log.record(SensorSample {
            depth: 1.24,
            temperature: 22.5,
        }));
        assert!(!log.record(SensorSample::SENTINEL));
        assert!(!log.record(SensorSample {
            depth: 0.0,
            temperature: 21.0,
        }));

        assert_eq!(log.len(), 1);
        assert_eq!(log.depth, vec![-1.24]);
        assert_eq!(log.temperature, vec![22.5]);
    }

    #[test]
    fn test_truncated_to_shorter_column() {
        let log = SensorLog {
            temperature: vec![20.0, 21.0, 22.0],
            depth: vec![-1.0, -2.0],
        };
        assert_eq!(log.len(), 2);
        assert_eq!(log.truncated().temperature, vec![20.0, 21.0]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qsensor_log.json");

        let mut log = SensorLog::new();
        for i in 1..=3 {
            log.record(SensorSample {
                depth: i as f64,
                temperature: 20.0 + i as f64,
            });
        }
        assert_eq!(log.save(&path).unwrap(), 3);

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"temperature\""));
        assert!(text.contains('\n'));

        let loaded = SensorLog::load(&path).unwrap();
        assert_eq!(loaded, log);
        assert_eq!(loaded.depth, vec![-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_save_empty_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        assert_eq!(SensorLog::new().save(&path).unwrap(), 0);
        assert!(SensorLog::load(&path).unwrap().is_empty());
    }
}
