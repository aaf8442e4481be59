//! # 地面站配置
//!
//! TOML 文件，每个字段都有默认值：文件里只需写要覆盖的项。
//!
//! ```toml
//! [link]
//! host = "192.168.0.10"
//! remote_port = 5000
//! local_port = 5001
//! trigger_policy = "coalesce"
//! motor_init_gap_ms = 50
//!
//! [camera]
//! host = "192.168.0.11"
//! width = 1280
//! height = 720
//!
//! [startup]
//! preflight_timeout_ms = 30000
//! ```

use crate::ConfigError;
use rov_driver::TriggerPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// 地面站完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub link: LinkSection,
    pub camera: CameraSection,
    pub startup: StartupSection,
    pub recorder: RecorderSection,
    pub curve: CurveSection,
    pub servo: ServoSection,
    pub main_loop: MainLoopSection,
}

/// 触发策略（配置文件写法）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicySetting {
    #[default]
    Coalesce,
    DropWhileBusy,
}

impl From<TriggerPolicySetting> for TriggerPolicy {
    fn from(setting: TriggerPolicySetting) -> Self {
        match setting {
            TriggerPolicySetting::Coalesce => TriggerPolicy::Coalesce,
            TriggerPolicySetting::DropWhileBusy => TriggerPolicy::DropWhileBusy,
        }
    }
}

/// `[link]` 指令/遥测链路
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSection {
    /// ROV 地址
    pub host: String,
    /// ROV 接收端口
    pub remote_port: u16,
    /// 本地绑定端口
    pub local_port: u16,
    pub trigger_policy: TriggerPolicySetting,
    /// 相邻两条电机标定数据报的间隔
    pub motor_init_gap_ms: u64,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            host: "192.168.0.10".to_string(),
            remote_port: 5000,
            local_port: 5001,
            trigger_policy: TriggerPolicySetting::default(),
            motor_init_gap_ms: 50,
        }
    }
}

/// `[camera]` RTSP 相机与解码进程
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSection {
    pub host: String,
    pub username: String,
    pub password: String,
    pub stream_path: String,
    pub width: u32,
    pub height: u32,
    /// 帧缓冲容量
    pub buffer_frames: usize,
    pub decoder_program: String,
    /// 硬件解码器名（如 `cuda`、`qsv`），不写则软件解码
    pub hwaccel: Option<String>,
    pub hwaccel_device: Option<String>,
    /// 默认开启去畸变显示
    pub undistort: bool,
    /// 截图保存目录
    pub capture_dir: PathBuf,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            host: "192.168.0.11".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            stream_path: "stream0".to_string(),
            width: 1280,
            height: 720,
            buffer_frames: 10,
            decoder_program: "ffmpeg".to_string(),
            hwaccel: None,
            hwaccel_device: None,
            undistort: false,
            capture_dir: PathBuf::from("captures"),
        }
    }
}

/// `[startup]` 启动检查
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupSection {
    pub poll_interval_ms: u64,
    /// 预检总时限，超时后以降级模式继续
    pub preflight_timeout_ms: u64,
    /// 视频未就绪多久后重连
    pub video_reconnect_ms: u64,
    /// 电机初始化最大重试轮数
    pub motor_max_retries: u32,
}

impl Default for StartupSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            preflight_timeout_ms: 30_000,
            video_reconnect_ms: 5_000,
            motor_max_retries: 10,
        }
    }
}

/// `[recorder]` 深度/温度记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSection {
    pub sample_interval_ms: u64,
    pub log_interval_ms: u64,
    pub output: PathBuf,
}

impl Default for RecorderSection {
    fn default() -> Self {
        Self {
            sample_interval_ms: 500,
            log_interval_ms: 5_000,
            output: PathBuf::from("qsensor_log.json"),
        }
    }
}

/// `[curve]` 推力曲线文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveSection {
    /// 相对路径按配置文件所在目录解析
    pub location: PathBuf,
}

impl Default for CurveSection {
    fn default() -> Self {
        Self {
            location: PathBuf::from("curve.json"),
        }
    }
}

/// `[servo]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoSection {
    /// 启动时的舵机位置
    pub open: f64,
}

impl Default for ServoSection {
    fn default() -> Self {
        Self { open: 0.5 }
    }
}

/// `[main_loop]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainLoopSection {
    pub tick_hz: u32,
}

impl Default for MainLoopSection {
    fn default() -> Self {
        Self { tick_hz: 60 }
    }
}

impl StationConfig {
    /// 从文件加载配置
    ///
    /// 文件不存在时返回默认配置（带警告）。
    ///
    /// # 错误
    ///
    /// 文件存在但无法读取或解析时返回错误。
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 保存配置到文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// ROV 地址（`host:port`）
    pub fn remote_addr(&self) -> String {
        format!("{}:{}", self.link.host, self.link.remote_port)
    }

    /// 推力曲线文件路径
    ///
    /// 相对路径以配置文件所在目录为基准；没有配置文件时按当前目录解析。
    pub fn curve_path(&self, config_path: Option<&Path>) -> PathBuf {
        resolve_relative(&self.curve.location, config_path)
    }

    /// 记录文件路径（解析规则同 [`curve_path`](Self::curve_path)）
    pub fn recorder_output(&self, config_path: Option<&Path>) -> PathBuf {
        resolve_relative(&self.recorder.output, config_path)
    }

    /// 截图目录（解析规则同 [`curve_path`](Self::curve_path)）
    pub fn capture_dir(&self, config_path: Option<&Path>) -> PathBuf {
        resolve_relative(&self.camera.capture_dir, config_path)
    }

    pub fn trigger_policy(&self) -> TriggerPolicy {
        self.link.trigger_policy.into()
    }

    pub fn motor_init_gap(&self) -> Duration {
        Duration::from_millis(self.link.motor_init_gap_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.startup.poll_interval_ms)
    }

    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_millis(self.startup.preflight_timeout_ms)
    }

    pub fn video_reconnect_after(&self) -> Duration {
        Duration::from_millis(self.startup.video_reconnect_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.recorder.sample_interval_ms)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.recorder.log_interval_ms)
    }

    /// 主循环周期；`tick_hz = 0` 按 1 Hz 处理
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.main_loop.tick_hz.max(1)))
    }
}

fn resolve_relative(location: &Path, config_path: Option<&Path>) -> PathBuf {
    if location.is_absolute() {
        return location.to_path_buf();
    }
    match config_path.and_then(Path::parent) {
        Some(dir) => dir.join(location),
        None => location.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_values() {
        let config = StationConfig::default();
        assert_eq!(config.remote_addr(), "192.168.0.10:5000");
        assert_eq!(config.link.local_port, 5001);
        assert_eq!(config.camera.width, 1280);
        assert_eq!(config.camera.height, 720);
        assert_eq!(config.camera.buffer_frames, 10);
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.startup.motor_max_retries, 10);
        assert_eq!(config.servo.open, 0.5);
        assert_eq!(config.trigger_policy(), TriggerPolicy::Coalesce);
        assert_eq!(config.motor_init_gap(), Duration::from_millis(50));
        assert_eq!(
            config.capture_dir(Some(Path::new("/srv/rov/station.toml"))),
            Path::new("/srv/rov/captures")
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = StationConfig::from_toml_str(
            r#"
            [link]
            host = "10.0.0.2"
            trigger_policy = "drop_while_busy"

            [camera]
            undistort = true
            "#,
        )
        .unwrap();

        assert_eq!(config.remote_addr(), "10.0.0.2:5000");
        assert_eq!(config.trigger_policy(), TriggerPolicy::DropWhileBusy);
        assert!(config.camera.undistort);
        assert_eq!(config.camera.decoder_program, "ffmpeg");
        assert_eq!(config.startup, StartupSection::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let err = StationConfig::from_toml_str("[link]\nremote_port = \"five\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = StationConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, StationConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("station.toml");

        let mut config = StationConfig::default();
        config.camera.hwaccel = Some("cuda".to_string());
        config.main_loop.tick_hz = 30;
        config.save(&path).unwrap();

        let loaded = StationConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_curve_path_relative_to_config() {
        let config = StationConfig::default();
        let config_path = Path::new("/etc/rov/station.toml");
        assert_eq!(
            config.curve_path(Some(config_path)),
            PathBuf::from("/etc/rov/curve.json")
        );
        assert_eq!(config.curve_path(None), PathBuf::from("curve.json"));

        let mut absolute = StationConfig::default();
        absolute.curve.location = PathBuf::from("/data/curve.json");
        assert_eq!(
            absolute.curve_path(Some(config_path)),
            PathBuf::from("/data/curve.json")
        );
    }

    #[test]
    fn test_tick_period() {
        let mut config = StationConfig::default();
        config.main_loop.tick_hz = 50;
        assert_eq!(config.tick_period(), Duration::from_millis(20));
        config.main_loop.tick_hz = 0;
        assert_eq!(config.tick_period(), Duration::from_secs(1));
    }
}
