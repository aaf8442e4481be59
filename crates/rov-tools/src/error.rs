//! 配置与数据文件错误

use thiserror::Error;

/// 配置/标定/日志文件错误
///
/// 调用方通常回退到默认值，而不是终止。
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),
}
