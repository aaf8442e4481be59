//! 客户端层错误类型

use rov_driver::LinkError;
use rov_tools::ConfigError;
use rov_video::VideoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 后台线程未在时限内退出
    #[error("Thread `{0}` did not exit in time")]
    JoinTimeout(&'static str),

    /// 后台线程 panic
    #[error("Thread `{0}` panicked")]
    ThreadPanicked(&'static str),
}
