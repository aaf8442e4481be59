//! 视频层错误类型定义

use std::path::PathBuf;
use thiserror::Error;

/// 视频采集错误
///
/// 只在构造/启动阶段向上传播；运行期的解码进程退出、管道关闭等
/// 统一体现为 `is_connected() == false`，由调用方决定是否重连。
#[derive(Error, Debug)]
pub enum VideoError {
    /// 解码进程启动失败（程序不存在、无执行权限等）
    #[error("Failed to spawn decoder `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// 子进程缺少标准输出/错误管道
    #[error("Decoder {0} pipe is not available")]
    MissingPipe(&'static str),

    /// 分辨率无效（宽或高为 0），或帧尺寸与期望不符
    #[error("Invalid resolution: {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    /// 解码进程异常
    #[error("Decoder process error: {0}")]
    Process(String),

    /// 线程在超时时间内未退出
    #[error("{0} thread did not exit in time")]
    JoinTimeout(&'static str),

    /// 还没有收到任何帧
    #[error("No frame available")]
    NoFrame,

    /// 图像编码失败
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// 截图写入失败
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
