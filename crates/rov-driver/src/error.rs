//! 驱动层错误类型定义

use rov_protocol::ProtocolError;
use thiserror::Error;

/// 传输层错误（socket / 操作系统错误）
///
/// 在链路线程内部被捕获并记录日志，当前交换周期跳过，永不致命。
#[derive(Error, Debug)]
pub enum TransportError {
    /// 底层 IO 错误
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    /// 远端地址无法解析
    #[error("Cannot resolve remote address: {0}")]
    AddrResolve(String),
}

/// 链路层错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    /// 传输层错误（仅在构造阶段向上传播）
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 电机通道编号无效
    #[error("Invalid motor channel: {0}")]
    InvalidChannel(u8),

    /// 链路线程已停止
    #[error("Telemetry link stopped")]
    Stopped,

    /// 操作超时
    #[error("Operation timeout")]
    Timeout,
}
