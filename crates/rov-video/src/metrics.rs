//! 视频采集指标

use std::sync::atomic::{AtomicU64, Ordering};

/// 视频采集计数器（读取线程写，主线程读）
#[derive(Debug, Default)]
pub struct VideoMetrics {
    /// 完整读取的帧
    pub frames_received: AtomicU64,
    /// 因缓冲满而淘汰的帧
    pub frames_evicted: AtomicU64,
    /// 不足一帧的读取（进程退出/管道关闭）
    pub short_reads: AtomicU64,
    /// 读取返回 IO 错误
    pub read_errors: AtomicU64,
}

impl VideoMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> VideoMetricsSnapshot {
        VideoMetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_evicted: self.frames_evicted.load(Ordering::Relaxed),
            short_reads: self.short_reads.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoMetricsSnapshot {
    pub frames_received: u64,
    pub frames_evicted: u64,
    pub short_reads: u64,
    pub read_errors: u64,
}
