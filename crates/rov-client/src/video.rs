//! 视频重连策略
//!
//! `VideoIngest` 本身不重连；`VideoSupervisor` 在主线程上定期 [`poll`](VideoSupervisor::poll)，
//! 发现流持续断开时销毁旧实例（先优雅停止，再强制停止），用相同参数重建。
//! 截图编号由监督者持有，重连后继续递增。

use crate::ClientError;
use rov_video::{
    DecoderConfig, Frame, FrameCapture, IngestOptions, VideoError, VideoIngest, VideoMetricsSnapshot,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// 视频采集监督者
pub struct VideoSupervisor {
    config: DecoderConfig,
    options: IngestOptions,
    reconnect_after: Duration,
    ingest: Option<VideoIngest>,
    /// 首次观察到不健康的时间（健康时清空）
    unhealthy_since: Option<Instant>,
    reconnects: u64,
    capture: FrameCapture,
}

impl VideoSupervisor {
    /// 创建监督者（不启动解码进程）
    ///
    /// # 参数
    ///
    /// - `reconnect_after`: 持续断开多久后重连
    pub fn new(config: DecoderConfig, options: IngestOptions, reconnect_after: Duration) -> Self {
        Self {
            config,
            options,
            reconnect_after,
            ingest: None,
            unhealthy_since: None,
            reconnects: 0,
            capture: FrameCapture::new("captures"),
        }
    }

    /// 替换截图写入器（默认写入 `captures/`）
    pub fn with_capture(mut self, capture: FrameCapture) -> Self {
        self.capture = capture;
        self
    }

    /// 启动解码进程与读取线程
    ///
    /// 失败时不保留实例，之后的 [`poll`](Self::poll) 会按重连间隔重试。
    pub fn start(&mut self) -> Result<(), ClientError> {
        self.teardown();
        self.unhealthy_since = Some(Instant::now());

        let mut ingest = VideoIngest::with_options(self.config.clone(), self.options)?;
        ingest.start()?;
        self.ingest = Some(ingest);
        Ok(())
    }

    /// 检查健康状态，必要时重连
    ///
    /// # 返回
    ///
    /// 本次调用是否执行了重连
    pub fn poll(&mut self) -> bool {
        let healthy = self
            .ingest
            .as_ref()
            .is_some_and(|ingest| ingest.is_alive() && ingest.is_connected());
        if healthy {
            self.unhealthy_since = None;
            return false;
        }

        let since = *self.unhealthy_since.get_or_insert_with(Instant::now);
        if since.elapsed() < self.reconnect_after {
            return false;
        }
        warn!("Video unavailable for {:?}, reconnecting", since.elapsed());
        self.reconnect();
        true
    }

    /// 立即重连
    pub fn force_reconnect(&mut self) {
        self.reconnect();
    }

    fn reconnect(&mut self) {
        self.reconnects += 1;
        match self.start() {
            Ok(()) => info!("Video decoder restarted (reconnect #{})", self.reconnects),
            Err(e) => error!("Video reconnect #{} failed: {}", self.reconnects, e),
        }
    }

    fn teardown(&mut self) {
        if let Some(mut ingest) = self.ingest.take() {
            ingest.stop();
            ingest.stop_force();
        }
    }

    /// 停止采集（幂等）
    pub fn shutdown(&mut self) {
        self.teardown();
        self.unhealthy_since = None;
    }

    /// 已连接且帧缓冲非空
    pub fn video_ready(&self) -> bool {
        self.ingest
            .as_ref()
            .is_some_and(|ingest| ingest.is_connected() && ingest.frame_count() > 0)
    }

    /// 最新一帧（不阻塞）；重连期间返回 `None`
    pub fn latest_frame(&self, undistort: bool) -> Option<Arc<Frame>> {
        self.ingest.as_ref()?.latest_frame(undistort)
    }

    /// 把最新一帧保存为 JPEG
    ///
    /// # 错误
    /// - `ClientError::Video(VideoError::NoFrame)`: 没有可用帧（含重连期间）
    pub fn save_frame(&mut self, undistort: bool) -> Result<PathBuf, ClientError> {
        let ingest = self.ingest.as_ref().ok_or(VideoError::NoFrame)?;
        Ok(ingest.save_frame(&mut self.capture, undistort)?)
    }

    pub fn capture(&self) -> &FrameCapture {
        &self.capture
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnects
    }

    pub fn diagnostic_lines(&self, n: usize) -> Vec<String> {
        self.ingest
            .as_ref()
            .map(|ingest| ingest.diagnostic_lines(n))
            .unwrap_or_default()
    }

    pub fn metrics(&self) -> Option<VideoMetricsSnapshot> {
        self.ingest.as_ref().map(VideoIngest::metrics)
    }

    pub fn ingest(&self) -> Option<&VideoIngest> {
        self.ingest.as_ref()
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }
}

impl Drop for VideoSupervisor {
    fn drop(&mut self) {
        self.teardown();
    }
}
