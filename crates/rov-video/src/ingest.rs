//! VideoIngest：外部解码进程 + 帧读取线程 + 有界帧缓冲
//!
//! 线程模型：
//! - 读取线程：阻塞读取整帧，BGR→RGB 后压入缓冲（满则丢最旧）
//! - 诊断线程：逐行读取解码进程标准错误，写入环形日志
//!
//! 两个线程都只在 push 期间持锁，从不在锁内做 IO；
//! 主线程的 [`VideoIngest::latest_frame`] 只克隆一个 `Arc`，不会被读取阻塞。

use crate::capture::FrameCapture;
use crate::decoder::DecoderConfig;
use crate::diagnostics::{DiagnosticLog, drain_diagnostics};
use crate::error::VideoError;
use crate::frame::{Frame, FrameBuffer, bgr_to_rgb_in_place};
use crate::metrics::{VideoMetrics, VideoMetricsSnapshot};
use crate::undistort::{CameraCalibration, UndistortMap};
use parking_lot::Mutex;
use rov_driver::JoinTimeout;
use std::io::{BufReader, ErrorKind, Read};
use std::process::{Child, ChildStdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 短读/读错误后的退避时间（解码进程退出后避免空转）
const READ_BACKOFF: Duration = Duration::from_millis(50);

/// 采集选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestOptions {
    /// 帧缓冲容量
    pub buffer_frames: usize,
    /// 去畸变使用的相机标定
    pub calibration: CameraCalibration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            buffer_frames: FrameBuffer::DEFAULT_CAPACITY,
            calibration: CameraCalibration::REFERENCE,
        }
    }
}

/// 视频采集实例
///
/// 构造即启动解码进程与诊断线程；[`VideoIngest::start`] 启动帧读取线程。
/// 重连由调用方负责：销毁旧实例，用相同参数构造新实例。
///
/// # Example
///
/// ```rust,no_run
/// use rov_video::{DecoderConfig, VideoIngest};
///
/// let config = DecoderConfig::rtsp("rtsp://admin:pw@192.168.0.11:554/stream0", 1280, 720);
/// let mut video = VideoIngest::new(config).unwrap();
/// video.start().unwrap();
///
/// if let Some(frame) = video.latest_frame(true) {
///     println!("frame #{} {}x{}", frame.seq, frame.width, frame.height);
/// }
/// video.stop_force();
/// ```
pub struct VideoIngest {
    config: DecoderConfig,
    options: IngestOptions,
    /// 解码子进程（stop_force 时回收）
    child: Option<Child>,
    /// 标准输出，start 时移交读取线程
    stdout: Option<ChildStdout>,
    buffer: Arc<Mutex<FrameBuffer>>,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    metrics: Arc<VideoMetrics>,
    diagnostics: Arc<DiagnosticLog>,
    reader_thread: Option<JoinHandle<()>>,
    diag_thread: Option<JoinHandle<()>>,
    /// 去畸变映射（首次请求时计算）
    undistort: OnceLock<UndistortMap>,
    /// 最近一次去畸变结果（与源帧同 seq）
    corrected: Mutex<Option<Arc<Frame>>>,
    torn_down: bool,
}

impl VideoIngest {
    /// 读取线程 join 超时
    pub const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(3);
    /// 诊断线程 join 超时
    pub const DIAGNOSTICS_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

    /// 使用默认选项启动解码进程
    pub fn new(config: DecoderConfig) -> Result<Self, VideoError> {
        Self::with_options(config, IngestOptions::default())
    }

    /// 启动解码进程与诊断线程
    ///
    /// # 错误
    /// - `VideoError::InvalidResolution`: 宽或高为 0
    /// - `VideoError::Spawn`: 解码程序无法启动
    /// - `VideoError::MissingPipe`: 子进程缺少输出管道
    pub fn with_options(config: DecoderConfig, options: IngestOptions) -> Result<Self, VideoError> {
        let mut child = config.spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdout, stderr) = match (stdout, stderr) {
            (Some(out), Some(err)) => (out, err),
            (out, _) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(VideoError::MissingPipe(if out.is_none() { "stdout" } else { "stderr" }));
            },
        };

        let running = Arc::new(AtomicBool::new(true));
        let diagnostics = Arc::new(DiagnosticLog::default());

        let diag_log = diagnostics.clone();
        let diag_running = running.clone();
        let diag_thread = spawn(move || {
            drain_diagnostics(BufReader::new(stderr), diag_log, diag_running);
        });

        info!(
            "Decoder `{}` started (pid {}, {}x{})",
            config.program,
            child.id(),
            config.width,
            config.height
        );

        Ok(Self {
            buffer: Arc::new(Mutex::new(FrameBuffer::new(options.buffer_frames))),
            config,
            options,
            child: Some(child),
            stdout: Some(stdout),
            connected: Arc::new(AtomicBool::new(false)),
            running,
            metrics: Arc::new(VideoMetrics::new()),
            diagnostics,
            reader_thread: None,
            diag_thread: Some(diag_thread),
            undistort: OnceLock::new(),
            corrected: Mutex::new(None),
            torn_down: false,
        })
    }

    /// 启动帧读取线程（重复调用无副作用）
    ///
    /// # 错误
    /// - `VideoError::Process`: 实例已被停止
    pub fn start(&mut self) -> Result<(), VideoError> {
        if self.reader_thread.is_some() {
            return Ok(());
        }
        let stdout = match self.stdout.take() {
            Some(stdout) if !self.torn_down => stdout,
            _ => return Err(VideoError::Process("decoder already torn down".to_string())),
        };

        let width = self.config.width;
        let height = self.config.height;
        let buffer = self.buffer.clone();
        let connected = self.connected.clone();
        let running = self.running.clone();
        let metrics = self.metrics.clone();
        self.reader_thread = Some(spawn(move || {
            read_frames(stdout, width, height, buffer, connected, running, metrics);
        }));
        Ok(())
    }

    /// 最新一帧（不阻塞）
    ///
    /// `undistort = true` 时返回去畸变并裁剪到 ROI 的副本；
    /// 映射在首次请求时计算一次，之后复用。
    /// 没有新帧时重复调用返回同一个 `Arc`，不会重新计算。
    pub fn latest_frame(&self, undistort: bool) -> Option<Arc<Frame>> {
        let frame = self.buffer.lock().latest()?;
        if !undistort {
            return Some(frame);
        }

        let mut corrected = self.corrected.lock();
        if let Some(cached) = corrected.as_ref()
            && cached.seq == frame.seq
        {
            return Some(cached.clone());
        }

        match self.undistort_map().apply(&frame) {
            Ok(fresh) => {
                let fresh = Arc::new(fresh);
                *corrected = Some(fresh.clone());
                Some(fresh)
            },
            Err(e) => {
                warn!("Undistortion skipped: {}", e);
                Some(frame)
            },
        }
    }

    /// 把最新一帧保存为 JPEG
    ///
    /// # 错误
    /// - `VideoError::NoFrame`: 还没有收到任何帧
    /// - 其余见 [`FrameCapture::save`]
    pub fn save_frame(&self, capture: &mut FrameCapture, undistort: bool) -> Result<PathBuf, VideoError> {
        let frame = self.latest_frame(undistort).ok_or(VideoError::NoFrame)?;
        capture.save(&frame)
    }

    /// 预先计算去畸变映射，避免首次请求时的延迟
    pub fn prepare_undistort(&self) {
        let _ = self.undistort_map();
    }

    fn undistort_map(&self) -> &UndistortMap {
        self.undistort.get_or_init(|| {
            debug!("Computing undistortion map for {}x{}", self.config.width, self.config.height);
            UndistortMap::new(&self.options.calibration, self.config.width, self.config.height)
        })
    }

    /// 读取线程是否存活
    pub fn is_alive(&self) -> bool {
        self.reader_thread.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// 最近一次读取是否为完整帧
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// 缓冲中的帧数
    pub fn frame_count(&self) -> usize {
        self.buffer.lock().len()
    }

    /// 最近 `n` 行解码诊断输出
    pub fn diagnostic_lines(&self, n: usize) -> Vec<String> {
        self.diagnostics.recent(n)
    }

    pub fn metrics(&self) -> VideoMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// 优雅停止：通知读取线程退出，等待诊断线程（超时只记录日志）
    ///
    /// 解码进程仍在输出时读取线程可能阻塞在 read 上，
    /// 需要随后调用 [`VideoIngest::stop_force`] 才能保证回收。
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.diag_thread.take()
            && let Err(_e) = handle.join_timeout(Self::DIAGNOSTICS_JOIN_TIMEOUT)
        {
            error!(
                "Decoder diagnostics thread did not exit within {:?}",
                Self::DIAGNOSTICS_JOIN_TIMEOUT
            );
        }
    }

    /// 强制停止：结束解码进程，等待两个线程（幂等）
    ///
    /// 先结束子进程，使阻塞在管道上的读取立即返回，再带超时 join。
    pub fn stop_force(&mut self) {
        if self.torn_down {
            return;
        }
        self.running.store(false, Ordering::Release);

        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                Ok(Some(status)) => debug!("Decoder already exited: {}", status),
                Ok(None) => {
                    if let Err(e) = child.kill() {
                        error!("Failed to kill decoder (pid {}): {}", child.id(), e);
                    }
                    match child.wait() {
                        Ok(status) => debug!("Decoder terminated: {}", status),
                        Err(e) => error!("Failed to reap decoder: {}", e),
                    }
                },
                Err(e) => error!("Failed to query decoder status: {}", e),
            }
        }
        // 未启动读取线程时管道仍由本实例持有
        self.stdout = None;

        if let Some(handle) = self.reader_thread.take()
            && let Err(_e) = handle.join_timeout(Self::READER_JOIN_TIMEOUT)
        {
            error!(
                "Frame reader thread did not exit within {:?}",
                Self::READER_JOIN_TIMEOUT
            );
        }
        if let Some(handle) = self.diag_thread.take()
            && let Err(_e) = handle.join_timeout(Self::DIAGNOSTICS_JOIN_TIMEOUT)
        {
            error!(
                "Decoder diagnostics thread did not exit within {:?}",
                Self::DIAGNOSTICS_JOIN_TIMEOUT
            );
        }

        self.connected.store(false, Ordering::Release);
        self.torn_down = true;
        info!("Video ingest stopped");
    }
}

impl Drop for VideoIngest {
    fn drop(&mut self) {
        self.stop_force();
    }
}

/// 读取线程主循环
///
/// 完整帧：颜色转换后压入缓冲，`connected = true`；
/// 短读或读错误：`connected = false`，退避后继续循环（由调用方决定是否重连）。
fn read_frames(
    mut stdout: impl Read,
    width: u32,
    height: u32,
    buffer: Arc<Mutex<FrameBuffer>>,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    metrics: Arc<VideoMetrics>,
) {
    let frame_size = Frame::byte_len(width, height);
    let mut seq = 0u64;

    while running.load(Ordering::Acquire) {
        let mut data = vec![0u8; frame_size];
        match read_full(&mut stdout, &mut data) {
            Ok(n) if n == frame_size => {
                bgr_to_rgb_in_place(&mut data);
                seq += 1;
                let frame = Arc::new(Frame {
                    width,
                    height,
                    seq,
                    data,
                });

                let evicted = buffer.lock().push(frame);
                if evicted.is_some() {
                    metrics.frames_evicted.fetch_add(1, Ordering::Relaxed);
                }
                metrics.frames_received.fetch_add(1, Ordering::Relaxed);
                if !connected.swap(true, Ordering::AcqRel) {
                    info!("Video stream connected");
                }
            },
            Ok(n) => {
                metrics.short_reads.fetch_add(1, Ordering::Relaxed);
                if connected.swap(false, Ordering::AcqRel) {
                    warn!("Video stream lost: short read ({} of {} bytes)", n, frame_size);
                }
                std::thread::sleep(READ_BACKOFF);
            },
            Err(e) => {
                metrics.read_errors.fetch_add(1, Ordering::Relaxed);
                if connected.swap(false, Ordering::AcqRel) {
                    warn!("Video stream lost: {}", e);
                }
                std::thread::sleep(READ_BACKOFF);
            },
        }
    }

    debug!("Frame reader exiting after {} frames", seq);
}

/// 读满 `buf`，遇到 EOF 提前返回已读字节数
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
