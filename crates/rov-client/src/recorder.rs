//! 深度/温度后台记录
//!
//! 记录线程按固定间隔读取共享的 `SensorSample`，定期输出一行
//! `depth,temperature` 日志，停止时写出 [`SensorLog`] 文件。

use crate::ClientError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rov_driver::{JoinTimeout, VehicleContext};
use rov_tools::SensorLog;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// 记录参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    /// 采样间隔
    pub sample_interval: Duration,
    /// 日志输出间隔
    pub log_interval: Duration,
    /// 停止时写出的文件
    pub output: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(500),
            log_interval: Duration::from_secs(5),
            output: PathBuf::from("qsensor_log.json"),
        }
    }
}

/// 后台记录器
///
/// 由操作员动作开启/关闭；`stop` 返回写出的样本数。
/// 未调用 `stop` 直接丢弃时同样会停止线程并写出文件。
pub struct SensorRecorder {
    running: Arc<AtomicBool>,
    recorded: Arc<AtomicU64>,
    stop_tx: Sender<()>,
    result_rx: Receiver<Result<usize, ClientError>>,
    worker: Option<JoinHandle<()>>,
    output: PathBuf,
    started_at: Instant,
}

impl SensorRecorder {
    /// join 超时
    pub const JOIN_TIMEOUT: Duration = Duration::from_secs(3);

    /// 启动记录线程
    pub fn start(ctx: Arc<VehicleContext>, config: RecorderConfig) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let recorded = Arc::new(AtomicU64::new(0));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        let output = config.output.clone();

        let worker = {
            let running = running.clone();
            let recorded = recorded.clone();
            spawn(move || {
                let log = record_loop(&ctx, &config, &running, &recorded, &stop_rx);
                let result = log.save(&config.output).map_err(ClientError::from);
                let _ = result_tx.send(result);
            })
        };

        info!("Sensor recording started -> {}", output.display());
        Self {
            running,
            recorded,
            stop_tx,
            result_rx,
            worker: Some(worker),
            output,
            started_at: Instant::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 已记录的样本数
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 停止记录并写出文件
    ///
    /// # 返回
    ///
    /// 写出的样本数
    ///
    /// # 错误
    ///
    /// - `ClientError::Config`: 文件写出失败
    /// - `ClientError::JoinTimeout` / `ClientError::ThreadPanicked`: 线程未正常退出
    pub fn stop(mut self) -> Result<usize, ClientError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<usize, ClientError> {
        let Some(worker) = self.worker.take() else {
            return Ok(0);
        };
        self.running.store(false, Ordering::Release);
        let _ = self.stop_tx.try_send(());

        if let Err(e) = worker.join_timeout(Self::JOIN_TIMEOUT) {
            let timed_out = e
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut);
            return Err(if timed_out {
                ClientError::JoinTimeout("sensor-recorder")
            } else {
                ClientError::ThreadPanicked("sensor-recorder")
            });
        }

        let saved = self
            .result_rx
            .try_recv()
            .map_err(|_| ClientError::ThreadPanicked("sensor-recorder"))??;
        info!("Sensor recording stopped after {:?}", self.started_at.elapsed());
        Ok(saved)
    }
}

impl Drop for SensorRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Sensor recorder shutdown failed: {}", e);
        }
    }
}

fn record_loop(
    ctx: &VehicleContext,
    config: &RecorderConfig,
    running: &AtomicBool,
    recorded: &AtomicU64,
    stop_rx: &Receiver<()>,
) -> SensorLog {
    let mut log = SensorLog::new();
    let mut last_report = Instant::now();

    while running.load(Ordering::Acquire) {
        match stop_rx.recv_timeout(config.sample_interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {},
        }

        let sample = ctx.sensor();
        if log.record(sample) {
            recorded.fetch_add(1, Ordering::Relaxed);
        }
        if last_report.elapsed() >= config.log_interval {
            info!("{:.3},{:.2}", sample.depth, sample.temperature);
            last_report = Instant::now();
        }
    }

    debug!("Sensor recorder exiting with {} samples", log.len());
    log
}

#[cfg(test)]
mod tests {
    use super::*;
    use rov_protocol::SensorSample;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> RecorderConfig {
        RecorderConfig {
            sample_interval: Duration::from_millis(5),
            log_interval: Duration::from_millis(20),
            output: dir.path().join("qsensor_log.json"),
        }
    }

    #[test]
    fn test_records_and_saves_on_stop() {
        let dir = TempDir::new().unwrap();
        let ctx = Arc::new(VehicleContext::default());
        ctx.sensor.store(Arc::new(SensorSample {
            depth: 1.24,
            temperature: 22.5,
        }));

        let recorder = SensorRecorder::start(ctx, config(&dir));
        let deadline = Instant::now() + Duration::from_secs(5);
        while recorder.recorded() < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let saved = recorder.stop().unwrap();
        assert!(saved >= 3);

        let log = SensorLog::load(dir.path().join("qsensor_log.json")).unwrap();
        assert_eq!(log.len(), saved);
        assert!(log.depth.iter().all(|&d| d == -1.24));
        assert!(log.temperature.iter().all(|&t| t == 22.5));
    }

    #[test]
    fn test_surface_samples_are_skipped() {
        let dir = TempDir::new().unwrap();
        let ctx = Arc::new(VehicleContext::default());

        let recorder = SensorRecorder::start(ctx, config(&dir));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(recorder.recorded(), 0);
        assert_eq!(recorder.stop().unwrap(), 0);
    }

    #[test]
    fn test_stop_is_prompt() {
        let dir = TempDir::new().unwrap();
        let ctx = Arc::new(VehicleContext::default());
        let recorder = SensorRecorder::start(
            ctx,
            RecorderConfig {
                sample_interval: Duration::from_secs(60),
                ..config(&dir)
            },
        );

        let start = Instant::now();
        recorder.stop().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(dir.path().join("qsensor_log.json").exists());
    }

    #[test]
    fn test_drop_writes_file() {
        let dir = TempDir::new().unwrap();
        let ctx = Arc::new(VehicleContext::default());
        drop(SensorRecorder::start(ctx, config(&dir)));
        assert!(dir.path().join("qsensor_log.json").exists());
    }

    #[test]
    fn test_unwritable_output_is_reported() {
        let dir = TempDir::new().unwrap();
        let ctx = Arc::new(VehicleContext::default());
        let recorder = SensorRecorder::start(
            ctx,
            RecorderConfig {
                output: dir.path().join("missing-dir").join("log.json"),
                ..config(&dir)
            },
        );
        assert!(matches!(recorder.stop(), Err(ClientError::Config(_))));
    }
}
