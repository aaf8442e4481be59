//! 运行命令
//!
//! 启动检查 → 电机初始化 → 主循环，直到 Ctrl+C。

use crate::station;
use anyhow::Result;
use clap::Args;
use rov_sdk::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 状态行输出间隔
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// 运行命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 跳过启动检查（等同操作员按键）
    #[arg(long)]
    pub force: bool,

    /// 视为输入设备已连接
    #[arg(long)]
    pub assume_controller: bool,

    /// 显示去畸变画面（覆盖配置）
    #[arg(long)]
    pub undistort: bool,

    /// 不启动视频采集
    #[arg(long)]
    pub no_video: bool,

    /// 运行期间记录深度/温度
    #[arg(long)]
    pub record: bool,

    /// 每隔 SECS 秒保存一张截图到 `[camera] capture_dir`
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub capture_every: Option<u64>,
}

impl RunCommand {
    pub fn execute(
        &self,
        config: &StationConfig,
        config_path: &Path,
        shutdown: &AtomicBool,
    ) -> Result<()> {
        let mut link = station::open_link(config, config_path)?;

        let decoder = station::decoder_config(config);
        info!(
            "Video source {}x{} via `{}` ({})",
            decoder.width,
            decoder.height,
            decoder.program,
            station::describe_hwaccel(decoder.hwaccel.as_ref())
        );
        let mut video = VideoSupervisor::new(
            decoder,
            station::ingest_options(config),
            config.video_reconnect_after(),
        )
        .with_capture(FrameCapture::new(config.capture_dir(Some(config_path))));
        if !self.no_video
            && let Err(e) = video.start()
        {
            warn!("Video not started: {}", e);
        }

        let outcome = self.startup(config, &link, &mut video, shutdown);
        if !outcome.aborted {
            let recorder = self.record.then(|| {
                SensorRecorder::start(
                    link.context().clone(),
                    station::recorder_config(config, config_path),
                )
            });
            self.operate(config, &link, &mut video, &outcome, shutdown);

            if let Some(recorder) = recorder {
                match recorder.stop() {
                    Ok(n) => info!("Saved {} sensor samples", n),
                    Err(e) => warn!("Sensor log not saved: {}", e),
                }
            }
        }

        video.shutdown();
        link.stop();
        let metrics = link.metrics();
        info!(
            "Link stats: {} cycles, {} commands sent, {} samples, {} malformed",
            metrics.exchange_cycles,
            metrics.commands_sent,
            metrics.samples_received,
            metrics.datagrams_malformed
        );
        Ok(())
    }

    fn startup(
        &self,
        config: &StationConfig,
        link: &TelemetryLink,
        video: &mut VideoSupervisor,
        shutdown: &AtomicBool,
    ) -> ReadinessOutcome {
        let assume_controller = self.assume_controller;
        let video = (!self.no_video).then_some(video);
        let mut signals = StationSignals::new(link, video, move || assume_controller);

        let mut override_sent = !self.force;
        let mut last_report = Instant::now();
        let sequencer = StartupSequencer::new(station::sequencer_config(config));
        let outcome = sequencer.run(&mut signals, |state| {
            if shutdown.load(Ordering::Acquire) {
                return PumpEvent::Quit;
            }
            if !override_sent {
                override_sent = true;
                return PumpEvent::OverridePressed;
            }
            if last_report.elapsed() >= STATUS_INTERVAL {
                info!("Waiting for: {}", state.missing().join(", "));
                last_report = Instant::now();
            }
            PumpEvent::Continue
        });

        match outcome.status_banner() {
            None => info!("Startup complete"),
            Some(banner) => warn!("{}", banner),
        }
        outcome
    }

    fn operate(
        &self,
        config: &StationConfig,
        link: &TelemetryLink,
        video: &mut VideoSupervisor,
        outcome: &ReadinessOutcome,
        shutdown: &AtomicBool,
    ) {
        let tick = config.tick_period();
        let undistort = self.undistort || config.camera.undistort;
        let banner = outcome.status_banner();
        let mut last_status = Instant::now();
        let mut frames_seen = 0u64;
        let mut last_seq = 0u64;
        let capture_every = self.capture_every.map(Duration::from_secs);
        let mut last_capture = Instant::now();

        info!("Operating loop running at {:?} per tick", tick);
        while !shutdown.load(Ordering::Acquire) {
            let started = Instant::now();

            link.trigger();
            if !self.no_video {
                video.poll();
                if let Some(frame) = video.latest_frame(undistort)
                    && frame.seq != last_seq
                {
                    last_seq = frame.seq;
                    frames_seen += 1;
                }

                if let Some(every) = capture_every
                    && last_capture.elapsed() >= every
                {
                    last_capture = Instant::now();
                    match video.save_frame(undistort) {
                        Ok(path) => info!("Capture saved: {}", path.display()),
                        Err(e) => warn!("Capture skipped: {}", e),
                    }
                }
            }

            if last_status.elapsed() >= STATUS_INTERVAL {
                let sample = link.sensor();
                let status = format!(
                    "depth {:.3} m, temp {:.2} C, frames {}, reconnects {}",
                    sample.depth,
                    sample.temperature,
                    frames_seen,
                    video.reconnect_count()
                );
                match &banner {
                    Some(banner) => warn!("[{}] {}", banner, status),
                    None => info!("{}", status),
                }
                last_status = Instant::now();
            }

            if let Some(remaining) = tick.checked_sub(started.elapsed()) {
                spin_sleep::sleep(remaining);
            }
        }
        info!("Operating loop stopped");
    }
}
