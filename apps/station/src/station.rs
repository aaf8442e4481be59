//! 配置到各子系统参数的映射

use anyhow::{Context, Result};
use rov_sdk::prelude::*;
use rov_sdk::tools::load_motor_table;
use rov_sdk::video::HwAccel;
use std::path::Path;
use tracing::info;

/// 读取配置文件（不存在时使用默认配置）
pub fn load_config(path: &Path) -> Result<StationConfig> {
    StationConfig::load(path).with_context(|| format!("invalid config file {}", path.display()))
}

/// 打开指令/遥测链路（带推力曲线与舵机初始位置）
pub fn open_link(config: &StationConfig, config_path: &Path) -> Result<TelemetryLink> {
    let motors = load_motor_table(config.curve_path(Some(config_path)));
    let link = TelemetryLinkBuilder::new()
        .remote(config.remote_addr())
        .local_port(config.link.local_port)
        .motors(motors)
        .initial_command(CommandVector::with_servo(config.servo.open))
        .trigger_policy(config.trigger_policy())
        .motor_init_gap(config.motor_init_gap())
        .build()
        .with_context(|| format!("failed to open telemetry link to {}", config.remote_addr()))?;
    info!(
        "Telemetry link ready (local {:?}, policy {:?})",
        link.local_addr(),
        link.policy()
    );
    Ok(link)
}

/// 解码进程参数
pub fn decoder_config(config: &StationConfig) -> DecoderConfig {
    let camera = &config.camera;
    let url = DecoderConfig::rtsp_url(
        &camera.username,
        &camera.password,
        &camera.host,
        &camera.stream_path,
    );
    let decoder =
        DecoderConfig::rtsp(url, camera.width, camera.height).with_program(&camera.decoder_program);
    match &camera.hwaccel {
        Some(name) => decoder.with_hwaccel(name, camera.hwaccel_device.clone()),
        None => decoder,
    }
}

pub fn ingest_options(config: &StationConfig) -> IngestOptions {
    IngestOptions {
        buffer_frames: config.camera.buffer_frames,
        ..Default::default()
    }
}

pub fn sequencer_config(config: &StationConfig) -> SequencerConfig {
    SequencerConfig {
        poll_interval: config.poll_interval(),
        preflight_timeout: config.preflight_timeout(),
        video_reconnect_after: config.video_reconnect_after(),
        motor_max_retries: config.startup.motor_max_retries,
    }
}

pub fn recorder_config(config: &StationConfig, config_path: &Path) -> RecorderConfig {
    RecorderConfig {
        sample_interval: config.sample_interval(),
        log_interval: config.log_interval(),
        output: config.recorder_output(Some(config_path)),
    }
}

/// 硬件解码描述（用于启动日志）
pub fn describe_hwaccel(hwaccel: Option<&HwAccel>) -> String {
    match hwaccel {
        Some(hw) => match &hw.device {
            Some(device) => format!("{} ({})", hw.name, device),
            None => hw.name.clone(),
        },
        None => "software".to_string(),
    }
}
