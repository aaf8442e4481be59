//! 连通性测试命令

use crate::station;
use anyhow::Result;
use clap::Args;
use rov_sdk::prelude::*;
use std::path::Path;
use std::time::Duration;

/// 连通性测试参数
#[derive(Args, Debug)]
pub struct PingCommand {
    /// 等待遥测回复的时间窗口（毫秒）
    #[arg(long, default_value_t = 500)]
    pub window_ms: u64,
}

impl PingCommand {
    pub fn execute(&self, config: &StationConfig, config_path: &Path) -> Result<()> {
        let mut link = station::open_link(config, config_path)?;
        println!("Pinging {} ...", config.remote_addr());

        match link.wait_for_telemetry(Duration::from_millis(self.window_ms)) {
            Ok(sample) => println!(
                "depth {:.3} m, temperature {:.2} C",
                sample.depth, sample.temperature
            ),
            Err(LinkError::Timeout) => println!("no telemetry"),
            Err(e) => return Err(e.into()),
        }

        link.stop();
        let metrics = link.metrics();
        println!(
            "{} cycles, {} commands sent ({} failed), {} malformed datagrams",
            metrics.exchange_cycles,
            metrics.commands_sent,
            metrics.command_errors,
            metrics.datagrams_malformed
        );
        Ok(())
    }
}
