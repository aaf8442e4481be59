//! 重新下发推力曲线命令

use crate::station;
use anyhow::{Context, Result, bail};
use clap::Args;
use rov_sdk::prelude::*;
use std::path::Path;
use std::time::Duration;

/// 重新下发参数
#[derive(Args, Debug)]
pub struct RedeployCommand {
    /// 等待发送完成的时间（毫秒）
    #[arg(long, default_value_t = 1000)]
    pub timeout_ms: u64,
}

impl RedeployCommand {
    pub fn execute(&self, config: &StationConfig, config_path: &Path) -> Result<()> {
        let mut link = station::open_link(config, config_path)?;

        link.redeploy()?;
        link.wait_idle(Duration::from_millis(self.timeout_ms))
            .context("motor calibration not sent in time")?;

        let channels = link.motor_channels();
        for channel in &channels {
            println!(
                "{}: {}",
                channel.id,
                if channel.initialized { "sent" } else { "FAILED" }
            );
        }
        link.stop();

        let failed = channels.iter().filter(|c| !c.initialized).count();
        if failed > 0 {
            bail!("{} of {} channels not sent", failed, channels.len());
        }
        Ok(())
    }
}
