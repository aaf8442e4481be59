//! # ROV Station
//!
//! 地面站命令行入口。
//!
//! ```bash
//! # 启动检查 + 运行主循环（Ctrl+C 退出）
//! rov-station run --config station.toml
//!
//! # 跳过启动检查（等同操作员按键）
//! rov-station run --force
//!
//! # 连通性测试：一次交换，等待遥测回复
//! rov-station ping --window-ms 500
//!
//! # 重新下发全部推力曲线
//! rov-station redeploy
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod station;

use commands::{PingCommand, RedeployCommand, RunCommand};

/// ROV 地面站
#[derive(Parser, Debug)]
#[command(name = "rov-station")]
#[command(about = "ROV ground station: telemetry link, video and startup checks", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件（不存在时使用默认配置）
    #[arg(short, long, global = true, default_value = "station.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 启动检查后运行主循环
    Run {
        #[command(flatten)]
        args: RunCommand,
    },

    /// 连通性测试
    Ping {
        #[command(flatten)]
        args: PingCommand,
    },

    /// 重新下发推力曲线
    Redeploy {
        #[command(flatten)]
        args: RedeployCommand,
    },
}

fn main() -> Result<()> {
    rov_sdk::init_logging("rov_station=info,rov_driver=info,rov_video=info,rov_client=info");

    let cli = Cli::parse();
    let config = station::load_config(&cli.config)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nReceived interrupt signal. Shutting down...");
            shutdown.store(true, Ordering::Release);
        })
        .context("failed to install Ctrl+C handler")?;
    }

    match cli.command {
        Commands::Run { args } => args.execute(&config, &cli.config, &shutdown),
        Commands::Ping { args } => args.execute(&config, &cli.config),
        Commands::Redeploy { args } => args.execute(&config, &cli.config),
    }
}
