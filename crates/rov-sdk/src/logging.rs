//! 日志初始化
//!
//! `tracing-subscriber` 输出到 stderr，过滤规则取自 `RUST_LOG`，
//! 未设置时使用调用方给出的默认规则。依赖库通过 `log` 门面输出的记录
//! 经 `tracing-log` 转发到同一个 subscriber。

use std::error::Error;
use std::sync::Once;
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 初始化全局日志（进程内只生效一次）
///
/// # 参数
///
/// - `default_directive`: `RUST_LOG` 未设置时的过滤规则，如 `"rov_station=info,rov_driver=info"`
///
/// # 返回
///
/// 本次调用安装了全局 subscriber 返回 `true`；已初始化过或安装失败返回 `false`
/// （失败原因输出到 stderr，不影响程序继续运行）。
pub fn init_logging(default_directive: &str) -> bool {
    let mut installed = false;
    INIT.call_once(|| match install(default_directive) {
        Ok(()) => installed = true,
        Err(e) => eprintln!("Logging not initialized: {}", e),
    });
    installed
}

fn install(default_directive: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)?,
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    LogTracer::builder()
        .with_max_level(log::LevelFilter::Debug)
        .init()?;
    Ok(())
}
