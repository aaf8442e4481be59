//! 命令定义和实现

pub mod ping;
pub mod redeploy;
pub mod run;

pub use ping::PingCommand;
pub use redeploy::RedeployCommand;
pub use run::RunCommand;
