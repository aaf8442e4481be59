//! 外部解码进程配置
//!
//! 解码交给外部 ffmpeg 进程：标准输出为无分隔的原始 BGR24 帧，
//! 标准错误为诊断文本行。

use crate::error::VideoError;
use crate::frame::Frame;
use std::process::{Child, Command, Stdio};

/// 硬件加速设置（对应 `-hwaccel <name> -hwaccel_device <device>`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwAccel {
    pub name: String,
    pub device: Option<String>,
}

/// 解码进程配置
///
/// # Example
///
/// ```
/// use rov_video::DecoderConfig;
///
/// let config = DecoderConfig::rtsp("rtsp://admin:pw@192.168.0.11:554/stream0", 1280, 720);
/// let args = config.args();
/// assert_eq!(args[0], "-rtsp_transport");
/// assert_eq!(args.last().unwrap(), "-");
/// assert_eq!(config.frame_size(), 1280 * 720 * 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// 解码程序（默认 `ffmpeg`）
    pub program: String,
    /// 输入地址
    pub input_url: String,
    pub width: u32,
    pub height: u32,
    /// RTSP 传输协议（默认 `tcp`）
    pub rtsp_transport: Option<String>,
    /// 硬件加速（默认关闭）
    pub hwaccel: Option<HwAccel>,
    /// 追加在输出参数之前的额外参数
    pub extra_args: Vec<String>,
    /// 完全替换生成的参数列表（用于非 ffmpeg 的解码程序）
    pub args_override: Option<Vec<String>>,
}

impl DecoderConfig {
    /// 默认解码程序
    pub const DEFAULT_PROGRAM: &'static str = "ffmpeg";

    /// 低延迟 ffmpeg RTSP 配置
    pub fn rtsp(input_url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            program: Self::DEFAULT_PROGRAM.to_string(),
            input_url: input_url.into(),
            width,
            height,
            rtsp_transport: Some("tcp".to_string()),
            hwaccel: None,
            extra_args: Vec::new(),
            args_override: None,
        }
    }

    /// 任意程序 + 固定参数（程序需按相同分辨率输出原始 24 位帧）
    pub fn command<I, S>(program: impl Into<String>, args: I, width: u32, height: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            input_url: String::new(),
            width,
            height,
            rtsp_transport: None,
            hwaccel: None,
            extra_args: Vec::new(),
            args_override: Some(args.into_iter().map(Into::into).collect()),
        }
    }

    /// 由相机参数拼接 RTSP 地址
    pub fn rtsp_url(username: &str, password: &str, host: &str, stream_path: &str) -> String {
        let path = stream_path.trim_start_matches('/');
        if username.is_empty() {
            format!("rtsp://{}:554/{}", host, path)
        } else {
            format!("rtsp://{}:{}@{}:554/{}", username, password, host, path)
        }
    }

    pub fn with_hwaccel(mut self, name: impl Into<String>, device: Option<String>) -> Self {
        self.hwaccel = Some(HwAccel {
            name: name.into(),
            device,
        });
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// 单帧字节数（`width * height * 3`）
    pub fn frame_size(&self) -> usize {
        Frame::byte_len(self.width, self.height)
    }

    /// 检查分辨率
    pub fn validate(&self) -> Result<(), VideoError> {
        if self.width == 0 || self.height == 0 {
            return Err(VideoError::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// 生成解码程序参数
    pub fn args(&self) -> Vec<String> {
        if let Some(args) = &self.args_override {
            return args.clone();
        }

        let mut args: Vec<String> = Vec::with_capacity(40);
        let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));

        if let Some(transport) = &self.rtsp_transport {
            push(&["-rtsp_transport", transport]);
        }
        push(&["-fflags", "nobuffer", "-flags", "low_delay"]);
        if let Some(hw) = &self.hwaccel {
            push(&["-hwaccel", &hw.name]);
            if let Some(device) = &hw.device {
                push(&["-hwaccel_device", device]);
            }
        }
        push(&["-i", &self.input_url]);
        push(&[
            "-f",
            "image2pipe",
            "-pix_fmt",
            "bgr24",
            "-vcodec",
            "rawvideo",
            "-an",
            "-sn",
            "-probesize",
            "32",
            "-analyzeduration",
            "0",
            "-tune",
            "zerolatency",
            "-preset",
            "ultrafast",
            "-threads",
            "1",
        ]);
        args.extend(self.extra_args.iter().cloned());
        args.push("-".to_string());
        args
    }

    /// 启动解码进程（标准输出/错误为管道，标准输入关闭）
    pub fn spawn(&self) -> Result<Child, VideoError> {
        self.validate()?;
        Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| VideoError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}
