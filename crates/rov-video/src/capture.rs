//! 截图
//!
//! 把 RGB 帧编码为 JPEG 写入目录，文件名按 `capture_0001.jpg` 递增编号。

use crate::error::VideoError;
use crate::frame::Frame;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// 截图写入器
///
/// 编号只在本实例内递增，视频重连不会重置（由 `VideoSupervisor` 持有）。
/// 写入失败不消耗编号。
#[derive(Debug, Clone)]
pub struct FrameCapture {
    dir: PathBuf,
    count: u32,
    quality: u8,
}

impl FrameCapture {
    /// 默认 JPEG 质量
    pub const DEFAULT_QUALITY: u8 = 90;

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            count: 0,
            quality: Self::DEFAULT_QUALITY,
        }
    }

    /// 设置 JPEG 质量（1..=100）
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 已保存的截图数
    pub fn count(&self) -> u32 {
        self.count
    }

    /// 保存一帧，目录不存在时创建
    ///
    /// # 返回
    ///
    /// 写出的文件路径
    ///
    /// # 错误
    /// - `VideoError::InvalidResolution`: 帧数据与尺寸不符
    /// - `VideoError::Encode`: JPEG 编码失败
    /// - `VideoError::Write`: 目录创建或文件写入失败
    pub fn save(&mut self, frame: &Frame) -> Result<PathBuf, VideoError> {
        let jpeg = encode_jpeg(frame, self.quality)?;
        fs::create_dir_all(&self.dir).map_err(|source| VideoError::Write {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.dir.join(format!("capture_{:04}.jpg", self.count + 1));
        fs::write(&path, jpeg).map_err(|source| VideoError::Write {
            path: path.clone(),
            source,
        })?;
        self.count += 1;

        info!("Saved frame #{} to {}", frame.seq, path.display());
        Ok(path)
    }
}

/// 把 RGB 帧编码为 JPEG
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, VideoError> {
    let invalid = || VideoError::InvalidResolution {
        width: frame.width,
        height: frame.height,
    };
    let data = frame
        .data
        .get(..Frame::byte_len(frame.width, frame.height))
        .ok_or_else(invalid)?;
    let image: RgbImage =
        ImageBuffer::from_raw(frame.width, frame.height, data.to_vec()).ok_or_else(invalid)?;

    let mut buf = Vec::new();
    image.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn gradient(width: u32, height: u32, seq: u64) -> Frame {
        let data = (0..width * height)
            .flat_map(|i| {
                let v = (i % 256) as u8;
                [v, 255 - v, 128]
            })
            .collect();
        Frame {
            width,
            height,
            seq,
            data,
        }
    }

    #[test]
    fn test_save_writes_numbered_jpegs() {
        let dir = TempDir::new().unwrap();
        let mut capture = FrameCapture::new(dir.path().join("captures")).with_quality(75);

        let first = capture.save(&gradient(32, 24, 1)).unwrap();
        let second = capture.save(&gradient(32, 24, 2)).unwrap();

        assert_eq!(first, dir.path().join("captures").join("capture_0001.jpg"));
        assert_eq!(second.file_name().unwrap(), "capture_0002.jpg");
        assert_eq!(capture.count(), 2);

        let decoded = image::open(&first).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn test_short_frame_is_rejected_without_consuming_number() {
        let dir = TempDir::new().unwrap();
        let mut capture = FrameCapture::new(dir.path());
        let mut frame = gradient(8, 8, 1);
        frame.data.truncate(10);

        assert!(matches!(
            capture.save(&frame),
            Err(VideoError::InvalidResolution {
                width: 8,
                height: 8
            })
        ));
        assert_eq!(capture.count(), 0);
        assert!(!dir.path().join("capture_0001.jpg").exists());
    }

    #[test]
    fn test_unwritable_dir_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();

        let mut capture = FrameCapture::new(&blocker);
        assert!(matches!(
            capture.save(&gradient(4, 4, 1)),
            Err(VideoError::Write { .. })
        ));
        assert_eq!(capture.count(), 0);
    }

    #[test]
    fn test_encode_jpeg_magic() {
        let jpeg = encode_jpeg(&gradient(16, 16, 1), 80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}
