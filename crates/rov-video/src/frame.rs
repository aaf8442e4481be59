//! 视频帧与有界帧缓冲

use std::collections::VecDeque;
use std::sync::Arc;

/// 每像素字节数（24 位单平面格式）
pub const BYTES_PER_PIXEL: usize = 3;

/// 一帧解码后的图像（RGB24，行优先，无行填充）
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// 读取线程分配的递增序号（从 1 开始）
    pub seq: u64,
    pub data: Vec<u8>,
}

impl Frame {
    /// 期望的帧字节数
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    /// 指定坐标的像素（越界或数据不足时返回 None）
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.data.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2]])
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("seq", &self.seq)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// 原地交换 B/R 通道（BGR24 → RGB24）
pub fn bgr_to_rgb_in_place(data: &mut [u8]) {
    for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
        px.swap(0, 2);
    }
}

/// 有界帧缓冲（丢弃最旧）
///
/// - `len() <= capacity()` 恒成立
/// - `push` 永不阻塞：满时先淘汰最旧的帧
///
/// 本身不加锁，由 `VideoIngest` 在外层用互斥锁保护，
/// 锁只在 push/读取期间持有，从不跨越 IO。
#[derive(Debug)]
pub struct FrameBuffer {
    capacity: usize,
    frames: VecDeque<Arc<Frame>>,
}

impl FrameBuffer {
    /// 默认容量
    pub const DEFAULT_CAPACITY: usize = 10;

    /// 创建缓冲，容量至少为 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            frames: VecDeque::with_capacity(capacity),
        }
    }

    /// 压入新帧，返回被淘汰的帧（若有）
    pub fn push(&mut self, frame: Arc<Frame>) -> Option<Arc<Frame>> {
        let evicted = if self.frames.len() >= self.capacity {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    /// 最新的帧
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.frames.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// 从旧到新迭代
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Frame>> {
        self.frames.iter()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
