//! 解码进程诊断日志（环形缓冲）

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace, warn};

/// 诊断行环形缓冲，只保留最近 `capacity` 行
#[derive(Debug)]
pub struct DiagnosticLog {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl DiagnosticLog {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// 最近 `n` 行（从旧到新）
    pub fn recent(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock();
        let skip = lines.len().saturating_sub(n);
        lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// 诊断线程主循环：逐行读取解码进程的标准错误
///
/// 读到 EOF、读取出错或 `running` 被清除后退出。
/// 非 UTF-8 内容按有损方式解码；空行丢弃。
pub(crate) fn drain_diagnostics(
    mut reader: impl BufRead,
    log: Arc<DiagnosticLog>,
    running: Arc<AtomicBool>,
) {
    let mut raw = Vec::with_capacity(256);
    while running.load(Ordering::Acquire) {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => {
                trace!("Decoder diagnostics stream closed");
                break;
            },
            Ok(_) => {
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                debug!(target: "rov_video::decoder", "{}", line);
                log.push(line.to_string());
            },
            Err(e) => {
                warn!("Reading decoder diagnostics failed: {}", e);
                break;
            },
        }
    }
}
