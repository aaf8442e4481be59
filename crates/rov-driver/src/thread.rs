//! 线程工具
//!
//! 所有后台线程的退出流程统一为：置 `running = false` → 唤醒 → 带超时 join。
//! 超时只记录日志，清理流程继续执行。

use crossbeam_channel::RecvTimeoutError;
use std::thread::{JoinHandle, spawn};
use std::time::Duration;

/// 带超时的 join
pub trait JoinTimeout {
    /// 等待线程退出，最长 `timeout`
    ///
    /// # 返回
    /// - `Ok(())`: 线程已正常退出
    /// - `Err(_)`: 超时，或线程 panic
    ///
    /// 超时后看守线程继续等待目标线程，进程退出时由操作系统回收。
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        if self.is_finished() {
            return self.join().map(|_| ());
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result.map(|_| ()));
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result,
            Err(RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}
