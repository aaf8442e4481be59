//! 链路性能指标
//!
//! 所有计数器均为 `AtomicU64`，链路线程以 `Relaxed` 递增，
//! 主线程通过 [`LinkMetrics::snapshot`] 获取一致性要求不高的快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 链路指标（原子计数器）
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// 已完成的交换周期
    pub exchange_cycles: AtomicU64,
    /// 成功发送的控制指令
    pub commands_sent: AtomicU64,
    /// 控制指令发送失败
    pub command_errors: AtomicU64,
    /// 成功解析的遥测数据报
    pub samples_received: AtomicU64,
    /// 无法解析的入站数据报
    pub datagrams_malformed: AtomicU64,
    /// 接收错误（不含 WouldBlock）
    pub recv_errors: AtomicU64,
    /// 成功发送的 thrust_init
    pub motor_inits_sent: AtomicU64,
    /// thrust_init 发送失败
    pub motor_init_errors: AtomicU64,
    /// 周期执行中到达、被合并为一次补发的触发
    pub triggers_coalesced: AtomicU64,
    /// 周期执行中到达、被丢弃的触发
    pub triggers_dropped: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> LinkMetricsSnapshot {
        LinkMetricsSnapshot {
            exchange_cycles: self.exchange_cycles.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            command_errors: self.command_errors.load(Ordering::Relaxed),
            samples_received: self.samples_received.load(Ordering::Relaxed),
            datagrams_malformed: self.datagrams_malformed.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            motor_inits_sent: self.motor_inits_sent.load(Ordering::Relaxed),
            motor_init_errors: self.motor_init_errors.load(Ordering::Relaxed),
            triggers_coalesced: self.triggers_coalesced.load(Ordering::Relaxed),
            triggers_dropped: self.triggers_dropped.load(Ordering::Relaxed),
        }
    }

    /// 清零所有计数器
    pub fn reset(&self) {
        for counter in [
            &self.exchange_cycles,
            &self.commands_sent,
            &self.command_errors,
            &self.samples_received,
            &self.datagrams_malformed,
            &self.recv_errors,
            &self.motor_inits_sent,
            &self.motor_init_errors,
            &self.triggers_coalesced,
            &self.triggers_dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkMetricsSnapshot {
    pub exchange_cycles: u64,
    pub commands_sent: u64,
    pub command_errors: u64,
    pub samples_received: u64,
    pub datagrams_malformed: u64,
    pub recv_errors: u64,
    pub motor_inits_sent: u64,
    pub motor_init_errors: u64,
    pub triggers_coalesced: u64,
    pub triggers_dropped: u64,
}

impl LinkMetricsSnapshot {
    /// 入站数据报中无法解析的比例（0.0 ~ 1.0）
    pub fn malformed_ratio(&self) -> f64 {
        let total = self.samples_received + self.datagrams_malformed;
        if total == 0 {
            0.0
        } else {
            self.datagrams_malformed as f64 / total as f64
        }
    }

    /// 控制指令发送成功率（百分比）
    pub fn command_success_rate(&self) -> f64 {
        let total = self.commands_sent + self.command_errors;
        if total == 0 {
            100.0
        } else {
            self.commands_sent as f64 / total as f64 * 100.0
        }
    }
}
