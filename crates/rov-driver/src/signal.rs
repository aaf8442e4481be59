//! 主线程与链路线程之间的触发信号
//!
//! 一把互斥锁保护全部调度状态，两个条件变量分别用于：
//! - `wake`: 唤醒链路线程（有新工作或需要退出）
//! - `done`: 通知等待者一个工作单元已结束
//!
//! 链路线程在取走工作后立即释放锁，socket IO 始终在锁外执行，
//! 因此 [`LinkSignal::trigger`] 只会短暂持锁，不会被网络阻塞。

use parking_lot::{Condvar, Mutex};
use rov_protocol::MotorId;
use std::time::{Duration, Instant};

/// 周期执行中到达的触发如何处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerPolicy {
    /// 合并为当前周期结束后的一次补发
    ///
    /// 无论执行期间到达多少次触发，最多只补发一个周期。
    #[default]
    Coalesce,
    /// 直接丢弃（下一个 tick 的触发会重新调度）
    DropWhileBusy,
}

/// 一次触发的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// 链路空闲，已调度新的交换周期
    Scheduled,
    /// 已有待执行的周期，本次触发与之合并
    Coalesced,
    /// 周期执行中，按 `DropWhileBusy` 策略丢弃
    Dropped,
    /// 链路已停止
    Stopped,
}

/// 链路线程一次取走的工作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Work {
    /// 是否执行一次交换周期（发送指令 + 尝试接收）
    pub exchange: bool,
    /// 待下发标定的电机位掩码（bit n = 电机 n）
    pub motors: u8,
}

#[derive(Debug)]
struct SignalState {
    running: bool,
    exchange_pending: bool,
    in_flight: bool,
    motor_pending: u8,
    /// 链路线程正在发送的电机位掩码
    motor_in_flight: u8,
    cycles_completed: u64,
}

impl SignalState {
    fn has_work(&self) -> bool {
        self.exchange_pending || self.motor_pending != 0
    }

    fn is_idle(&self) -> bool {
        !self.in_flight && !self.has_work()
    }
}

pub(crate) struct LinkSignal {
    state: Mutex<SignalState>,
    wake: Condvar,
    done: Condvar,
    policy: TriggerPolicy,
}

impl LinkSignal {
    pub fn new(policy: TriggerPolicy) -> Self {
        Self {
            state: Mutex::new(SignalState {
                running: true,
                exchange_pending: false,
                in_flight: false,
                motor_pending: 0,
                motor_in_flight: 0,
                cycles_completed: 0,
            }),
            wake: Condvar::new(),
            done: Condvar::new(),
            policy,
        }
    }

    pub fn policy(&self) -> TriggerPolicy {
        self.policy
    }

    /// 请求一次交换周期（非阻塞）
    pub fn trigger(&self) -> TriggerOutcome {
        let mut state = self.state.lock();
        if !state.running {
            return TriggerOutcome::Stopped;
        }
        if state.exchange_pending {
            return TriggerOutcome::Coalesced;
        }
        if state.in_flight && self.policy == TriggerPolicy::DropWhileBusy {
            return TriggerOutcome::Dropped;
        }

        state.exchange_pending = true;
        let outcome = if state.in_flight {
            TriggerOutcome::Coalesced
        } else {
            TriggerOutcome::Scheduled
        };
        drop(state);
        self.wake.notify_one();
        outcome
    }

    /// 排队一个电机标定下发
    ///
    /// 链路已停止时返回 `false`。
    pub fn queue_motor_init(&self, motor: MotorId) -> bool {
        let mut state = self.state.lock();
        if !state.running {
            return false;
        }
        state.motor_pending |= motor.bit();
        drop(state);
        self.wake.notify_one();
        true
    }

    /// 阻塞等待下一份工作（链路线程调用）
    ///
    /// 返回 `None` 表示链路已停止，线程应退出。
    pub fn next_work(&self) -> Option<Work> {
        let mut state = self.state.lock();
        while state.running && !state.has_work() {
            self.wake.wait(&mut state);
        }
        if !state.running {
            return None;
        }

        let work = Work {
            exchange: state.exchange_pending,
            motors: state.motor_pending,
        };
        state.exchange_pending = false;
        state.motor_pending = 0;
        state.motor_in_flight = work.motors;
        state.in_flight = true;
        Some(work)
    }

    /// 标记当前工作单元结束（链路线程调用）
    pub fn finish(&self, work: Work) {
        let mut state = self.state.lock();
        state.in_flight = false;
        state.motor_in_flight = 0;
        if work.exchange {
            state.cycles_completed += 1;
        }
        drop(state);
        self.done.notify_all();
    }

    /// 等待链路空闲（无执行中、无待执行工作）
    ///
    /// 超时返回 `false`；链路已停止时立即返回 `true`。
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.running && !state.is_idle() {
            if self.done.wait_until(&mut state, deadline).timed_out() {
                return !state.running || state.is_idle();
            }
        }
        true
    }

    /// 请求链路线程退出
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        drop(state);
        self.wake.notify_all();
        self.done.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// 是否还有排队中或发送中的电机标定（链路停止后恒为 `false`）
    pub fn motor_inits_pending(&self) -> bool {
        let state = self.state.lock();
        state.running && (state.motor_pending | state.motor_in_flight) != 0
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn cycles_completed(&self) -> u64 {
        self.state.lock().cycles_completed
    }
}
