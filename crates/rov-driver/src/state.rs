//! 共享车辆状态
//!
//! 写入方唯一：
//! - `command`: 仅主线程写入，链路线程读取
//! - `sensor`: 仅链路线程写入，主线程读取
//! - `motors.initialized`: 仅链路线程在发送成功后置位（false → true）
//!
//! 同步机制：ArcSwap 整值替换，读取方永远看到完整快照，不会读到撕裂的字段。

use arc_swap::ArcSwap;
use parking_lot::{Condvar, Mutex};
use rov_protocol::{CommandVector, MOTOR_COUNT, MotorCalibration, MotorId, SensorSample};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 电机通道快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorChannel {
    pub id: MotorId,
    pub calibration: MotorCalibration,
    /// 标定参数是否已成功发送（未经 ROV 确认）
    pub initialized: bool,
}

/// 六通道电机标定表
///
/// 标定参数在构造后不可变；`initialized` 标志只会从 false 变为 true。
#[derive(Debug)]
pub struct MotorTable {
    calibration: [MotorCalibration; MOTOR_COUNT],
    initialized: [AtomicBool; MOTOR_COUNT],
}

impl MotorTable {
    pub fn new(calibration: [MotorCalibration; MOTOR_COUNT]) -> Self {
        Self {
            calibration,
            initialized: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    /// 指定电机的标定参数
    pub fn calibration(&self, id: MotorId) -> &MotorCalibration {
        &self.calibration[id.index()]
    }

    /// 标记为已初始化（单向）
    pub(crate) fn mark_initialized(&self, id: MotorId) -> bool {
        !self.initialized[id.index()].swap(true, Ordering::AcqRel)
    }

    pub fn is_initialized(&self, id: MotorId) -> bool {
        self.initialized[id.index()].load(Ordering::Acquire)
    }

    pub fn all_initialized(&self) -> bool {
        MotorId::all().all(|id| self.is_initialized(id))
    }

    /// 尚未成功发送的通道
    pub fn uninitialized(&self) -> Vec<MotorId> {
        MotorId::all().filter(|&id| !self.is_initialized(id)).collect()
    }

    /// 全部通道快照
    pub fn channels(&self) -> Vec<MotorChannel> {
        MotorId::all()
            .map(|id| MotorChannel {
                id,
                calibration: self.calibration[id.index()],
                initialized: self.is_initialized(id),
            })
            .collect()
    }
}

impl Default for MotorTable {
    fn default() -> Self {
        Self::new([MotorCalibration::DEFAULT; MOTOR_COUNT])
    }
}

/// 车辆共享上下文
///
/// 由 `TelemetryLink` 创建，以 `Arc` 在主线程与链路线程间共享。
pub struct VehicleContext {
    /// 当前控制向量（主线程写）
    pub command: ArcSwap<CommandVector>,
    /// 最近一次遥测采样（链路线程写）
    pub sensor: ArcSwap<SensorSample>,
    /// 电机标定表
    pub motors: MotorTable,
    /// 已接收的有效遥测数量（用于等待新采样）
    sample_seq: Mutex<u64>,
    sample_arrived: Condvar,
}

impl VehicleContext {
    pub fn new(motors: MotorTable, initial_command: CommandVector) -> Self {
        Self {
            command: ArcSwap::from_pointee(initial_command),
            sensor: ArcSwap::from_pointee(SensorSample::SENTINEL),
            motors,
            sample_seq: Mutex::new(0),
            sample_arrived: Condvar::new(),
        }
    }

    /// 当前控制向量快照
    pub fn command(&self) -> CommandVector {
        **self.command.load()
    }

    /// 最近遥测快照
    pub fn sensor(&self) -> SensorSample {
        **self.sensor.load()
    }

    /// 已接收的有效遥测数量
    pub fn samples_received(&self) -> u64 {
        *self.sample_seq.lock()
    }

    /// 发布新的遥测采样并唤醒等待者
    pub(crate) fn publish_sample(&self, sample: SensorSample) {
        self.sensor.store(Arc::new(sample));
        let mut seq = self.sample_seq.lock();
        *seq += 1;
        self.sample_arrived.notify_all();
    }

    /// 等待序号超过 `after` 的新采样，最长 `timeout`
    ///
    /// 返回新采样；超时返回 `None`。
    pub fn wait_sample_after(&self, after: u64, timeout: Duration) -> Option<SensorSample> {
        let deadline = Instant::now() + timeout;
        let mut seq = self.sample_seq.lock();
        while *seq <= after {
            if self.sample_arrived.wait_until(&mut seq, deadline).timed_out() {
                break;
            }
        }
        (*seq > after).then(|| self.sensor())
    }
}

impl Default for VehicleContext {
    fn default() -> Self {
        Self::new(MotorTable::default(), CommandVector::default())
    }
}
