//! 链路 IO 循环模块
//!
//! 负责链路线程的指令发送、遥测接收和电机标定下发。
//! 所有 socket IO 都在这里发生，且都在信号锁之外执行。

use crate::metrics::LinkMetrics;
use crate::signal::{LinkSignal, Work};
use crate::state::VehicleContext;
use crate::transport::DatagramTransport;
use rov_protocol::{MAX_DATAGRAM_SIZE, MotorId, ThrustInit, decode_telemetry};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 链路线程参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 相邻两个电机标定数据报之间的间隔
    ///
    /// ROV 端逐条处理 `thrust_init`，连续突发可能被丢弃。
    pub motor_init_gap: Duration,
}

impl PipelineConfig {
    /// 默认电机标定间隔
    pub const DEFAULT_MOTOR_INIT_GAP: Duration = Duration::from_millis(50);
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            motor_init_gap: Self::DEFAULT_MOTOR_INIT_GAP,
        }
    }
}

/// 连续失败日志抑制
///
/// 第一次失败记 `error!`，后续重复失败降为 `debug!`，
/// 恢复时记一条 `info!`，避免链路断开时每个 tick 刷屏。
#[derive(Debug, Default)]
pub struct FailureLatch {
    consecutive: u64,
}

impl FailureLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次失败
    pub fn fail(&mut self, what: &str, err: &dyn std::fmt::Display) {
        self.consecutive += 1;
        if self.consecutive == 1 {
            error!("{}: {}", what, err);
        } else {
            debug!("{} (repeated {} times): {}", what, self.consecutive, err);
        }
    }

    /// 记录一次成功
    pub fn recover(&mut self, what: &str) {
        if self.consecutive > 0 {
            info!("{} recovered after {} failures", what, self.consecutive);
            self.consecutive = 0;
        }
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive
    }
}

/// 链路线程主循环
///
/// 阻塞在信号上等待工作；被 [`LinkSignal::stop`] 唤醒后退出。
///
/// # 参数
/// - `transport`: 数据报传输（线程独占）
/// - `ctx`: 共享车辆状态
/// - `signal`: 触发信号
/// - `metrics`: 链路指标
/// - `config`: 链路线程参数
pub(crate) fn exchange_loop(
    mut transport: impl DatagramTransport,
    ctx: Arc<VehicleContext>,
    signal: Arc<LinkSignal>,
    metrics: Arc<LinkMetrics>,
    config: PipelineConfig,
) {
    let mut send_latch = FailureLatch::new();
    let mut recv_latch = FailureLatch::new();
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    while let Some(work) = signal.next_work() {
        // 电机标定优先于指令：初始化阶段主循环还未开始推送推力
        if work.motors != 0 {
            send_motor_inits(
                &mut transport,
                &ctx,
                &metrics,
                work.motors,
                config.motor_init_gap,
            );
        }
        if work.exchange {
            run_exchange(
                &mut transport,
                &ctx,
                &metrics,
                &mut buf,
                &mut send_latch,
                &mut recv_latch,
            );
            metrics.exchange_cycles.fetch_add(1, Ordering::Relaxed);
        }
        signal.finish(work);
    }

    trace!("Link thread: stop requested, exiting");
}

/// 执行一次交换周期：发送当前指令，再尝试读取至多一个遥测数据报
///
/// 发送失败时跳过本周期的接收。
pub(crate) fn run_exchange(
    transport: &mut impl DatagramTransport,
    ctx: &VehicleContext,
    metrics: &LinkMetrics,
    buf: &mut [u8],
    send_latch: &mut FailureLatch,
    recv_latch: &mut FailureLatch,
) {
    let command = ctx.command();
    let payload = match command.encode() {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Command encode failed, cycle skipped: {}", e);
            metrics.command_errors.fetch_add(1, Ordering::Relaxed);
            return;
        },
    };

    if let Err(e) = transport.send(&payload) {
        metrics.command_errors.fetch_add(1, Ordering::Relaxed);
        send_latch.fail("Command send failed", &e);
        return;
    }
    send_latch.recover("Command send");
    metrics.commands_sent.fetch_add(1, Ordering::Relaxed);

    match transport.try_recv(buf) {
        Ok(Some(len)) => {
            recv_latch.recover("Telemetry receive");
            match decode_telemetry(&buf[..len]) {
                Ok(sample) => {
                    metrics.samples_received.fetch_add(1, Ordering::Relaxed);
                    ctx.publish_sample(sample);
                },
                Err(e) => {
                    metrics.datagrams_malformed.fetch_add(1, Ordering::Relaxed);
                    trace!("Dropping malformed telemetry datagram ({} bytes): {}", len, e);
                },
            }
        },
        Ok(None) => {},
        Err(e) => {
            metrics.recv_errors.fetch_add(1, Ordering::Relaxed);
            recv_latch.fail("Telemetry receive failed", &e);
        },
    }
}

/// 按位掩码下发电机标定
///
/// 相邻两条之间间隔 `gap`（第一条之前、最后一条之后不等待）。
/// 发送成功的通道被标记为已初始化；失败的通道保持原状，由调用方决定是否重试。
pub(crate) fn send_motor_inits(
    transport: &mut impl DatagramTransport,
    ctx: &VehicleContext,
    metrics: &LinkMetrics,
    mask: u8,
    gap: Duration,
) {
    for (i, motor) in MotorId::all().filter(|m| mask & m.bit() != 0).enumerate() {
        if i > 0 && !gap.is_zero() {
            spin_sleep::sleep(gap);
        }
        let message = ThrustInit::new(motor, ctx.motors.calibration(motor));
        let result = message
            .encode()
            .map_err(|e| e.to_string())
            .and_then(|payload| transport.send(&payload).map_err(|e| e.to_string()));

        match result {
            Ok(()) => {
                metrics.motor_inits_sent.fetch_add(1, Ordering::Relaxed);
                if ctx.motors.mark_initialized(motor) {
                    info!("Motor {} calibration sent", motor);
                } else {
                    debug!("Motor {} calibration re-sent", motor);
                }
            },
            Err(e) => {
                metrics.motor_init_errors.fetch_add(1, Ordering::Relaxed);
                error!("Motor {} calibration send failed: {}", motor, e);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use rov_protocol::{CommandVector, SensorSample};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedTransport {
        sent: Vec<Vec<u8>>,
        inbound: VecDeque<Vec<u8>>,
        fail_send: bool,
        fail_recv: bool,
    }

    impl DatagramTransport for ScriptedTransport {
        fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
            if self.fail_send {
                return Err(std::io::Error::other("network unreachable").into());
            }
            self.sent.push(payload.to_vec());
            Ok(())
        }

        fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
            if self.fail_recv {
                return Err(std::io::Error::other("connection refused").into());
            }
            Ok(self.inbound.pop_front().map(|d| {
                buf[..d.len()].copy_from_slice(&d);
                d.len()
            }))
        }
    }

    fn exchange(transport: &mut ScriptedTransport, ctx: &VehicleContext, metrics: &LinkMetrics) {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        run_exchange(
            transport,
            ctx,
            metrics,
            &mut buf,
            &mut FailureLatch::new(),
            &mut FailureLatch::new(),
        );
    }

    #[test]
    fn test_exchange_sends_command_and_updates_sample() {
        let ctx = VehicleContext::default();
        ctx.command.store(Arc::new(CommandVector {
            x: 0.5,
            ..CommandVector::default()
        }));
        let metrics = LinkMetrics::new();
        let mut transport = ScriptedTransport::default();
        transport.inbound.push_back(b"{\"depth\":1.24,\"temperature\":22.5}\n".to_vec());

        exchange(&mut transport, &ctx, &metrics);

        assert_eq!(transport.sent.len(), 1);
        assert!(transport.sent[0].starts_with(b"{\"x\":0.5"));
        assert_eq!(
            ctx.sensor(),
            SensorSample {
                depth: 1.24,
                temperature: 22.5
            }
        );
        assert_eq!(metrics.snapshot().samples_received, 1);
    }

    #[test]
    fn test_reads_at_most_one_datagram_per_cycle() {
        let ctx = VehicleContext::default();
        let metrics = LinkMetrics::new();
        let mut transport = ScriptedTransport::default();
        transport.inbound.push_back(b"{\"depth\":1.0,\"temperature\":10.0}".to_vec());
        transport.inbound.push_back(b"{\"depth\":2.0,\"temperature\":20.0}".to_vec());

        exchange(&mut transport, &ctx, &metrics);
        assert_eq!(ctx.sensor().depth, 1.0);
        assert_eq!(transport.inbound.len(), 1);
    }

    #[test]
    fn test_malformed_datagram_keeps_previous_sample() {
        let ctx = VehicleContext::default();
        let metrics = LinkMetrics::new();
        let mut transport = ScriptedTransport::default();
        transport.inbound.push_back(b"{\"depth\":3.0,\"temperature\":15.0}".to_vec());
        transport.inbound.push_back(b"{\"depth\":".to_vec());

        exchange(&mut transport, &ctx, &metrics);
        exchange(&mut transport, &ctx, &metrics);

        assert_eq!(ctx.sensor().depth, 3.0);
        let snap = metrics.snapshot();
        assert_eq!(snap.samples_received, 1);
        assert_eq!(snap.datagrams_malformed, 1);
        assert_eq!(ctx.samples_received(), 1);
    }

    #[test]
    fn test_send_failure_skips_receive() {
        let ctx = VehicleContext::default();
        let metrics = LinkMetrics::new();
        let mut transport = ScriptedTransport {
            fail_send: true,
            ..Default::default()
        };
        transport.inbound.push_back(b"{\"depth\":1.0,\"temperature\":1.0}".to_vec());

        exchange(&mut transport, &ctx, &metrics);

        assert!(ctx.sensor().is_sentinel());
        assert_eq!(transport.inbound.len(), 1);
        assert_eq!(metrics.snapshot().command_errors, 1);
    }

    #[test]
    fn test_recv_error_is_counted_not_fatal() {
        let ctx = VehicleContext::default();
        let metrics = LinkMetrics::new();
        let mut transport = ScriptedTransport {
            fail_recv: true,
            ..Default::default()
        };

        exchange(&mut transport, &ctx, &metrics);
        let snap = metrics.snapshot();
        assert_eq!(snap.commands_sent, 1);
        assert_eq!(snap.recv_errors, 1);
    }

    #[test]
    fn test_non_finite_command_encodes_as_null() {
        let ctx = VehicleContext::default();
        ctx.command.store(Arc::new(CommandVector {
            yaw: f64::NAN,
            ..CommandVector::default()
        }));
        let metrics = LinkMetrics::new();
        let mut transport = ScriptedTransport::default();

        exchange(&mut transport, &ctx, &metrics);
        // serde_json 将 NaN 编码为 null，指令仍然发出
        assert_eq!(transport.sent.len(), 1);
        let line = String::from_utf8(transport.sent[0].clone()).unwrap();
        assert!(line.contains("\"yaw\":null"));
    }

    #[test]
    fn test_motor_inits_follow_mask() {
        let ctx = VehicleContext::default();
        let metrics = LinkMetrics::new();
        let mut transport = ScriptedTransport::default();

        send_motor_inits(&mut transport, &ctx, &metrics, 0b00_0101, Duration::ZERO);

        assert_eq!(transport.sent.len(), 2);
        assert!(transport.sent[0].starts_with(b"{\"cmd\":\"thrust_init\",\"motor\":0,"));
        assert!(transport.sent[1].starts_with(b"{\"cmd\":\"thrust_init\",\"motor\":2,"));
        assert_eq!(ctx.motors.uninitialized().len(), 4);
        assert_eq!(metrics.snapshot().motor_inits_sent, 2);
    }

    #[test]
    fn test_failed_motor_init_stays_uninitialized() {
        let ctx = VehicleContext::default();
        let metrics = LinkMetrics::new();
        let mut transport = ScriptedTransport {
            fail_send: true,
            ..Default::default()
        };

        send_motor_inits(&mut transport, &ctx, &metrics, 0b11_1111, Duration::ZERO);
        assert_eq!(ctx.motors.uninitialized().len(), 6);
        assert_eq!(metrics.snapshot().motor_init_errors, 6);
    }

    #[test]
    fn test_motor_inits_are_paced() {
        let ctx = VehicleContext::default();
        let metrics = LinkMetrics::new();
        let mut transport = ScriptedTransport::default();

        let start = std::time::Instant::now();
        send_motor_inits(
            &mut transport,
            &ctx,
            &metrics,
            0b00_0111,
            Duration::from_millis(20),
        );

        // 三条之间两个间隔
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(transport.sent.len(), 3);
        assert_eq!(metrics.snapshot().motor_inits_sent, 3);
    }

    #[test]
    fn test_pipeline_config_default_gap() {
        assert_eq!(
            PipelineConfig::default().motor_init_gap,
            Duration::from_millis(50)
        );
    }

    #[test]
    fn test_failure_latch_counts_and_recovers() {
        let mut latch = FailureLatch::new();
        latch.fail("send", &"boom");
        latch.fail("send", &"boom");
        assert_eq!(latch.consecutive_failures(), 2);
        latch.recover("send");
        assert_eq!(latch.consecutive_failures(), 0);
    }
}
