//! 地面站实际的就绪信号来源

use super::sequencer::StartupSignals;
use crate::VideoSupervisor;
use rov_driver::{LinkError, TelemetryLink};
use rov_protocol::MotorId;
use tracing::warn;

/// `TelemetryLink` + `VideoSupervisor` + 输入设备探测
///
/// 输入设备由调用方提供的探测函数表示（窗口/手柄库不在本 crate 内）。
/// `video = None` 时视频视为未就绪。
pub struct StationSignals<'a, C> {
    link: &'a TelemetryLink,
    video: Option<&'a mut VideoSupervisor>,
    controller: C,
}

impl<'a, C> StationSignals<'a, C>
where
    C: FnMut() -> bool,
{
    pub fn new(
        link: &'a TelemetryLink,
        video: Option<&'a mut VideoSupervisor>,
        controller: C,
    ) -> Self {
        Self {
            link,
            video,
            controller,
        }
    }
}

impl<C> StartupSignals for StationSignals<'_, C>
where
    C: FnMut() -> bool,
{
    fn video_ready(&mut self) -> bool {
        match self.video.as_deref_mut() {
            Some(video) => {
                video.poll();
                video.video_ready()
            },
            None => false,
        }
    }

    fn reconnect_video(&mut self) {
        if let Some(video) = self.video.as_deref_mut() {
            video.force_reconnect();
        }
    }

    fn controller_ready(&mut self) -> bool {
        (self.controller)()
    }

    fn telemetry_ready(&self) -> bool {
        self.link.telemetry_ready()
    }

    fn command_path_ready(&self) -> bool {
        self.link.command_path_ready()
    }

    fn trigger_exchange(&mut self) {
        self.link.trigger();
    }

    fn send_motor_init(&mut self, motor: MotorId) {
        match self.link.send_motor_init(motor.index() as u8) {
            Ok(()) => {},
            Err(LinkError::Stopped) => warn!("Link stopped, {} not queued", motor),
            Err(e) => warn!("Failed to queue {}: {}", motor, e),
        }
    }

    fn motors_initialized(&self) -> u8 {
        MotorId::all()
            .filter(|m| self.link.motor_initialized(m.index() as u8))
            .fold(0, |mask, m| mask | m.bit())
    }

    fn motor_inits_pending(&self) -> bool {
        self.link.motor_inits_pending()
    }
}
