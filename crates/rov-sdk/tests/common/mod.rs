//! 测试用 ROV 端模拟
//!
//! 绑定本地 UDP 端口；收到控制向量时回复一条遥测，收到 `thrust_init` 时记录电机编号。

#![allow(dead_code)]

use serde_json::Value;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct FakeRov {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    commands: Arc<Mutex<Vec<Value>>>,
    motor_inits: Arc<Mutex<Vec<u64>>>,
    handle: Option<JoinHandle<()>>,
}

impl FakeRov {
    /// 启动模拟端，对每条控制向量回复 `reply`（`None` 表示不回复）
    pub fn start(reply: Option<&'static str>) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let addr = socket.local_addr().unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let commands = Arc::new(Mutex::new(Vec::new()));
        let motor_inits = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let running = running.clone();
            let commands = commands.clone();
            let motor_inits = motor_inits.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 1024];
                while running.load(Ordering::Acquire) {
                    let Ok((n, from)) = socket.recv_from(&mut buf) else {
                        continue;
                    };
                    let Ok(msg) = serde_json::from_slice::<Value>(&buf[..n]) else {
                        continue;
                    };
                    if msg["cmd"] == "thrust_init" {
                        if let Some(motor) = msg["motor"].as_u64() {
                            motor_inits.lock().unwrap().push(motor);
                        }
                        continue;
                    }
                    commands.lock().unwrap().push(msg);
                    if let Some(reply) = reply {
                        let _ = socket.send_to(reply.as_bytes(), from);
                    }
                }
            })
        };

        Self {
            addr,
            running,
            commands,
            motor_inits,
            handle: Some(handle),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn commands(&self) -> Vec<Value> {
        self.commands.lock().unwrap().clone()
    }

    pub fn motor_inits(&self) -> Vec<u64> {
        self.motor_inits.lock().unwrap().clone()
    }
}

impl Drop for FakeRov {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
