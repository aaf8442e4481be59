//! 数据报传输抽象
//!
//! `DatagramTransport` 是链路线程与底层 socket 之间的接缝：
//! 生产环境使用非阻塞 UDP，测试使用内存实现。

use crate::error::TransportError;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// 数据报传输 trait
///
/// # 要求
///
/// - `send` 发送一个完整数据报
/// - `try_recv` **不得阻塞**：无数据时立即返回 `Ok(None)`
pub trait DatagramTransport: Send {
    /// 发送一个数据报
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// 尝试接收一个数据报（非阻塞）
    ///
    /// 返回 `Ok(Some(len))` 表示 `buf[..len]` 为收到的数据报。
    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError>;
}

/// 非阻塞 UDP 传输
///
/// 绑定本地端口，向固定远端地址发送。
pub struct UdpTransport {
    socket: UdpSocket,
    remote: SocketAddr,
}

impl UdpTransport {
    /// 绑定本地端口并设置为非阻塞
    ///
    /// `local_port = 0` 表示由系统分配端口。
    pub fn bind(local_port: u16, remote: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let remote_addr = remote
            .to_socket_addrs()
            .map_err(|e| TransportError::AddrResolve(e.to_string()))?
            .next()
            .ok_or_else(|| TransportError::AddrResolve("no address".to_string()))?;

        let socket = UdpSocket::bind(("0.0.0.0", local_port))?;
        socket.set_nonblocking(true)?;

        Ok(Self {
            socket,
            remote: remote_addr,
        })
    }

    /// 本地绑定地址
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// 远端地址
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }
}

impl DatagramTransport for UdpTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.socket.send_to(payload, self.remote)?;
        Ok(())
    }

    fn try_recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        match self.socket.recv_from(buf) {
            Ok((len, _from)) => Ok(Some(len)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
