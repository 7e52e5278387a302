use crate::error::ErrorKind;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Notify;

/// A bound UDP endpoint: send one packet to the configured remote address,
/// receive the next packet with its source address, close.
///
/// One instance per RTP stream; a second instance carries RTCP when not
/// muxed onto the RTP port.
pub struct Transport {
    socket: UdpSocket,
    remote: Mutex<Option<SocketAddr>>,
    closed: Notify,
}

impl Transport {
    pub async fn new(local_host: &str, local_port: u16) -> Result<Self, ErrorKind> {
        let socket = UdpSocket::bind((local_host, local_port))
            .await
            .map_err(|_| ErrorKind::BindFailed { port: local_port })?;

        Ok(Transport {
            socket,
            remote: Mutex::new(None),
            closed: Notify::new(),
        })
    }

    pub fn set_remote(&self, addr: SocketAddr) {
        *self.remote.lock().unwrap() = Some(addr);
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        *self.remote.lock().unwrap()
    }

    pub async fn send(&self, packet: &[u8]) -> Result<(), ErrorKind> {
        let Some(remote) = self.remote() else {
            return Err(ErrorKind::TransportIo("no remote address set".to_owned()));
        };

        self.socket
            .send_to(packet, remote)
            .await
            .map_err(ErrorKind::from)?;
        Ok(())
    }

    /// Blocks until a packet arrives, `timeout` elapses, or `close` is
    /// called, whichever happens first.
    pub async fn receive(&self, timeout: Duration) -> Result<(Vec<u8>, SocketAddr), ErrorKind> {
        let mut buf = vec![0u8; 65535];

        tokio::select! {
            result = tokio::time::timeout(timeout, self.socket.recv_from(&mut buf)) => {
                match result {
                    Ok(Ok((len, source))) => {
                        buf.truncate(len);
                        Ok((buf, source))
                    }
                    Ok(Err(e)) => Err(ErrorKind::from(e)),
                    Err(_) => Err(ErrorKind::Timeout(timeout)),
                }
            }
            _ = self.closed.notified() => Err(ErrorKind::TransportClosed),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ErrorKind> {
        self.socket.local_addr().map_err(ErrorKind::from)
    }

    /// Idempotent; wakes any pending `receive` with `TransportClosed`.
    pub fn close(&self) {
        self.closed.notify_waiters();
    }
}
