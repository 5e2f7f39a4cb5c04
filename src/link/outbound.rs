//! Outbound channels: sample datagrams (UDP) and control commands (TCP).
//!
//! Neither channel retries. Callers log the error and move on.

use std::io::Write;
use std::net::{Ipv4Addr, SocketAddr, TcpStream, UdpSocket};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::LinkError;

/// Connectionless sample channel, open only while the link is up.
pub struct SampleChannel {
    socket: Mutex<Option<Arc<UdpSocket>>>,
    dest: SocketAddr,
    local_port: u16,
    send_timeout: Duration,
}

impl SampleChannel {
    pub fn new(dest: SocketAddr, local_port: u16, send_timeout: Duration) -> Self {
        Self {
            socket: Mutex::new(None),
            dest,
            local_port,
            send_timeout,
        }
    }

    /// Bind the local socket. Replaces any previous socket.
    pub fn open(&self) -> Result<SocketAddr, LinkError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.local_port))?;
        socket.set_write_timeout(Some(self.send_timeout))?;
        let local = socket.local_addr()?;
        *self.lock() = Some(Arc::new(socket));
        Ok(local)
    }

    pub fn close(&self) {
        self.lock().take();
    }

    pub fn dest(&self) -> SocketAddr {
        self.dest
    }

    /// Send one datagram. The lock only covers cloning the handle.
    pub fn send(&self, payload: &[u8]) -> Result<usize, LinkError> {
        let socket = self.lock().clone().ok_or(LinkError::NotConnected)?;
        Ok(socket.send_to(payload, self.dest)?)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<UdpSocket>>> {
        self.socket.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Connection-oriented command channel: one fresh connection per command.
pub struct CommandChannel {
    dest: SocketAddr,
    connect_timeout: Duration,
    send_timeout: Duration,
}

impl CommandChannel {
    pub fn new(dest: SocketAddr, connect_timeout: Duration, send_timeout: Duration) -> Self {
        Self {
            dest,
            connect_timeout,
            send_timeout,
        }
    }

    pub fn dest(&self) -> SocketAddr {
        self.dest
    }

    /// Connect, write `text` plus a newline, close.
    pub fn send(&self, text: &str) -> Result<(), LinkError> {
        let mut stream = TcpStream::connect_timeout(&self.dest, self.connect_timeout)?;
        stream.set_write_timeout(Some(self.send_timeout))?;

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        stream.write_all(line.as_bytes())?;
        stream.flush()?;
        Ok(())
    }
}
