//! Inbound text listener.
//!
//! The device accepts one companion connection at a time on the inbound port.
//! Each `\n`- or NUL-terminated line overwrites the mailbox. On peer close,
//! socket error or idle timeout the connection is dropped and the listener
//! goes back to `accept`. Link state is never touched from here.

use std::io::{ErrorKind, Read};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use log::{debug, info, warn};

use super::mailbox::{Mailbox, MAX_MESSAGE_LEN};
use crate::error::LinkError;
use crate::stats::PipelineStats;

/// Splits a byte stream into bounded lines.
///
/// Bytes past [`MAX_MESSAGE_LEN`] in one line are dropped (truncation).
/// Empty lines are skipped; a trailing `\r` is stripped.
pub struct LineAssembler {
    buf: [u8; MAX_MESSAGE_LEN],
    len: usize,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_MESSAGE_LEN],
            len: 0,
        }
    }

    /// Feed received bytes, calling `on_line` for every completed line.
    pub fn feed(&mut self, bytes: &[u8], mut on_line: impl FnMut(&str)) {
        for &b in bytes {
            if b == b'\n' || b == 0 {
                self.emit(&mut on_line);
            } else if self.len < self.buf.len() {
                self.buf[self.len] = b;
                self.len += 1;
            }
        }
    }

    /// Deliver an unterminated tail (connection closed mid-line).
    pub fn finish(&mut self, mut on_line: impl FnMut(&str)) {
        self.emit(&mut on_line);
    }

    fn emit(&mut self, on_line: &mut impl FnMut(&str)) {
        let mut line = &self.buf[..self.len];
        if let [rest @ .., b'\r'] = line {
            line = rest;
        }
        if !line.is_empty() {
            let text = String::from_utf8_lossy(line);
            on_line(text.as_ref());
        }
        self.len = 0;
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Listening socket for companion text.
pub struct InboundListener {
    listener: TcpListener,
    receive_timeout: Duration,
}

impl InboundListener {
    /// Bind on all interfaces. Port 0 picks an ephemeral port.
    pub fn bind(port: u16, receive_timeout: Duration) -> Result<Self, LinkError> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))?;
        Ok(Self {
            listener,
            receive_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, LinkError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one peer and serve it until it goes away.
    ///
    /// Returns the number of lines posted to the mailbox.
    pub fn serve_one(&self, mailbox: &Mailbox, stats: &PipelineStats) -> Result<usize, LinkError> {
        let (stream, peer) = self.listener.accept()?;
        info!(target: "link", "Client connected: {}", peer);
        let lines = serve_connection(stream, self.receive_timeout, mailbox, stats);
        debug!(target: "link", "Client {} done ({} lines)", peer, lines);
        Ok(lines)
    }

    /// Serve peers forever. Accept errors are logged and the loop continues.
    pub fn run(self, mailbox: &Mailbox, stats: &PipelineStats) {
        info!(
            target: "link",
            "TCP server listening on port {}",
            self.listener.local_addr().map(|a| a.port()).unwrap_or(0)
        );
        loop {
            if let Err(e) = self.serve_one(mailbox, stats) {
                warn!(target: "link", "Failed to accept TCP connection: {}", e);
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}

fn serve_connection(
    mut stream: TcpStream,
    receive_timeout: Duration,
    mailbox: &Mailbox,
    stats: &PipelineStats,
) -> usize {
    if let Err(e) = stream.set_read_timeout(Some(receive_timeout)) {
        warn!(target: "link", "Cannot set receive timeout: {}", e);
        return 0;
    }

    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; MAX_MESSAGE_LEN + 1];
    let mut lines = 0;
    let mut deliver = |line: &str| {
        info!(target: "link", "Received TCP message: {}", line);
        mailbox.post(line);
        stats.message_received();
        lines += 1;
    };

    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                info!(target: "link", "TCP client closed the connection");
                break;
            }
            Ok(n) => assembler.feed(&buf[..n], &mut deliver),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                warn!(target: "link", "TCP recv timeout, closing");
                break;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(target: "link", "TCP recv error: {}", e);
                break;
            }
        }
    }
    assembler.finish(&mut deliver);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(chunks: &[&[u8]]) -> Vec<String> {
        let mut asm = LineAssembler::new();
        let mut out = Vec::new();
        for chunk in chunks {
            asm.feed(chunk, |l| out.push(l.to_string()));
        }
        asm.finish(|l| out.push(l.to_string()));
        out
    }

    #[test]
    fn test_newline_and_nul_delimit() {
        assert_eq!(collect(&[b"hello\nworld\0"]), vec!["hello", "world"]);
    }

    #[test]
    fn test_line_split_across_reads() {
        assert_eq!(collect(&[b"hel", b"lo\r\n"]), vec!["hello"]);
    }

    #[test]
    fn test_unterminated_tail_flushed() {
        assert_eq!(collect(&[b"a\nbc"]), vec!["a", "bc"]);
    }

    #[test]
    fn test_long_line_truncated() {
        let long = vec![b'z'; MAX_MESSAGE_LEN + 40];
        let lines = collect(&[&long, b"\nnext\n"]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), MAX_MESSAGE_LEN);
        assert_eq!(lines[1], "next");
    }

    #[test]
    fn test_empty_lines_skipped() {
        assert!(collect(&[b"\n\n\0"]).is_empty());
    }
}
