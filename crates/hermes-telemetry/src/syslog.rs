//! Syslog log output.
//!
//! Each formatted event is sent as one RFC 3164 datagram, `<PRI>tag: message`,
//! over UDP or a local Unix datagram socket. The priority combines the
//! configured facility with a severity derived from the event level.

use serde::{Deserialize, Serialize};
use std::io;
use std::net::UdpSocket;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Transport used to reach the syslog daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyslogProtocol {
    /// UDP datagrams to `host:port`.
    #[default]
    Udp,
    /// Datagrams to a local socket path such as `/dev/log`.
    Unix,
}

/// Syslog output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    /// Transport.
    pub protocol: SyslogProtocol,

    /// `host:port` for UDP, socket path for Unix.
    pub address: String,

    /// Facility code (1 = user, 16..=23 = local0..local7).
    pub facility: u8,

    /// Tag prefixed to every message.
    pub tag: String,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            protocol: SyslogProtocol::Udp,
            address: "127.0.0.1:514".to_string(),
            facility: 1,
            tag: "hermes".to_string(),
        }
    }
}

impl SyslogConfig {
    /// Opens the socket and returns a writer for the subscriber.
    pub fn connect(&self) -> io::Result<SyslogWriter> {
        let socket = match self.protocol {
            SyslogProtocol::Udp => {
                let bind = if self.address.starts_with('[') {
                    "[::]:0"
                } else {
                    "0.0.0.0:0"
                };
                let socket = UdpSocket::bind(bind)?;
                socket.connect(&self.address)?;
                Socket::Udp(socket)
            }
            #[cfg(unix)]
            SyslogProtocol::Unix => {
                let socket = std::os::unix::net::UnixDatagram::unbound()?;
                socket.connect(&self.address)?;
                Socket::Unix(socket)
            }
            #[cfg(not(unix))]
            SyslogProtocol::Unix => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "unix syslog sockets are not available on this platform",
                ));
            }
        };

        Ok(SyslogWriter {
            socket: Arc::new(socket),
            facility: self.facility,
            tag: self.tag.clone(),
        })
    }
}

#[derive(Debug)]
enum Socket {
    Udp(UdpSocket),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixDatagram),
}

impl Socket {
    fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        match self {
            Self::Udp(socket) => socket.send(datagram),
            #[cfg(unix)]
            Self::Unix(socket) => socket.send(datagram),
        }
    }
}

/// `MakeWriter` sending one datagram per event.
#[derive(Debug, Clone)]
pub struct SyslogWriter {
    socket: Arc<Socket>,
    facility: u8,
    tag: String,
}

impl SyslogWriter {
    fn line(&self, severity: u8) -> SyslogLine<'_> {
        SyslogLine {
            writer: self,
            priority: u16::from(self.facility) * 8 + u16::from(severity),
            buf: Vec::with_capacity(256),
        }
    }
}

fn severity(level: ::tracing::Level) -> u8 {
    match level {
        ::tracing::Level::ERROR => 3,
        ::tracing::Level::WARN => 4,
        ::tracing::Level::INFO => 6,
        _ => 7,
    }
}

impl<'a> MakeWriter<'a> for SyslogWriter {
    type Writer = SyslogLine<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        self.line(severity(::tracing::Level::INFO))
    }

    fn make_writer_for(&'a self, meta: &::tracing::Metadata<'_>) -> Self::Writer {
        self.line(severity(*meta.level()))
    }
}

/// One buffered event, sent when dropped.
#[derive(Debug)]
pub struct SyslogLine<'a> {
    writer: &'a SyslogWriter,
    priority: u16,
    buf: Vec<u8>,
}

impl io::Write for SyslogLine<'_> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for SyslogLine<'_> {
    fn drop(&mut self) {
        let message = String::from_utf8_lossy(&self.buf);
        let message = message.trim_end();
        if message.is_empty() {
            return;
        }
        let datagram = format!("<{}>{}: {}", self.priority, self.writer.tag, message);
        // A sink cannot report its own failures.
        let _ = self.writer.socket.send(datagram.as_bytes());
    }
}
