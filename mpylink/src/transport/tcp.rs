use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{ConnectError, Transport};

/// Default port used when a bare hostname is given, matching common
/// MicroPython telnet-over-WiFi REPL servers.
const DEFAULT_PORT: u16 = 23;
const READ_CHUNK: usize = 4096;

/// A TCP transport to a device exposing its REPL over a socket.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connects to `address`, which may be `host` or `host:port`.
    pub fn connect(address: &str, timeout: Duration) -> Result<Self, ConnectError> {
        let (host, port) = match address.split_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .map_err(|_| ConnectError::Io(io::Error::other("invalid port")))?,
            ),
            None => (address, DEFAULT_PORT),
        };

        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(Some(Duration::from_millis(10)))?;
                    return Ok(Self { stream });
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| io::Error::other("no addresses resolved"))
            .into())
    }
}

impl Transport for TcpTransport {
    fn has_data(&mut self, timeout: Duration) -> io::Result<bool> {
        let mut peek_buf = [0u8; 1];
        if timeout.is_zero() {
            self.stream.set_read_timeout(Some(Duration::from_millis(1)))?;
        } else {
            self.stream.set_read_timeout(Some(timeout))?;
        }
        match self.stream.peek(&mut peek_buf) {
            Ok(n) => Ok(n > 0),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        self.stream
            .set_read_timeout(Some(Duration::from_millis(1)))?;
        let mut buf = vec![0u8; READ_CHUNK];
        match self.stream.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn write_raw(&mut self, data: &[u8]) -> io::Result<usize> {
        self.stream.write(data)
    }

    fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown(std::net::Shutdown::Both)
    }
}
