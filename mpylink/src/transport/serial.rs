use std::io;
use std::thread::sleep;
use std::time::Duration;

use serialport::SerialPort;

use super::{ConnectError, Transport};

fn to_io_error(err: serialport::Error) -> io::Error {
    io::Error::other(err)
}

/// Chunk size for serial writes. Some USB/serial converters drop bytes
/// if written faster than this, so writes are paced rather than sent in
/// one burst.
const WRITE_CHUNK_SIZE: usize = 128;
const WRITE_CHUNK_DELAY: Duration = Duration::from_millis(10);

/// A serial port transport, with DTR/RTS-driven hardware reset.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Opens `path` at `baud_rate` with an 8N1 framing and no flow control.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, ConnectError> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(10))
            .open()?;
        Ok(Self { port })
    }

    /// Wraps an already-open port.
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Pulses DTR/RTS the way common MicroPython boards expect in order
    /// to force a hardware reset: DTR low asserts reset, RTS low holds
    /// the bootloader strap released.
    fn pulse_reset(&mut self, bootloader: bool) -> io::Result<()> {
        self.port
            .write_data_terminal_ready(false)
            .map_err(to_io_error)?;
        self.port
            .write_request_to_send(bootloader)
            .map_err(to_io_error)?;
        sleep(Duration::from_millis(100));
        self.port
            .write_data_terminal_ready(true)
            .map_err(to_io_error)?;
        self.port
            .write_request_to_send(false)
            .map_err(to_io_error)?;
        Ok(())
    }
}

impl Transport for SerialTransport {
    fn has_data(&mut self, timeout: Duration) -> io::Result<bool> {
        if timeout.is_zero() {
            return Ok(self.port.bytes_to_read().map_err(to_io_error)? > 0);
        }
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if self.port.bytes_to_read().map_err(to_io_error)? > 0 {
                return Ok(true);
            }
            if std::time::Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(Duration::from_millis(1));
        }
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let available = self.port.bytes_to_read().map_err(to_io_error)? as usize;
        if available == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; available];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn write_raw(&mut self, data: &[u8]) -> io::Result<usize> {
        let chunk_len = data.len().min(WRITE_CHUNK_SIZE);
        let n = self.port.write(&data[..chunk_len])?;
        sleep(WRITE_CHUNK_DELAY);
        Ok(n)
    }

    fn hard_reset(&mut self) -> io::Result<()> {
        self.pulse_reset(false)
    }

    fn reset_to_bootloader(&mut self) -> io::Result<()> {
        self.pulse_reset(true)
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_raw_chunks_to_the_configured_size() {
        assert_eq!(WRITE_CHUNK_SIZE, 128);
    }
}
