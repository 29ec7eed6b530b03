use std::io;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

mod serial;
mod tcp;
pub use serial::SerialTransport;
pub use tcp::TcpTransport;

/// Errors that can happen while opening a transport.
#[derive(Error, Debug, Diagnostic)]
pub enum ConnectError {
    /// The underlying OS call to open the link failed.
    #[error("failed to open transport")]
    #[diagnostic(code(mpylink::transport::connect::io))]
    Io(#[from] io::Error),
    /// The serial port could not be opened.
    #[error("failed to open serial port")]
    #[diagnostic(code(mpylink::transport::connect::serial))]
    Serial(#[from] serialport::Error),
}

/// A byte-oriented, ordered, full-duplex link to a device.
///
/// Implementations never interpret byte content; they only move bytes
/// and expose readiness so a caller can poll without blocking forever.
pub trait Transport {
    /// Waits up to `timeout` for at least one readable byte. A zero
    /// timeout performs a non-blocking poll.
    fn has_data(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Returns all bytes currently available without blocking past
    /// whatever the OS already buffered.
    fn read_available(&mut self) -> io::Result<Vec<u8>>;

    /// Writes as much of `data` as the OS accepts in one call, returning
    /// the number of bytes actually written.
    fn write_raw(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Writes all of `data`, looping over [`Transport::write_raw`].
    fn write(&mut self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            let n = self.write_raw(data)?;
            data = &data[n..];
        }
        Ok(())
    }

    /// Performs a hardware reset, if the transport supports one.
    fn hard_reset(&mut self) -> io::Result<()> {
        Err(io::Error::other("hard reset not supported on this transport"))
    }

    /// Resets into the bootloader, if the transport supports it.
    fn reset_to_bootloader(&mut self) -> io::Result<()> {
        Err(io::Error::other(
            "bootloader reset not supported on this transport",
        ))
    }

    /// Closes the link.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for Box<dyn Transport> {
    fn has_data(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).has_data(timeout)
    }
    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_available()
    }
    fn write_raw(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write_raw(data)
    }
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }
    fn hard_reset(&mut self) -> io::Result<()> {
        (**self).hard_reset()
    }
    fn reset_to_bootloader(&mut self) -> io::Result<()> {
        (**self).reset_to_bootloader()
    }
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Same forwarding impl for a `Send` trait object, needed wherever a
/// `Mpy` has to cross a thread boundary (e.g. the Python bindings, whose
/// `pyclass` fields must be `Send`).
impl Transport for Box<dyn Transport + Send> {
    fn has_data(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).has_data(timeout)
    }
    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_available()
    }
    fn write_raw(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write_raw(data)
    }
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data)
    }
    fn hard_reset(&mut self) -> io::Result<()> {
        (**self).hard_reset()
    }
    fn reset_to_bootloader(&mut self) -> io::Result<()> {
        (**self).reset_to_bootloader()
    }
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}
