//! Escape-byte router: multiplexes the REPL byte stream with an in-band
//! binary VFS channel the device drives via a dedicated escape byte.

use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use crate::transport::Transport;

/// Escape byte (CAN / Ctrl-X) that prefixes a VFS request frame:
/// `ESCAPE CMD MID`.
pub const ESCAPE: u8 = 0x18;

const SOFT_REBOOT_MARKER: &[u8] = b"soft reboot";
const NORMAL_PROMPT: &[u8] = b">>> ";
/// Rolling window bound for soft-reboot marker detection; kept to the
/// last `SOFT_REBOOT_TAIL` bytes once it grows past this so a marker
/// split across many small reads is never lost, at the cost of a window
/// that can in theory still miss a marker split across an interleave
/// longer than this bound (see design notes on a streaming matcher).
const SOFT_REBOOT_WINDOW: usize = 256;
const SOFT_REBOOT_TAIL: usize = 64;

/// I/O surface a [`EscapeHandler`] uses to read its request body and
/// write its response, once the router has committed to a dispatch.
pub trait HandlerIo {
    /// Reads exactly `count` raw bytes, blocking up to `timeout`.
    fn read_bytes(&mut self, count: usize, timeout: Duration) -> io::Result<Vec<u8>>;
    /// Writes raw bytes directly to the transport.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;
}

/// Handles one registered escape command range for a single mount id.
pub trait EscapeHandler {
    /// Services a single VFS command, reading its body and writing its
    /// response through `io`. Must never block forever: `io` enforces a
    /// timeout on every read.
    fn dispatch(&mut self, cmd: u8, io: &mut dyn HandlerIo);

    /// Downcast hook so a caller holding a type-erased handler can still
    /// reach its concrete type, e.g. to reconfigure a mounted handler.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Error raised by [`EscapeRouter::write`] when a VFS transaction is
/// mid-flight and host writes must be rejected to avoid interleaving
/// with it.
#[derive(Debug, thiserror::Error)]
#[error("connection busy: a VFS request is in progress")]
pub struct Busy;

/// Wraps a [`Transport`], intercepting escape frames and routing them to
/// registered per-mount handlers while passing everything else through.
pub struct EscapeRouter<T> {
    transport: T,
    buffer: Vec<u8>,
    pending: Vec<u8>,
    handlers: HashMap<u8, Box<dyn EscapeHandler>>,
    busy: bool,
    reboot_buf: Vec<u8>,
    needs_remount: bool,
    /// REPL-visible bytes already pulled out of the transport but not
    /// yet consumed by [`EscapeRouter::read_until`]/[`EscapeRouter::read_bytes`].
    repl_buffer: Vec<u8>,
    /// Set once when a soft reboot's subsequent prompt is observed;
    /// consumed by [`EscapeRouter::take_remount_event`].
    remount_fired: bool,
}

impl<T: Transport> EscapeRouter<T> {
    /// Wraps `transport`, starting with no registered handlers.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buffer: Vec::new(),
            pending: Vec::new(),
            handlers: HashMap::new(),
            busy: false,
            reboot_buf: Vec::new(),
            needs_remount: false,
            repl_buffer: Vec::new(),
            remount_fired: false,
        }
    }

    /// Consumes and clears the pending remount notification.
    pub fn take_remount_event(&mut self) -> bool {
        std::mem::take(&mut self.remount_fired)
    }

    /// Registers a handler for mount id `mid`.
    pub fn register_handler(&mut self, mid: u8, handler: Box<dyn EscapeHandler>) {
        self.handlers.insert(mid, handler);
    }

    /// Removes the handler for mount id `mid`.
    pub fn unregister_handler(&mut self, mid: u8) {
        self.handlers.remove(&mid);
    }

    /// Returns the registered handler for `mid`, for reconfiguration via
    /// [`EscapeHandler::as_any_mut`].
    pub fn handler_mut(&mut self, mid: u8) -> Option<&mut Box<dyn EscapeHandler>> {
        self.handlers.get_mut(&mid)
    }

    /// True while a VFS transaction is being serviced.
    pub fn busy(&self) -> bool {
        self.busy
    }

    /// True once a soft reboot marker was seen and a subsequent normal
    /// prompt is still pending; callers should remount on the next
    /// [`EscapeRouter::pump`] that clears it.
    pub fn remount_pending(&self) -> bool {
        self.needs_remount
    }

    fn check_reboot(&mut self, data: &[u8]) -> bool {
        self.reboot_buf.extend_from_slice(data);
        if self.needs_remount {
            if contains(&self.reboot_buf, NORMAL_PROMPT) {
                self.needs_remount = false;
                self.reboot_buf.clear();
                return true;
            }
            return false;
        }
        if self.reboot_buf.len() > SOFT_REBOOT_WINDOW {
            let tail_start = self.reboot_buf.len() - SOFT_REBOOT_TAIL;
            self.reboot_buf.drain(..tail_start);
        }
        if contains(&self.reboot_buf, SOFT_REBOOT_MARKER) {
            self.needs_remount = true;
            self.reboot_buf.clear();
        }
        false
    }

    /// Pulls and routes one batch of available bytes, returning the
    /// REPL-visible output (VFS frames stripped out). Returns `Ok(None)`
    /// if no data is currently available.
    ///
    /// Returns `Ok(Some((output, remount)))` where `remount` is true
    /// exactly once, the instant a soft reboot's subsequent prompt is
    /// observed.
    pub fn pump(&mut self, wait: Duration) -> io::Result<Option<(Vec<u8>, bool)>> {
        if self.pending.is_empty() && !self.transport.has_data(wait)? {
            return Ok(None);
        }
        let mut data = std::mem::take(&mut self.pending);
        data.extend(self.transport.read_available()?);
        if data.is_empty() {
            return Ok(None);
        }

        if !data.contains(&ESCAPE) {
            let remount = self.check_reboot(&data);
            return Ok(Some((data, remount)));
        }

        let mut out = Vec::with_capacity(data.len());
        let mut i = 0;
        while i < data.len() {
            if data[i] == ESCAPE {
                if i + 2 >= data.len() {
                    self.pending = data[i..].to_vec();
                    break;
                }
                let cmd = data[i + 1];
                let mid = data[i + 2];
                if self.handlers.contains_key(&mid) {
                    self.busy = true;
                    self.transport.write(&[ESCAPE])?;
                    let mut handler = self.handlers.remove(&mid).expect("checked above");
                    {
                        let mut io_adapter = RouterIo { router: self };
                        handler.dispatch(cmd, &mut io_adapter);
                    }
                    self.handlers.insert(mid, handler);
                    self.busy = false;
                    i += 3;
                } else {
                    out.push(data[i]);
                    i += 1;
                }
            } else {
                out.push(data[i]);
                i += 1;
            }
        }

        let remount = if !out.is_empty() {
            self.check_reboot(&out)
        } else {
            false
        };
        Ok(Some((out, remount)))
    }

    /// Writes bytes to the device, refusing while a VFS transaction is
    /// in flight.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Busy> {
        if self.busy {
            return Err(Busy);
        }
        self.transport.write(data).map_err(|_| Busy)
    }

    /// Access to the underlying transport for operations the router
    /// doesn't mediate (hard reset, close).
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Flushes and returns any REPL-visible bytes accumulated so far
    /// without waiting for more.
    pub fn flush(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.repl_buffer)
    }

    /// Reads REPL-visible bytes until `delim` is found, consuming it.
    /// The timeout resets every time new bytes arrive, not on total
    /// elapsed wait, so a slow but live device never spuriously times
    /// out.
    pub fn read_until(&mut self, delim: &[u8], timeout: Duration) -> io::Result<Vec<u8>> {
        let mut deadline = Instant::now() + timeout;
        loop {
            if let Some(pos) = find(&self.repl_buffer, delim) {
                let rest = self.repl_buffer.split_off(pos + delim.len());
                let mut data = std::mem::replace(&mut self.repl_buffer, rest);
                data.truncate(pos);
                return Ok(data);
            }
            match self.pump(Duration::from_millis(5))? {
                Some((out, remount)) if !out.is_empty() => {
                    self.repl_buffer.extend(out);
                    self.remount_fired |= remount;
                    deadline = Instant::now() + timeout;
                }
                _ => {
                    if Instant::now() >= deadline {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!(
                                "timed out waiting for {:?}, received: {:?}",
                                String::from_utf8_lossy(delim),
                                String::from_utf8_lossy(&self.repl_buffer)
                            ),
                        ));
                    }
                }
            }
        }
    }

    /// Reads exactly `count` REPL-visible bytes.
    pub fn read_exact_bytes(&mut self, count: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        let mut deadline = Instant::now() + timeout;
        loop {
            if self.repl_buffer.len() >= count {
                let rest = self.repl_buffer.split_off(count);
                return Ok(std::mem::replace(&mut self.repl_buffer, rest));
            }
            match self.pump(Duration::from_millis(5))? {
                Some((out, remount)) if !out.is_empty() => {
                    self.repl_buffer.extend(out);
                    self.remount_fired |= remount;
                    deadline = Instant::now() + timeout;
                }
                _ => {
                    if Instant::now() >= deadline {
                        return Err(io::Error::new(io::ErrorKind::TimedOut, "no data received"));
                    }
                }
            }
        }
    }

    fn read_raw_bytes(&mut self, count: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        while self.buffer.len() < count {
            if !self.pending.is_empty() {
                let pending = std::mem::take(&mut self.pending);
                self.buffer.extend(pending);
                continue;
            }
            if self.transport.has_data(Duration::from_millis(5))? {
                let chunk = self.transport.read_available()?;
                self.buffer.extend(chunk);
                continue;
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "timed out reading VFS request body",
                ));
            }
        }
        let rest = self.buffer.split_off(count);
        let data = std::mem::replace(&mut self.buffer, rest);
        Ok(data)
    }
}

/// Adapts an [`EscapeRouter`] borrow to [`HandlerIo`] for the duration
/// of a single dispatch.
struct RouterIo<'a, T: Transport> {
    router: &'a mut EscapeRouter<T>,
}

impl<T: Transport> HandlerIo for RouterIo<'_, T> {
    fn read_bytes(&mut self, count: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        self.router.read_raw_bytes(count, timeout)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.router.transport.write(data)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct MockTransport {
        inbound: VecDeque<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Transport for MockTransport {
        fn has_data(&mut self, _timeout: Duration) -> io::Result<bool> {
            Ok(!self.inbound.is_empty())
        }

        fn read_available(&mut self) -> io::Result<Vec<u8>> {
            Ok(self.inbound.pop_front().unwrap_or_default())
        }

        fn write_raw(&mut self, data: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(data);
            Ok(data.len())
        }
    }

    struct EchoHandler;
    impl EscapeHandler for EchoHandler {
        fn dispatch(&mut self, cmd: u8, io: &mut dyn HandlerIo) {
            io.write(&[cmd]).unwrap();
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    #[test]
    fn passes_through_data_without_escape_bytes() {
        let transport = MockTransport {
            inbound: VecDeque::from([b"hello world".to_vec()]),
            written: Vec::new(),
        };
        let mut router = EscapeRouter::new(transport);
        let (out, remount) = router.pump(Duration::ZERO).unwrap().unwrap();
        assert_eq!(out, b"hello world");
        assert!(!remount);
    }

    #[test]
    fn strips_a_single_escape_frame_and_dispatches_it() {
        let mut data = b"before".to_vec();
        data.extend([ESCAPE, 7, 0]);
        data.extend(b"after");
        let transport = MockTransport {
            inbound: VecDeque::from([data]),
            written: Vec::new(),
        };
        let mut router = EscapeRouter::new(transport);
        router.register_handler(0, Box::new(EchoHandler));
        let (out, _) = router.pump(Duration::ZERO).unwrap().unwrap();
        assert_eq!(out, b"beforeafter");
    }

    #[test]
    fn detects_soft_reboot_split_across_reads() {
        let transport = MockTransport {
            inbound: VecDeque::from([b"soft reb".to_vec(), b"oot\r\n>>> ".to_vec()]),
            written: Vec::new(),
        };
        let mut router = EscapeRouter::new(transport);
        let (_, first_remount) = router.pump(Duration::ZERO).unwrap().unwrap();
        assert!(!first_remount);
        assert!(router.remount_pending());
        let (_, second_remount) = router.pump(Duration::ZERO).unwrap().unwrap();
        assert!(second_remount);
        assert!(!router.remount_pending());
    }
}
