//! REPL / raw-REPL / raw-paste protocol engine.
//!
//! Drives a MicroPython-style interactive prompt: recovering to a known
//! state, entering and leaving raw mode, executing code, and uploading
//! larger bodies through the flow-controlled raw-paste mode.

use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::router::EscapeRouter;
use crate::transport::Transport;

const CTRL_A: u8 = 0x01;
const CTRL_B: u8 = 0x02;
const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;
const CTRL_E: u8 = 0x05;

const RAW_PASTE_ACK: u8 = 0x01;

const NORMAL_PROMPT: &[u8] = b"\r\n>>> ";
const RAW_PROMPT: &[u8] = b"\r\n>";
const SOFT_REBOOT: &[u8] = b"soft reboot";

const STOP_ATTEMPTS: usize = 15;
const STOP_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(200);
/// From this attempt onward, an extra stray escape byte is sent to
/// unblock a device-side VFS agent stuck waiting for a host ACK after a
/// dropped connection: it reads the byte as a malformed response,
/// raises, and falls back to the REPL.
const UNSTICK_VFS_FROM_ATTEMPT: usize = 4;

const RAW_PASTE_SCAN_MAX: usize = 50;

/// Known REPL mode, tracked so repeated calls can skip recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Unknown,
    Normal,
    Raw,
}

/// Errors from the protocol engine.
#[derive(Error, Debug, Diagnostic)]
pub enum ReplError {
    /// The link itself failed.
    #[error("transport error")]
    #[diagnostic(code(mpylink::repl::io))]
    Io(#[from] std::io::Error),
    /// The device did not respond the way the protocol expects.
    #[error("protocol error: {0}")]
    #[diagnostic(code(mpylink::repl::protocol))]
    Protocol(String),
    /// A blocking read exceeded its budget.
    #[error("timed out waiting for device response")]
    #[diagnostic(code(mpylink::repl::timeout))]
    Timeout,
    /// Executed code raised on the device.
    #[error("device raised an error executing:\n  {cmd}\nstderr:\n  {stderr}")]
    #[diagnostic(code(mpylink::repl::exec))]
    Exec {
        /// The code that was executed.
        cmd: String,
        /// Captured stdout up to the point of failure.
        stdout: Vec<u8>,
        /// The device's traceback text.
        stderr: String,
    },
}

impl From<ReplError> for std::io::Error {
    fn from(err: ReplError) -> Self {
        match err {
            ReplError::Io(e) => e,
            other => std::io::Error::other(other.to_string()),
        }
    }
}

fn classify_io_error(err: std::io::Error) -> ReplError {
    if err.kind() == std::io::ErrorKind::TimedOut {
        ReplError::Timeout
    } else {
        ReplError::Io(err)
    }
}

/// Drives the REPL state machine over an [`EscapeRouter`].
pub struct ReplEngine<T> {
    router: EscapeRouter<T>,
    mode: Mode,
    raw_paste_supported: Option<bool>,
}

impl<T: Transport> ReplEngine<T> {
    /// Wraps a router, with REPL mode unknown.
    pub fn new(router: EscapeRouter<T>) -> Self {
        Self {
            router,
            mode: Mode::Unknown,
            raw_paste_supported: None,
        }
    }

    /// Mutable access to the underlying router, e.g. to register VFS
    /// handlers.
    pub fn router_mut(&mut self) -> &mut EscapeRouter<T> {
        &mut self.router
    }

    /// True if the device announced a VFS remount is due; caller should
    /// re-run its mount installation and clear this by calling
    /// [`ReplEngine::take_remount_event`].
    pub fn take_remount_event(&mut self) -> bool {
        self.router.take_remount_event()
    }

    /// Clears cached REPL state after an external reset (e.g. a
    /// hardware reset pulse).
    pub fn reset_state(&mut self) {
        self.mode = Mode::Unknown;
        self.raw_paste_supported = None;
    }

    /// Recovers to a known REPL state by interleaving Ctrl-C/Ctrl-B
    /// attempts, tolerating devices that reset on port open.
    pub fn stop_current_operation(&mut self) -> Result<(), ReplError> {
        if self.mode != Mode::Unknown {
            return Ok(());
        }
        log::info!("stop current operation");
        self.router.flush();

        for attempt in 0..STOP_ATTEMPTS {
            let ctrl = if attempt % 3 == 2 { CTRL_B } else { CTRL_C };
            let _ = self.router.write(&[ctrl]);
            if attempt >= UNSTICK_VFS_FROM_ATTEMPT {
                let _ = self.router.write(&[crate::router::ESCAPE]);
            }
            if self
                .router
                .read_until(NORMAL_PROMPT, STOP_ATTEMPT_TIMEOUT)
                .is_ok()
            {
                self.mode = Mode::Normal;
                return Ok(());
            }
        }

        log::warn!("could not establish REPL state after {STOP_ATTEMPTS} attempts");
        Err(ReplError::Protocol(
            "could not recover a known REPL state".into(),
        ))
    }

    /// Enters raw-REPL mode, recovering first if needed.
    pub fn enter_raw_repl(&mut self) -> Result<(), ReplError> {
        if self.mode == Mode::Raw {
            return Ok(());
        }
        self.stop_current_operation()?;
        log::info!("enter raw repl");
        self.router.write(&[CTRL_A]).map_err(|_| {
            ReplError::Protocol("write refused: connection busy".into())
        })?;
        self.router
            .read_until(RAW_PROMPT, Duration::from_secs(2))
            .map_err(classify_io_error)?;
        self.mode = Mode::Raw;
        Ok(())
    }

    /// Exits raw-REPL mode back to the normal prompt.
    pub fn exit_raw_repl(&mut self) -> Result<(), ReplError> {
        if self.mode != Mode::Raw {
            return Ok(());
        }
        log::info!("exit raw repl");
        self.router
            .write(&[CTRL_B])
            .map_err(|_| ReplError::Protocol("write refused: connection busy".into()))?;
        self.router
            .read_until(NORMAL_PROMPT, Duration::from_secs(2))
            .map_err(classify_io_error)?;
        self.mode = Mode::Normal;
        Ok(())
    }

    /// Soft-resets from normal-prompt, invalidating helper/raw-paste
    /// state.
    pub fn soft_reset(&mut self) -> Result<(), ReplError> {
        self.stop_current_operation()?;
        self.exit_raw_repl()?;
        log::info!("soft reset");
        self.router
            .write(&[CTRL_D])
            .map_err(|_| ReplError::Protocol("write refused: connection busy".into()))?;
        self.router
            .read_until(SOFT_REBOOT, Duration::from_secs(1))
            .map_err(classify_io_error)?;
        self.reset_state();
        Ok(())
    }

    /// Soft-resets from raw-prompt, re-entering raw-prompt afterward
    /// instead of paying the round trip back through the normal prompt.
    pub fn soft_reset_raw(&mut self) -> Result<(), ReplError> {
        self.enter_raw_repl()?;
        log::info!("soft reset (raw)");
        self.router
            .write(&[CTRL_D])
            .map_err(|_| ReplError::Protocol("write refused: connection busy".into()))?;
        self.router
            .read_until(SOFT_REBOOT, Duration::from_secs(1))
            .map_err(classify_io_error)?;
        self.router
            .read_until(b">", Duration::from_secs(1))
            .map_err(classify_io_error)?;
        self.mode = Mode::Raw;
        self.raw_paste_supported = None;
        Ok(())
    }

    /// Executes `code` in raw mode and returns its stdout.
    ///
    /// `timeout == Duration::ZERO` submits the code without waiting for
    /// a result (fire-and-forget); the REPL mode becomes unknown so the
    /// next call performs recovery.
    pub fn exec(&mut self, code: &str, timeout: Duration) -> Result<Vec<u8>, ReplError> {
        let send_timeout = if timeout.is_zero() {
            Duration::from_secs(5)
        } else {
            timeout
        };
        self.enter_raw_repl()?;
        log::debug!("cmd: {code}");
        self.router
            .write(code.as_bytes())
            .map_err(|_| ReplError::Protocol("write refused: connection busy".into()))?;
        self.router
            .write(&[CTRL_D])
            .map_err(|_| ReplError::Protocol("write refused: connection busy".into()))?;
        self.router
            .read_until(b"OK", send_timeout)
            .map_err(classify_io_error)?;

        if timeout.is_zero() {
            self.mode = Mode::Unknown;
            return Ok(Vec::new());
        }

        self.read_execution_result(code, timeout)
    }

    fn read_execution_result(
        &mut self,
        code: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, ReplError> {
        let result = self
            .router
            .read_until(&[CTRL_D], timeout)
            .map_err(classify_io_error)?;
        if !result.is_empty() {
            log::debug!("res: {:?}", String::from_utf8_lossy(&result));
        }
        let mut delim = vec![CTRL_D];
        delim.push(b'>');
        let err = self.router.read_until(&delim, timeout).map_err(classify_io_error)?;
        if !err.is_empty() {
            return Err(ReplError::Exec {
                cmd: code.to_string(),
                stdout: result,
                stderr: String::from_utf8_lossy(&err).into_owned(),
            });
        }
        Ok(result)
    }

    /// Executes `print(expr)` and returns the raw stdout for the caller
    /// to parse via [`crate::value`].
    pub fn exec_eval(&mut self, expr: &str, timeout: Duration) -> Result<Vec<u8>, ReplError> {
        self.exec(&format!("print({expr})"), timeout)
    }

    /// Enters raw-paste mode and uploads `code` with device-driven flow
    /// control. Falls back is the caller's responsibility via
    /// [`ReplEngine::try_raw_paste`].
    pub fn exec_raw_paste(&mut self, code: &[u8], timeout: Duration) -> Result<Vec<u8>, ReplError> {
        let send_timeout = if timeout.is_zero() {
            Duration::from_secs(5)
        } else {
            timeout
        };
        self.enter_raw_repl()?;
        log::debug!("cmd (raw-paste, {} bytes)", code.len());

        self.router
            .write(&[CTRL_E, b'A', CTRL_A])
            .map_err(|_| ReplError::Protocol("write refused: connection busy".into()))?;

        let header = self
            .router
            .read_exact_bytes(2, send_timeout)
            .map_err(classify_io_error)?;
        let status = if header[0] == b'R' {
            header[1]
        } else {
            self.scan_for_raw_paste_header(header, send_timeout)?
        };

        if status == 0 {
            self.raw_paste_supported = Some(false);
            return Err(ReplError::Protocol("raw-paste not supported by device".into()));
        }
        if status != 1 {
            return Err(ReplError::Protocol(format!(
                "unexpected raw-paste status: {status}"
            )));
        }
        self.raw_paste_supported = Some(true);

        let window_bytes = self
            .router
            .read_exact_bytes(2, send_timeout)
            .map_err(classify_io_error)?;
        let window_size = u16::from_le_bytes([window_bytes[0], window_bytes[1]]) as usize;
        log::debug!("raw-paste window size: {window_size}");

        self.send_with_flow_control(code, window_size, send_timeout)?;
        self.wait_for_paste_complete(send_timeout)?;

        if timeout.is_zero() {
            self.mode = Mode::Unknown;
            return Ok(Vec::new());
        }

        self.read_execution_result(&String::from_utf8_lossy(code), timeout)
    }

    fn scan_for_raw_paste_header(
        &mut self,
        first_two: Vec<u8>,
        timeout: Duration,
    ) -> Result<u8, ReplError> {
        log::warn!("raw-paste header mismatch (got {:?}) - scanning", first_two[0]);
        let mut scanned = first_two;
        while scanned.len() < RAW_PASTE_SCAN_MAX {
            for pattern in [[b'R', 1u8], [b'R', 0u8]] {
                if let Some(pos) = scanned
                    .windows(2)
                    .position(|w| w[0] == pattern[0] && w[1] == pattern[1])
                {
                    log::info!("found raw-paste header at offset {pos}");
                    return Ok(scanned[pos + 1]);
                }
            }
            match self.router.read_exact_bytes(1, Duration::from_millis(200)) {
                Ok(byte) => scanned.extend(byte),
                Err(_) => break,
            }
        }
        Err(ReplError::Protocol(format!(
            "raw-paste header not found in {} bytes",
            scanned.len()
        )))
    }

    fn send_with_flow_control(
        &mut self,
        data: &[u8],
        window_size: usize,
        timeout: Duration,
    ) -> Result<(), ReplError> {
        let mut remaining_window = window_size;
        let mut offset = 0;

        while offset < data.len() {
            if remaining_window == 0 {
                let flow_byte = self
                    .router
                    .read_exact_bytes(1, timeout)
                    .map_err(classify_io_error)?[0];
                if flow_byte == RAW_PASTE_ACK {
                    remaining_window += window_size;
                } else if flow_byte == CTRL_D {
                    let _ = self.router.write(&[CTRL_D]);
                    return Ok(());
                }
            }

            if remaining_window > 0 {
                let chunk_size = remaining_window.min(data.len() - offset);
                self.router
                    .write(&data[offset..offset + chunk_size])
                    .map_err(|_| ReplError::Protocol("write refused: connection busy".into()))?;
                offset += chunk_size;
                remaining_window -= chunk_size;
            }
        }

        self.router
            .write(&[CTRL_D])
            .map_err(|_| ReplError::Protocol("write refused: connection busy".into()))
    }

    fn wait_for_paste_complete(&mut self, timeout: Duration) -> Result<(), ReplError> {
        loop {
            let byte = self
                .router
                .read_exact_bytes(1, timeout)
                .map_err(classify_io_error)?;
            if byte[0] == CTRL_D {
                return Ok(());
            }
        }
    }

    /// Attempts raw-paste, transparently falling back to regular `exec`
    /// for this and all subsequent calls once the device signals it
    /// doesn't support raw-paste.
    pub fn try_raw_paste(&mut self, code: &str, timeout: Duration) -> Result<Vec<u8>, ReplError> {
        if self.raw_paste_supported == Some(false) {
            return self.exec(code, timeout);
        }
        match self.exec_raw_paste(code.as_bytes(), timeout) {
            Ok(result) => Ok(result),
            Err(ReplError::Protocol(msg)) if msg.contains("not supported") => {
                log::info!("raw-paste not supported, falling back to regular exec");
                self.exec(code, timeout)
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::EscapeRouter;
    use std::collections::VecDeque;
    use std::io;

    struct ScriptedTransport {
        inbound: VecDeque<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Transport for ScriptedTransport {
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

    #[test]
    fn stop_current_operation_fails_after_fifteen_silent_attempts() {
        let transport = ScriptedTransport {
            inbound: VecDeque::new(),
            written: Vec::new(),
        };
        let router = EscapeRouter::new(transport);
        let mut repl = ReplEngine::new(router);

        let result = repl.stop_current_operation();
        assert!(result.is_err());

        let written = &repl.router_mut().transport_mut().written;
        let mut expected = Vec::new();
        for attempt in 0..STOP_ATTEMPTS {
            expected.push(if attempt % 3 == 2 { CTRL_B } else { CTRL_C });
            if attempt >= UNSTICK_VFS_FROM_ATTEMPT {
                expected.push(crate::router::ESCAPE);
            }
        }
        assert_eq!(*written, expected);
    }
}
