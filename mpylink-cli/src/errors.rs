use std::io;

use miette::Diagnostic;
use mpylink::client::MpyError;
use mpylink::repl::ReplError;
use mpylink::transport::ConnectError;
use thiserror::Error;

/// Errors surfaced to the CLI's top level, layered on top of the core
/// crate's own diagnostics.
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// No serial port or TCP address was given, and autodetect found
    /// nothing usable.
    #[error("no backend selected")]
    #[diagnostic(code(mpylink_cli::no_backend), help("pass --serial <port> or --tcp <host[:port]>"))]
    NoBackendSelected,

    /// Autodetect found more than one candidate serial port.
    #[error("multiple serial ports look like MicroPython devices: {0:?}")]
    #[diagnostic(code(mpylink_cli::ambiguous_autodetect), help("pass --serial <port> to disambiguate"))]
    AmbiguousAutodetect(Vec<String>),

    /// Opening the transport failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Connect(#[from] ConnectError),

    /// The device protocol or facade raised an error.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Mpy(#[from] MpyError),

    /// The REPL engine raised an error directly (commands that bypass
    /// the facade, e.g. raw exec).
    #[error(transparent)]
    #[diagnostic(transparent)]
    Repl(#[from] ReplError),

    /// Reading the local input file or stdin failed.
    #[error("failed to read input")]
    #[diagnostic(code(mpylink_cli::input_read_failed))]
    InputReadFailed(#[source] io::Error),

    /// Writing the local output file or stdout failed.
    #[error("failed to write output")]
    #[diagnostic(code(mpylink_cli::output_write_failed))]
    OutputWriteFailed(#[source] io::Error),

    /// A hardware reset or bootloader reboot pulse failed, typically
    /// because the transport doesn't support it (e.g. TCP).
    #[error("device control operation failed")]
    #[diagnostic(code(mpylink_cli::device_control_failed))]
    DeviceControlFailed(#[source] io::Error),

    /// Serializing a value to JSON for `--json` output failed.
    #[error("failed to encode JSON output")]
    #[diagnostic(code(mpylink_cli::json_encode_failed))]
    JsonEncodeError(#[source] serde_json::Error),
}

/// Scans an error for an embedded device traceback and translates a
/// known `OSError: <code>` inside it to a human-readable message.
///
/// The core crate only recognizes these codes where they surface from
/// its own wire protocol (e.g. VFS operations); tracebacks from
/// arbitrary `exec`'d code reach the CLI as raw [`ReplError::Exec`]
/// text, so the translation happens here instead.
pub fn device_os_error_hint(err: &CliError) -> Option<String> {
    let stderr = match err {
        CliError::Repl(ReplError::Exec { stderr, .. }) => stderr,
        CliError::Mpy(MpyError::Repl(ReplError::Exec { stderr, .. })) => stderr,
        _ => return None,
    };
    mpylink::errno::friendly_error(stderr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec_error(stderr: &str) -> ReplError {
        ReplError::Exec {
            cmd: "open('/missing')".to_string(),
            stdout: Vec::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn translates_known_code_through_repl_variant() {
        let err = CliError::Repl(exec_error("Traceback...\nOSError: 2\n"));
        assert_eq!(
            device_os_error_hint(&err),
            Some("OSError: No such file or directory (errno 2)".to_string())
        );
    }

    #[test]
    fn translates_known_code_through_mpy_variant() {
        let err = CliError::Mpy(MpyError::Repl(exec_error("OSError: 13")));
        assert_eq!(
            device_os_error_hint(&err),
            Some("OSError: Permission denied (errno 13)".to_string())
        );
    }

    #[test]
    fn no_hint_for_unrelated_errors() {
        assert_eq!(device_os_error_hint(&CliError::NoBackendSelected), None);
    }

    #[test]
    fn no_hint_when_traceback_has_no_known_code() {
        let err = CliError::Repl(exec_error("Traceback...\nValueError: bad thing\n"));
        assert_eq!(device_os_error_hint(&err), None);
    }
}
