//! Known `OSError` codes the device's VFS layer and helper snippets can
//! raise, with human-readable messages.

use strum_macros::{Display, FromRepr};

/// A device `OSError` code, as carried over the wire as a negative
/// errno and embedded in exec tracebacks as `OSError: <code>`.
#[derive(FromRepr, Display, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(i32)]
#[allow(non_camel_case_types)]
pub enum OsError {
    /// No such file or directory.
    ENOENT = 2,
    /// Permission denied.
    EACCES = 13,
    /// File exists.
    EEXIST = 17,
    /// No such device.
    ENODEV = 19,
    /// Is a directory.
    EISDIR = 21,
    /// Invalid argument.
    EINVAL = 22,
    /// No space left on device.
    ENOSPC = 28,
    /// Read-only filesystem.
    EROFS = 30,
    /// Connection timed out.
    ETIMEDOUT = 110,
    /// No route to host.
    EHOSTUNREACH = 113,
}

impl OsError {
    /// A short human-readable description of this errno.
    pub fn message(self) -> &'static str {
        match self {
            OsError::ENOENT => "No such file or directory",
            OsError::EACCES => "Permission denied",
            OsError::EEXIST => "File exists",
            OsError::ENODEV => "No such device",
            OsError::EISDIR => "Is a directory",
            OsError::EINVAL => "Invalid argument",
            OsError::ENOSPC => "No space left on device",
            OsError::EROFS => "Read-only filesystem",
            OsError::ETIMEDOUT => "Connection timed out",
            OsError::EHOSTUNREACH => "No route to host",
        }
    }
}

/// Scans device traceback text for an `OSError: <code>` pattern and
/// translates it to a human-readable message, without pulling in a
/// regex engine for this narrow, fixed-shape scan.
pub fn friendly_error(traceback: &str) -> Option<String> {
    let idx = traceback.find("OSError: ")?;
    let rest = &traceback[idx + "OSError: ".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let code: i32 = digits.parse().ok()?;
    let known = OsError::from_repr(code)?;
    Some(format!("OSError: {} (errno {code})", known.message()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_known_codes() {
        assert_eq!(
            friendly_error("Traceback...\nOSError: 2\n"),
            Some("OSError: No such file or directory (errno 2)".to_string())
        );
    }

    #[test]
    fn leaves_unknown_codes_untranslated() {
        assert_eq!(friendly_error("OSError: 999"), None);
    }

    #[test]
    fn ignores_text_without_an_oserror() {
        assert_eq!(friendly_error("SyntaxError: invalid syntax"), None);
    }
}
