//! File-transfer pipeline: moves bytes between host and device through
//! the REPL's `exec`/`exec_eval` channel (as opposed to the VFS wire
//! protocol in [`crate::vfs`], which serves the device's `os` module
//! directly). Chooses an on-the-wire encoding per chunk, skips
//! transfers whose content already matches via a SHA-256 fingerprint,
//! and sizes chunks from the device's own free-memory report.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

use crate::helpers;
use crate::repl::{ReplEngine, ReplError};
use crate::transport::Transport;
use crate::value::Value;

const DEFAULT_CHUNK: usize = 1024;
const EXEC_TIMEOUT: Duration = Duration::from_secs(10);

/// On-the-wire representation chosen for a chunk, cheapest-safe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Plain Python bytes literal (`b'...'`), as the device's REPL
    /// parser produces it. Cheapest for mostly-printable data, worst
    /// case roughly 4x inflation per byte.
    Raw,
    /// Base64 text, decoded on-device via `ubinascii.a2b_base64`.
    /// Predictable ~33% inflation regardless of content.
    Base64,
    /// Deflate-compressed, then base64-encoded; decoded on-device via
    /// the `deflate` module. Best for compressible payloads, requires
    /// the device to support it.
    DeflateBase64,
}

/// Device capabilities and tuning discovered once per connection and
/// reused across transfers.
#[derive(Debug, Clone)]
pub struct TransferProfile {
    /// Largest chunk size the device's free memory can absorb.
    pub chunk_size: usize,
    /// Whether the device can decode deflate streams.
    pub deflate_supported: bool,
}

impl Default for TransferProfile {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK,
            deflate_supported: false,
        }
    }
}

impl TransferProfile {
    /// Probes the device for its usable chunk size and deflate
    /// support, installing the small helper snippets this needs first.
    pub fn probe<T: Transport>(repl: &mut ReplEngine<T>) -> Result<Self, ReplError> {
        repl.exec(helpers::CHUNK_PROBE, EXEC_TIMEOUT)?;
        repl.exec(helpers::DEFLATE_PROBE, EXEC_TIMEOUT)?;
        let chunk_stdout = repl.exec_eval("_mpylink_chunk_probe()", EXEC_TIMEOUT)?;
        let chunk_size = Value::parse(&String::from_utf8_lossy(&chunk_stdout))
            .ok()
            .and_then(|v| v.as_int())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_CHUNK);
        let deflate_stdout = repl.exec_eval("_mpylink_deflate_probe()", EXEC_TIMEOUT)?;
        let deflate_supported = String::from_utf8_lossy(&deflate_stdout).trim() == "True";
        Ok(Self {
            chunk_size,
            deflate_supported,
        })
    }

    /// Picks the cheapest encoding for a chunk of `data`, given what
    /// the device can decode.
    pub fn choose_encoding(&self, data: &[u8]) -> Encoding {
        if self.deflate_supported && data.len() >= 64 && compressible(data) {
            Encoding::DeflateBase64
        } else if printable_ratio(data) > 0.9 {
            Encoding::Raw
        } else {
            Encoding::Base64
        }
    }
}

fn printable_ratio(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 1.0;
    }
    let printable = data.iter().filter(|b| (0x20..0x7f).contains(b)).count();
    printable as f64 / data.len() as f64
}

fn compressible(data: &[u8]) -> bool {
    use std::collections::HashSet;
    let sample: HashSet<&u8> = data.iter().take(256).collect();
    sample.len() < data.len().min(256) * 3 / 4
}

/// SHA-256 hex digest of `data`, matching the device's `uhashlib.sha256`
/// output format so the two can be compared directly.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Returns the device's reported SHA-256 of `path`, or `None` if the
/// path is missing or the device couldn't hash it.
pub fn device_hash<T: Transport>(
    repl: &mut ReplEngine<T>,
    path: &str,
) -> Result<Option<String>, ReplError> {
    repl.exec(helpers::HASHFILE, EXEC_TIMEOUT)?;
    let out = repl.exec_eval(&format!("_mpylink_hashfile({})", py_str_literal(path)), EXEC_TIMEOUT)?;
    let text = String::from_utf8_lossy(&out);
    match Value::parse(&text) {
        Ok(Value::Str(hash)) => Ok(Some(hash)),
        _ => Ok(None),
    }
}

/// Writes `data` to `path` on the device, skipping the transfer
/// entirely if the device already holds identical content (matched by
/// size and SHA-256 fingerprint).
pub fn put<T: Transport>(
    repl: &mut ReplEngine<T>,
    path: &str,
    data: &[u8],
    profile: &TransferProfile,
    mut progress: Option<&mut dyn FnMut(u64, u64)>,
) -> Result<bool, ReplError> {
    if let Some(existing) = device_hash(repl, path)? {
        if existing == sha256_hex(data) {
            return Ok(false);
        }
    }
    repl.exec(&format!("f = open({}, 'wb')", py_str_literal(path)), EXEC_TIMEOUT)?;
    let total = data.len() as u64;
    let mut sent = 0u64;
    for chunk in data.chunks(profile.chunk_size.max(1)) {
        write_chunk(repl, chunk, profile.choose_encoding(chunk))?;
        sent += chunk.len() as u64;
        if let Some(cb) = progress.as_mut() {
            cb(sent, total);
        }
    }
    repl.exec("f.close()", EXEC_TIMEOUT)?;
    Ok(true)
}

/// Reads the full contents of `path` from the device. `total_hint`, if
/// known (e.g. from a prior [`crate::client::Mpy::stat`] call), is
/// passed through to `progress` as the denominator.
pub fn get<T: Transport>(
    repl: &mut ReplEngine<T>,
    path: &str,
    profile: &TransferProfile,
    total_hint: u64,
    mut progress: Option<&mut dyn FnMut(u64, u64)>,
) -> Result<Vec<u8>, ReplError> {
    repl.exec(&format!("f = open({}, 'rb')", py_str_literal(path)), EXEC_TIMEOUT)?;
    let mut data = Vec::new();
    loop {
        let expr = format!(
            "__import__('ubinascii').b2a_base64(f.read({})).strip()",
            profile.chunk_size
        );
        let out = repl.exec_eval(&expr, EXEC_TIMEOUT)?;
        let text = String::from_utf8_lossy(&out);
        let chunk = match Value::parse(&text) {
            Ok(value) => value.into_bytes().unwrap_or_default(),
            Err(_) => break,
        };
        if chunk.is_empty() {
            break;
        }
        let decoded = BASE64
            .decode(&chunk)
            .map_err(|e| ReplError::Protocol(format!("invalid base64 chunk from device: {e}")))?;
        data.extend(decoded);
        if let Some(cb) = progress.as_mut() {
            cb(data.len() as u64, total_hint);
        }
    }
    repl.exec("f.close()", EXEC_TIMEOUT)?;
    Ok(data)
}

fn write_chunk<T: Transport>(
    repl: &mut ReplEngine<T>,
    chunk: &[u8],
    encoding: Encoding,
) -> Result<(), ReplError> {
    let code = match encoding {
        Encoding::Raw => format!("f.write({})", bytes_literal(chunk)),
        Encoding::Base64 => format!(
            "f.write(__import__('ubinascii').a2b_base64('{}'))",
            BASE64.encode(chunk)
        ),
        Encoding::DeflateBase64 => {
            let compressed = deflate_raw(chunk);
            format!(
                "f.write(__import__('deflate').DeflateIO(__import__('io').BytesIO(__import__('ubinascii').a2b_base64('{}')), 0).read())",
                BASE64.encode(compressed)
            )
        }
    };
    repl.exec(&code, EXEC_TIMEOUT)?;
    Ok(())
}

fn deflate_raw(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use std::io::Write;
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("writing to an in-memory encoder cannot fail");
    encoder.finish().expect("finishing an in-memory encoder cannot fail")
}

fn bytes_literal(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() + 4);
    out.push_str("b'");
    for &b in data {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push('\'');
    out
}

pub(crate) fn py_str_literal(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_matches_known_digest() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }

    #[test]
    fn bytes_literal_escapes_non_printable_bytes() {
        assert_eq!(bytes_literal(b"a\x00b"), "b'a\\x00b'");
    }

    #[test]
    fn chooses_raw_for_mostly_printable_text() {
        let profile = TransferProfile {
            chunk_size: 1024,
            deflate_supported: true,
        };
        assert_eq!(profile.choose_encoding(b"hello world"), Encoding::Raw);
    }

    #[test]
    fn chooses_deflate_for_repetitive_binary_when_supported() {
        let profile = TransferProfile {
            chunk_size: 1024,
            deflate_supported: true,
        };
        let data = vec![0u8; 512];
        assert_eq!(profile.choose_encoding(&data), Encoding::DeflateBase64);
    }

    #[test]
    fn falls_back_to_base64_without_deflate_support() {
        let profile = TransferProfile {
            chunk_size: 1024,
            deflate_supported: false,
        };
        let data = vec![0u8; 512];
        assert_eq!(profile.choose_encoding(&data), Encoding::Base64);
    }
}
