#![deny(missing_docs)]
#![deny(unreachable_pub)]
#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/Finomnis/mpylink/issues")]

/// A high level client that ties the protocol engine, VFS server and
/// transfer pipeline together.
pub mod client;
pub use client::Mpy;

/// Transport layer: serial and TCP byte streams.
pub mod transport;

/// Escape-byte router that multiplexes REPL output with in-band VFS frames.
pub mod router;

/// REPL / raw-REPL / raw-paste protocol engine.
pub mod repl;

/// Known on-device `OSError` codes and their human-readable messages.
pub mod errno;

/// Device-side MicroPython helper snippets.
pub mod helpers;

/// Host-side VFS server answering device mount requests.
pub mod vfs;

/// File upload/download pipeline: encoding selection and change detection.
pub mod transfer;

/// Seam for an external `.py` -> `.mpy` cross compiler.
pub mod compiler;

/// Parser for the small literal grammar the device's REPL echoes back.
pub mod value;
