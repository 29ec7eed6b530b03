//! Interactive terminal mirroring the device REPL's byte stream,
//! built on `crossterm` rather than a hand-rolled Unix/Windows split:
//! one idiomatic cross-platform raw-mode backend covers what a
//! platform-capability trait would otherwise need two implementations
//! for.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use mpylink::Mpy;
use mpylink::transport::Transport;

use crate::errors::CliError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Mirrors device output to stdout and local keystrokes to the device
/// until the user presses Ctrl-], restoring terminal state on every
/// exit path including errors.
pub fn run(mpy: &mut Mpy<Box<dyn Transport>>) -> Result<(), CliError> {
    enable_raw_mode().map_err(CliError::DeviceControlFailed)?;
    let result = run_inner(mpy);
    let _ = disable_raw_mode();
    result
}

fn run_inner(mpy: &mut Mpy<Box<dyn Transport>>) -> Result<(), CliError> {
    println!("entering interactive terminal, Ctrl-] to exit\r");
    let router = mpy.repl_mut().router_mut();
    let mut stdout = io::stdout();
    loop {
        if let Some((data, remount)) = router
            .pump(POLL_INTERVAL)
            .map_err(CliError::DeviceControlFailed)?
        {
            stdout.write_all(&data).map_err(CliError::OutputWriteFailed)?;
            stdout.flush().map_err(CliError::OutputWriteFailed)?;
            if remount {
                log::info!("device soft-rebooted; mount agents will reinstall on next use");
            }
        }

        if event::poll(Duration::ZERO).map_err(CliError::DeviceControlFailed)? {
            match event::read().map_err(CliError::DeviceControlFailed)? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    if key.code == KeyCode::Char(']') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        println!("\r\nterminal closed\r");
                        return Ok(());
                    }
                    if let Some(bytes) = key_to_bytes(key.code, key.modifiers) {
                        let _ = router.write(&bytes);
                    }
                }
                _ => {}
            }
        }
    }
}

fn key_to_bytes(code: KeyCode, modifiers: KeyModifiers) -> Option<Vec<u8>> {
    match code {
        KeyCode::Char(c) if modifiers.contains(KeyModifiers::CONTROL) => {
            let upper = c.to_ascii_uppercase();
            if upper.is_ascii_alphabetic() {
                Some(vec![(upper as u8) - b'A' + 1])
            } else {
                None
            }
        }
        KeyCode::Char(c) => Some(c.to_string().into_bytes()),
        KeyCode::Enter => Some(vec![b'\r']),
        KeyCode::Backspace => Some(vec![0x7f]),
        KeyCode::Tab => Some(vec![b'\t']),
        KeyCode::Esc => Some(vec![0x1b]),
        KeyCode::Up => Some(b"\x1b[A".to_vec()),
        KeyCode::Down => Some(b"\x1b[B".to_vec()),
        KeyCode::Right => Some(b"\x1b[C".to_vec()),
        KeyCode::Left => Some(b"\x1b[D".to_vec()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_letters_map_to_ascii_control_codes() {
        assert_eq!(key_to_bytes(KeyCode::Char('c'), KeyModifiers::CONTROL), Some(vec![3]));
        assert_eq!(key_to_bytes(KeyCode::Char('a'), KeyModifiers::CONTROL), Some(vec![1]));
    }

    #[test]
    fn control_non_letters_are_ignored() {
        assert_eq!(key_to_bytes(KeyCode::Char('1'), KeyModifiers::CONTROL), None);
    }

    #[test]
    fn plain_chars_pass_through_as_utf8() {
        assert_eq!(key_to_bytes(KeyCode::Char('x'), KeyModifiers::NONE), Some(b"x".to_vec()));
    }

    #[test]
    fn arrow_keys_become_ansi_escape_sequences() {
        assert_eq!(key_to_bytes(KeyCode::Up, KeyModifiers::NONE), Some(b"\x1b[A".to_vec()));
        assert_eq!(key_to_bytes(KeyCode::Left, KeyModifiers::NONE), Some(b"\x1b[D".to_vec()));
    }

    #[test]
    fn unmapped_keys_return_none() {
        assert_eq!(key_to_bytes(KeyCode::F(1), KeyModifiers::NONE), None);
    }
}
