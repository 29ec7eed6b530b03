//! Little-endian primitive codecs over [`HandlerIo`], matching the
//! `struct.pack`/`unpack` formats the device-side mount agent uses.

use std::io;
use std::time::Duration;

use crate::router::HandlerIo;

pub fn read_u8(io: &mut dyn HandlerIo, timeout: Duration) -> io::Result<u8> {
    let bytes = io.read_bytes(1, timeout)?;
    Ok(bytes[0])
}

pub fn write_u8(io: &mut dyn HandlerIo, value: u8) -> io::Result<()> {
    io.write(&[value])
}

pub fn read_u32(io: &mut dyn HandlerIo, timeout: Duration) -> io::Result<u32> {
    let bytes = io.read_bytes(4, timeout)?;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

pub fn write_u32(io: &mut dyn HandlerIo, value: u32) -> io::Result<()> {
    io.write(&value.to_le_bytes())
}

pub fn write_i32(io: &mut dyn HandlerIo, value: i32) -> io::Result<()> {
    io.write(&value.to_le_bytes())
}

pub fn read_string(io: &mut dyn HandlerIo, timeout: Duration) -> io::Result<String> {
    let len_bytes = io.read_bytes(4, timeout)?;
    let len = i32::from_le_bytes(len_bytes.try_into().unwrap());
    if len <= 0 {
        return Ok(String::new());
    }
    let bytes = io.read_bytes(len as usize, timeout)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn write_string(io: &mut dyn HandlerIo, value: &str) -> io::Result<()> {
    let bytes = value.as_bytes();
    write_i32(io, bytes.len() as i32)?;
    if !bytes.is_empty() {
        io.write(bytes)?;
    }
    Ok(())
}

/// Reads a length-prefixed device path; identical wire shape to
/// [`read_string`], named separately for call-site clarity.
pub fn read_path(io: &mut dyn HandlerIo, timeout: Duration) -> io::Result<String> {
    read_string(io, timeout)
}
