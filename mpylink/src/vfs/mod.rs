//! Host-side VFS server: answers the escape-channel requests the
//! device-side mount agent (see [`crate::helpers`]) issues on behalf of
//! MicroPython's `os` module, translating them to real filesystem
//! operations under a backing directory with optional sub-mount
//! overlays and `.py` → `.mpy` compile redirection.

mod wire;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::compiler::{self, Compiler};
use crate::helpers::{ATTR_DIR, ATTR_FILE};
use crate::router::{EscapeHandler, HandlerIo};
use wire::{read_path, read_string, read_u32, read_u8, write_i32, write_string, write_u32, write_u8};

const ENOENT: i32 = 2;
const EACCES: i32 = 13;
const EEXIST: i32 = 17;
const EISDIR: i32 = 21;
const EINVAL: i32 = 22;
const EROFS: i32 = 30;

const CMD_STAT: u8 = 1;
const CMD_LISTDIR: u8 = 2;
const CMD_OPEN: u8 = 3;
const CMD_CLOSE: u8 = 4;
const CMD_READ: u8 = 5;
const CMD_WRITE: u8 = 6;
const CMD_MKDIR: u8 = 7;
const CMD_REMOVE: u8 = 8;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

struct Submount {
    /// Device-absolute mount point, without a trailing slash (e.g. `/data`).
    prefix: String,
    backing: PathBuf,
    read_only: bool,
}

enum OpenFile {
    Read(fs::File),
    Write(fs::File),
}

/// Redirects `.py` opens to a compiled `.mpy` artifact instead of
/// serving the source file verbatim.
pub struct CompileRedirect {
    /// Compiler implementation used to produce `.mpy` bytecode.
    pub compiler: Box<dyn Compiler>,
    /// Device `sys.implementation._mpy` major version.
    pub mpy_version: u8,
    /// Device `sys.implementation._mpy` sub-version.
    pub mpy_sub_version: u8,
    /// Device architecture name for `-march`, if known.
    pub arch: Option<String>,
}

/// Services one mounted VFS for one device mount id.
pub struct MountHandler {
    root: PathBuf,
    read_only: bool,
    submounts: Vec<Submount>,
    open: HashMap<u8, OpenFile>,
    next_fd: u8,
    compile: Option<CompileRedirect>,
}

impl MountHandler {
    /// Serves `root` as the device's `/`, read-write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
            submounts: Vec::new(),
            open: HashMap::new(),
            next_fd: 0,
            compile: None,
        }
    }

    /// Marks the top-level mount read-only: writes, mkdir, and remove
    /// against paths outside any writable sub-mount are rejected.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Overlays `backing` at device-absolute `prefix` (e.g. `/data`).
    /// Later-added submounts take precedence over earlier, overlapping
    /// ones.
    pub fn add_submount(&mut self, prefix: impl Into<String>, backing: impl Into<PathBuf>, read_only: bool) {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('/').to_string();
        self.submounts.push(Submount {
            prefix,
            backing: backing.into(),
            read_only,
        });
    }

    /// Enables `.py` → `.mpy` compile-on-open redirection.
    pub fn set_compiler(&mut self, redirect: CompileRedirect) {
        self.compile = Some(redirect);
    }

    /// Resolves a device-absolute path to (backing host path,
    /// effective read-only flag), rejecting traversal outside any
    /// backing root.
    fn resolve(&self, device_path: &str) -> Result<(PathBuf, bool), i32> {
        let normalized = normalize(device_path)?;
        let mut best: Option<&Submount> = None;
        for sub in &self.submounts {
            if normalized == sub.prefix || normalized.starts_with(&format!("{}/", sub.prefix)) {
                if best.is_none_or(|b| sub.prefix.len() > b.prefix.len()) {
                    best = Some(sub);
                }
            }
        }
        if let Some(sub) = best {
            let rest = normalized.strip_prefix(&sub.prefix).unwrap_or("").trim_start_matches('/');
            Ok((join_safely(&sub.backing, rest), sub.read_only))
        } else {
            let rest = normalized.trim_start_matches('/');
            Ok((join_safely(&self.root, rest), self.read_only))
        }
    }

    /// True if `device_path` isn't a real directory under any backing
    /// root but is an ancestor of some sub-mount's prefix: the overlay
    /// still needs to present it as a navigable directory.
    fn is_virtual_dir(&self, device_path: &str) -> bool {
        let normalized = match normalize(device_path) {
            Ok(n) => n,
            Err(_) => return false,
        };
        let probe = if normalized == "/" {
            String::new()
        } else {
            format!("{normalized}/")
        };
        self.submounts.iter().any(|s| format!("{}/", s.prefix).starts_with(&probe) && s.prefix.len() + 1 > probe.len())
    }

    fn virtual_children(&self, device_path: &str) -> Vec<String> {
        let normalized = match normalize(device_path) {
            Ok(n) => n,
            Err(_) => return Vec::new(),
        };
        let base = if normalized == "/" { "" } else { normalized.as_str() };
        let mut names = Vec::new();
        for sub in &self.submounts {
            if let Some(rest) = sub.prefix.strip_prefix(base) {
                let rest = rest.trim_start_matches('/');
                if let Some(first) = rest.split('/').next() {
                    if !first.is_empty() && !names.contains(&first.to_string()) {
                        names.push(first.to_string());
                    }
                }
            }
        }
        names
    }

    fn handle_stat(&mut self, io: &mut dyn HandlerIo) -> std::io::Result<()> {
        let path = read_path(io, REQUEST_TIMEOUT)?;
        match self.do_stat(&path) {
            Ok((attr, size, mtime)) => {
                write_u8(io, 0)?;
                write_u32(io, attr)?;
                write_u32(io, size)?;
                write_u32(io, mtime)?;
            }
            Err(errno) => write_i32_as_i8(io, -errno)?,
        }
        Ok(())
    }

    fn do_stat(&self, path: &str) -> Result<(u32, u32, u32), i32> {
        let (resolved, _) = self.resolve(path)?;
        match fs::metadata(&resolved) {
            Ok(meta) => {
                let attr = if meta.is_dir() { ATTR_DIR } else { ATTR_FILE };
                let size = if meta.is_dir() { 0 } else { meta.len() as u32 };
                let mtime = mtime_secs(&meta);
                Ok((attr, size, mtime))
            }
            Err(_) if self.is_virtual_dir(path) => Ok((ATTR_DIR, 0, 0)),
            Err(_) => Err(ENOENT),
        }
    }

    fn handle_listdir(&mut self, io: &mut dyn HandlerIo) -> std::io::Result<()> {
        let path = read_path(io, REQUEST_TIMEOUT)?;
        match self.do_listdir(&path) {
            Ok(entries) => {
                write_i32(io, entries.len() as i32)?;
                for (name, size) in entries {
                    write_string(io, &name)?;
                    write_u32(io, size)?;
                }
            }
            Err(errno) => write_i32(io, -errno)?,
        }
        Ok(())
    }

    fn do_listdir(&self, path: &str) -> Result<Vec<(String, u32)>, i32> {
        let (resolved, _) = self.resolve(path)?;
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        if let Ok(read_dir) = fs::read_dir(&resolved) {
            for entry in read_dir.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                let meta = match entry.metadata() {
                    Ok(m) => m,
                    Err(_) => continue,
                };
                let attr = if meta.is_dir() { ATTR_DIR } else { ATTR_FILE };
                seen.insert(name.clone());
                out.push((name, attr));
            }
        } else if !self.is_virtual_dir(path) && out.is_empty() {
            return Err(ENOENT);
        }
        for name in self.virtual_children(path) {
            if seen.insert(name.clone()) {
                out.push((name, ATTR_DIR));
            }
        }
        Ok(out)
    }

    fn handle_open(&mut self, io: &mut dyn HandlerIo) -> std::io::Result<()> {
        let path = read_path(io, REQUEST_TIMEOUT)?;
        let mode = read_string(io, REQUEST_TIMEOUT)?;
        match self.do_open(&path, &mode) {
            Ok(fd) => write_i32_as_i8(io, fd as i32)?,
            Err(errno) => write_i32_as_i8(io, -errno)?,
        }
        Ok(())
    }

    fn do_open(&mut self, path: &str, mode: &str) -> Result<u8, i32> {
        let (resolved, read_only) = self.resolve(path)?;
        let writing = mode.contains('w') || mode.contains('a') || mode.contains('+');
        if writing {
            if read_only {
                return Err(EROFS);
            }
            let file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(mode.contains('w'))
                .append(mode.contains('a'))
                .open(&resolved)
                .map_err(|_| EACCES)?;
            let fd = self.allocate_fd();
            self.open.insert(fd, OpenFile::Write(file));
            Ok(fd)
        } else {
            let bytes = self.read_for_open(&resolved, path)?;
            let fd = self.allocate_fd();
            self.open.insert(fd, OpenFile::Read(bytes));
            Ok(fd)
        }
    }

    fn read_for_open(&self, resolved: &Path, device_path: &str) -> Result<fs::File, i32> {
        if resolved.extension().and_then(|e| e.to_str()) == Some("py") {
            if let Some(redirect) = &self.compile {
                let bytes = compiler::compile_cached(
                    redirect.compiler.as_ref(),
                    resolved,
                    redirect.mpy_version,
                    redirect.mpy_sub_version,
                    redirect.arch.as_deref(),
                )
                .map_err(|_| EACCES)?;
                return file_from_bytes(&bytes).map_err(|_| EACCES);
            }
        }
        if resolved.is_dir() {
            return Err(EISDIR);
        }
        fs::File::open(resolved).map_err(|_| {
            if device_path == "/" { EISDIR } else { ENOENT }
        })
    }

    /// File descriptors are handed to the device as a signed byte, so
    /// they're kept below 128 to stay distinguishable from a negative
    /// errno response.
    fn allocate_fd(&mut self) -> u8 {
        loop {
            let fd = self.next_fd % 128;
            self.next_fd = self.next_fd.wrapping_add(1);
            if !self.open.contains_key(&fd) {
                return fd;
            }
        }
    }

    fn handle_close(&mut self, io: &mut dyn HandlerIo) -> std::io::Result<()> {
        let fd = read_u8(io, REQUEST_TIMEOUT)?;
        self.open.remove(&fd);
        Ok(())
    }

    fn handle_read(&mut self, io: &mut dyn HandlerIo) -> std::io::Result<()> {
        let fd = read_u8(io, REQUEST_TIMEOUT)?;
        let want = read_u32(io, REQUEST_TIMEOUT)? as usize;
        use std::io::Read;
        let result = match self.open.get_mut(&fd) {
            Some(OpenFile::Read(file)) => {
                let mut buf = vec![0u8; want];
                let n = file.read(&mut buf).unwrap_or(0);
                buf.truncate(n);
                Some(buf)
            }
            _ => None,
        };
        match result {
            Some(buf) => {
                write_i32(io, buf.len() as i32)?;
                io.write(&buf)?;
            }
            None => write_i32(io, -EINVAL)?,
        }
        Ok(())
    }

    fn handle_write(&mut self, io: &mut dyn HandlerIo) -> std::io::Result<()> {
        let fd = read_u8(io, REQUEST_TIMEOUT)?;
        let len = read_u32(io, REQUEST_TIMEOUT)? as usize;
        let data = io.read_bytes(len, REQUEST_TIMEOUT)?;
        use std::io::Write;
        let errno = match self.open.get_mut(&fd) {
            Some(OpenFile::Write(file)) => match file.write_all(&data) {
                Ok(()) => 0,
                Err(_) => -EACCES,
            },
            Some(OpenFile::Read(_)) => -EINVAL,
            None => -EINVAL,
        };
        write_i32_as_i8(io, errno)
    }

    fn handle_mkdir(&mut self, io: &mut dyn HandlerIo) -> std::io::Result<()> {
        let path = read_path(io, REQUEST_TIMEOUT)?;
        let errno = match self.do_mkdir(&path) {
            Ok(()) => 0,
            Err(e) => -e,
        };
        write_i32_as_i8(io, errno)
    }

    fn do_mkdir(&self, path: &str) -> Result<(), i32> {
        let (resolved, read_only) = self.resolve(path)?;
        if read_only {
            return Err(EROFS);
        }
        if resolved.exists() {
            return Err(EEXIST);
        }
        fs::create_dir(&resolved).map_err(|_| EACCES)
    }

    fn handle_remove(&mut self, io: &mut dyn HandlerIo) -> std::io::Result<()> {
        let path = read_path(io, REQUEST_TIMEOUT)?;
        let recursive = read_u8(io, REQUEST_TIMEOUT)? != 0;
        let errno = match self.do_remove(&path, recursive) {
            Ok(()) => 0,
            Err(e) => -e,
        };
        write_i32_as_i8(io, errno)
    }

    fn do_remove(&self, path: &str, recursive: bool) -> Result<(), i32> {
        let (resolved, read_only) = self.resolve(path)?;
        if read_only {
            return Err(EROFS);
        }
        let meta = fs::symlink_metadata(&resolved).map_err(|_| ENOENT)?;
        if meta.is_dir() {
            if recursive {
                fs::remove_dir_all(&resolved).map_err(|_| EACCES)
            } else {
                fs::remove_dir(&resolved).map_err(|_| EACCES)
            }
        } else {
            fs::remove_file(&resolved).map_err(|_| EACCES)
        }
    }
}

impl EscapeHandler for MountHandler {
    fn dispatch(&mut self, cmd: u8, io: &mut dyn HandlerIo) {
        let result = match cmd {
            CMD_STAT => self.handle_stat(io),
            CMD_LISTDIR => self.handle_listdir(io),
            CMD_OPEN => self.handle_open(io),
            CMD_CLOSE => self.handle_close(io),
            CMD_READ => self.handle_read(io),
            CMD_WRITE => self.handle_write(io),
            CMD_MKDIR => self.handle_mkdir(io),
            CMD_REMOVE => self.handle_remove(io),
            _ => Ok(()),
        };
        if let Err(err) = result {
            log::warn!("VFS request (cmd {cmd}) failed: {err}");
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

fn write_i32_as_i8(io: &mut dyn HandlerIo, value: i32) -> std::io::Result<()> {
    write_u8(io, value as u8)
}

fn mtime_secs(meta: &fs::Metadata) -> u32 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

fn file_from_bytes(bytes: &[u8]) -> std::io::Result<fs::File> {
    let path = std::env::temp_dir().join(format!("mpylink-mpy-{}-{}", std::process::id(), bytes.len()));
    fs::write(&path, bytes)?;
    let file = fs::File::open(&path)?;
    let _ = fs::remove_file(&path);
    Ok(file)
}

/// Splits a device-absolute path into components, rejecting `..` and
/// empty-root escapes before it ever touches the filesystem.
fn normalize(path: &str) -> Result<String, i32> {
    if !path.starts_with('/') {
        return Err(EINVAL);
    }
    let mut out = String::from("/");
    for part in path.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(EACCES);
        }
        if out.len() > 1 {
            out.push('/');
        }
        out.push_str(part);
    }
    Ok(out)
}

fn join_safely(root: &Path, rest: &str) -> PathBuf {
    if rest.is_empty() {
        return root.to_path_buf();
    }
    root.join(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tempdir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mpylink-vfs-test-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn stat_reports_file_size() {
        let root = tempdir("stat");
        fs::write(root.join("a.txt"), b"hello").unwrap();
        let handler = MountHandler::new(&root);
        let (attr, size, _mtime) = handler.do_stat("/a.txt").unwrap();
        assert_eq!(attr, ATTR_FILE);
        assert_eq!(size, 5);
    }

    #[test]
    fn stat_rejects_parent_traversal() {
        let root = tempdir("traverse");
        let handler = MountHandler::new(&root);
        assert_eq!(handler.do_stat("/../etc/passwd"), Err(EACCES));
    }

    #[test]
    fn listdir_merges_submount_overlay() {
        let root = tempdir("listdir-root");
        let sub = tempdir("listdir-sub");
        fs::write(root.join("local.txt"), b"x").unwrap();
        let mut handler = MountHandler::new(&root);
        handler.add_submount("/data", &sub, false);
        let entries = handler.do_listdir("/").unwrap();
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"local.txt"));
        assert!(names.contains(&"data"));
    }

    #[test]
    fn virtual_directory_is_reported_above_nested_submount() {
        let root = tempdir("virtual-root");
        let sub = tempdir("virtual-sub");
        let mut handler = MountHandler::new(&root);
        handler.add_submount("/a/b", &sub, false);
        let (attr, _, _) = handler.do_stat("/a").unwrap();
        assert_eq!(attr, ATTR_DIR);
    }

    #[test]
    fn write_is_rejected_under_a_read_only_submount() {
        let root = tempdir("ro-root");
        let sub = tempdir("ro-sub");
        let mut handler = MountHandler::new(&root);
        handler.add_submount("/ro", &sub, true);
        assert_eq!(handler.do_open("/ro/new.txt", "wb"), Err(EROFS));
    }

    #[test]
    fn mkdir_fails_if_path_already_exists() {
        let root = tempdir("mkdir-exists");
        fs::create_dir(root.join("x")).unwrap();
        let handler = MountHandler::new(&root);
        assert_eq!(handler.do_mkdir("/x"), Err(EEXIST));
    }
}
