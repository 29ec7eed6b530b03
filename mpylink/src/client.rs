//! `Mpy`: the facade tying the transport, escape router, REPL engine,
//! device runtime shim, VFS server, and transfer pipeline together into
//! the operations a caller actually wants (stat, ls, get, put, mount,
//! ...).

use std::collections::HashSet;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::helpers;
use crate::repl::{ReplEngine, ReplError};
use crate::transfer::{self, TransferProfile};
use crate::transport::Transport;
use crate::value::Value;
use crate::vfs::MountHandler;

const EXEC_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors the facade can raise, layered on top of the protocol-level
/// [`ReplError`].
#[derive(Error, Debug, Diagnostic)]
pub enum MpyError {
    /// The underlying REPL protocol failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Repl(#[from] ReplError),
    /// Neither a file nor a directory exists at this path.
    #[error("path '{0}' was not found")]
    #[diagnostic(code(mpylink::client::path_not_found))]
    PathNotFound(String),
    /// A file operation was attempted against a path that isn't a file.
    #[error("file '{0}' was not found")]
    #[diagnostic(code(mpylink::client::file_not_found))]
    FileNotFound(String),
    /// A directory operation was attempted against a path that isn't a
    /// directory.
    #[error("dir '{0}' was not found")]
    #[diagnostic(code(mpylink::client::dir_not_found))]
    DirNotFound(String),
    /// A call's arguments conflict with existing state, e.g. mounting
    /// one mount point inside another.
    #[error("invalid parameters: {0}")]
    #[diagnostic(code(mpylink::client::params))]
    Params(String),
}

/// `os.stat`-equivalent result for a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    /// A regular file of this size in bytes.
    File(u64),
    /// A directory.
    Dir,
}

/// One node of a recursive directory listing, as returned by [`Mpy::tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    /// A regular file of this size in bytes.
    File {
        /// File name, relative to its parent.
        name: String,
        /// Size in bytes.
        size: u64,
    },
    /// A directory and its recursively-listed contents.
    Dir {
        /// Directory name, relative to its parent.
        name: String,
        /// Total size in bytes of every file nested under this directory.
        size: u64,
        /// Immediate children, directories and files mixed.
        children: Vec<TreeNode>,
    },
}

fn parse_tree_node(value: Value) -> Result<TreeNode, ReplError> {
    let mut fields = value
        .into_sequence()
        .ok_or_else(|| ReplError::Protocol("malformed tree entry".into()))?;
    if fields.len() != 3 {
        return Err(ReplError::Protocol("malformed tree entry".into()));
    }
    let children = fields.pop().unwrap();
    let size = fields
        .pop()
        .unwrap()
        .as_int()
        .ok_or_else(|| ReplError::Protocol("expected an integer size in tree entry".into()))?;
    let name = match fields.pop().unwrap() {
        Value::Str(s) => s,
        other => return Err(ReplError::Protocol(format!("expected a name, got {other}"))),
    };
    match children {
        Value::None => Ok(TreeNode::File { name, size: size as u64 }),
        other => {
            let children = other
                .into_sequence()
                .ok_or_else(|| ReplError::Protocol("malformed tree children list".into()))?
                .into_iter()
                .map(parse_tree_node)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TreeNode::Dir {
                name,
                size: size as u64,
                children,
            })
        }
    }
}

struct Mount {
    mid: u8,
    device_path: String,
}

/// Drives one connected device end to end.
pub struct Mpy<T> {
    repl: ReplEngine<T>,
    loaded_helpers: HashSet<&'static str>,
    imported_modules: HashSet<String>,
    transfer_profile: Option<TransferProfile>,
    mounts: Vec<Mount>,
    next_mid: u8,
}

impl<T: Transport> Mpy<T> {
    /// Wraps an already-constructed REPL engine.
    pub fn new(repl: ReplEngine<T>) -> Self {
        Self {
            repl,
            loaded_helpers: HashSet::new(),
            imported_modules: HashSet::new(),
            transfer_profile: None,
            mounts: Vec::new(),
            next_mid: 1,
        }
    }

    /// Mutable access to the REPL engine for operations the facade
    /// doesn't wrap directly.
    pub fn repl_mut(&mut self) -> &mut ReplEngine<T> {
        &mut self.repl
    }

    /// Runs `code` for its side effects, returning anything written to
    /// stdout before the prompt returned.
    pub fn exec(&mut self, code: &str) -> Result<Vec<u8>, MpyError> {
        Ok(self.repl.exec(code, EXEC_TIMEOUT)?)
    }

    /// Evaluates `expr` and returns its `repr()`, raw and unparsed.
    pub fn exec_eval(&mut self, expr: &str) -> Result<Vec<u8>, MpyError> {
        Ok(self.repl.exec_eval(expr, EXEC_TIMEOUT)?)
    }

    /// Runs `code` via raw-paste mode, falling back to plain raw REPL
    /// submission if the device doesn't support it.
    pub fn exec_raw_paste(&mut self, code: &str) -> Result<Vec<u8>, MpyError> {
        Ok(self.repl.exec_raw_paste(code.as_bytes(), EXEC_TIMEOUT)?)
    }

    fn import_module(&mut self, module: &str) -> Result<(), MpyError> {
        if self.imported_modules.contains(module) {
            return Ok(());
        }
        self.repl.exec(&format!("import {module}"), EXEC_TIMEOUT)?;
        self.imported_modules.insert(module.to_string());
        Ok(())
    }

    fn load_helper(&mut self, name: &'static str, source: &str) -> Result<(), MpyError> {
        if self.loaded_helpers.contains(name) {
            return Ok(());
        }
        self.import_module("os")?;
        self.repl.exec(source, EXEC_TIMEOUT)?;
        self.loaded_helpers.insert(name);
        Ok(())
    }

    /// `os.stat` translated to a simple file-size-or-directory result.
    pub fn stat(&mut self, path: &str) -> Result<Option<Stat>, MpyError> {
        self.load_helper("stat", helpers::STAT)?;
        let out = self
            .repl
            .exec_eval(&format!("_mpylink_stat({})", transfer::py_str_literal(path)), EXEC_TIMEOUT)?;
        let text = String::from_utf8_lossy(&out);
        match Value::parse(&text).map_err(|e| ReplError::Protocol(e.to_string()))? {
            Value::None => Ok(None),
            Value::Int(-1) => Ok(Some(Stat::Dir)),
            Value::Int(n) if n >= 0 => Ok(Some(Stat::File(n as u64))),
            other => Err(ReplError::Protocol(format!("unexpected stat result: {other}")).into()),
        }
    }

    /// Lists one directory's immediate entries as `(name, is_dir)`.
    pub fn ls(&mut self, path: &str) -> Result<Vec<(String, bool)>, MpyError> {
        self.import_module("os")?;
        let expr = format!(
            "list((n, a) for n, a, *_ in os.ilistdir({}))",
            transfer::py_str_literal(path)
        );
        let out = self.repl.exec_eval(&expr, EXEC_TIMEOUT)?;
        let text = String::from_utf8_lossy(&out);
        let list = Value::parse(&text)
            .map_err(|e| ReplError::Protocol(e.to_string()))?
            .into_sequence()
            .ok_or_else(|| ReplError::Protocol("expected a list from ilistdir".into()))?;
        let mut entries = Vec::with_capacity(list.len());
        for entry in list {
            let mut fields = entry
                .into_sequence()
                .ok_or_else(|| ReplError::Protocol("malformed ilistdir entry".into()))?;
            if fields.len() != 2 {
                return Err(ReplError::Protocol("malformed ilistdir entry".into()).into());
            }
            let attr = fields.pop().unwrap();
            let name = fields.pop().unwrap();
            let name = match name {
                Value::Str(s) => s,
                other => return Err(ReplError::Protocol(format!("expected a name, got {other}")).into()),
            };
            let is_dir = attr.as_int() == Some(helpers::ATTR_DIR as i64);
            entries.push((name, is_dir));
        }
        Ok(entries)
    }

    /// Recursively lists `path`'s contents as a [`TreeNode`] tree.
    pub fn tree(&mut self, path: &str) -> Result<TreeNode, MpyError> {
        self.load_helper("tree", helpers::TREE)?;
        let out = self
            .repl
            .exec_eval(&format!("_mpylink_tree({})", transfer::py_str_literal(path)), EXEC_TIMEOUT)?;
        let value = Value::parse(&String::from_utf8_lossy(&out)).map_err(|e| ReplError::Protocol(e.to_string()))?;
        Ok(parse_tree_node(value)?)
    }

    /// Recursively creates `path` and any missing parent directories.
    pub fn mkdir(&mut self, path: &str) -> Result<(), MpyError> {
        self.load_helper("mkdir", helpers::MKDIR)?;
        let out = self
            .repl
            .exec_eval(&format!("_mpylink_mkdir({})", transfer::py_str_literal(path)), EXEC_TIMEOUT)?;
        if String::from_utf8_lossy(&out).trim() == "True" {
            return Err(MpyError::Params(format!(
                "'{path}' is blocked by an existing file along its path"
            )));
        }
        Ok(())
    }

    /// Deletes a file, or a directory if `recursive` is set. A
    /// non-empty directory without `recursive` fails the same way
    /// `os.rmdir` would on-device.
    pub fn delete(&mut self, path: &str, recursive: bool) -> Result<(), MpyError> {
        match self.stat(path)? {
            None => Err(MpyError::PathNotFound(path.to_string())),
            Some(Stat::Dir) if recursive => {
                self.load_helper("rmdir", helpers::RMDIR)?;
                self.repl
                    .exec(&format!("_mpylink_rmdir({})", transfer::py_str_literal(path)), EXEC_TIMEOUT)?;
                Ok(())
            }
            Some(Stat::Dir) => {
                self.import_module("os")?;
                self.repl
                    .exec(&format!("os.rmdir({})", transfer::py_str_literal(path)), EXEC_TIMEOUT)?;
                Ok(())
            }
            Some(Stat::File(_)) => {
                self.import_module("os")?;
                self.repl
                    .exec(&format!("os.remove({})", transfer::py_str_literal(path)), EXEC_TIMEOUT)?;
                Ok(())
            }
        }
    }

    fn profile(&mut self) -> Result<TransferProfile, MpyError> {
        if let Some(profile) = &self.transfer_profile {
            return Ok(profile.clone());
        }
        let profile = TransferProfile::probe(&mut self.repl)?;
        self.transfer_profile = Some(profile.clone());
        Ok(profile)
    }

    /// Reads a whole file's contents from the device.
    pub fn get(&mut self, path: &str) -> Result<Vec<u8>, MpyError> {
        self.get_with_progress(path, None)
    }

    /// Same as [`Mpy::get`], reporting `(bytes_read, total_size)` to
    /// `progress` after each chunk.
    pub fn get_with_progress(
        &mut self,
        path: &str,
        progress: Option<&mut dyn FnMut(u64, u64)>,
    ) -> Result<Vec<u8>, MpyError> {
        let size = match self.stat(path)? {
            None | Some(Stat::Dir) => return Err(MpyError::FileNotFound(path.to_string())),
            Some(Stat::File(size)) => size,
        };
        let profile = self.profile()?;
        Ok(transfer::get(&mut self.repl, path, &profile, size, progress)?)
    }

    /// Writes `data` to `path`, skipping the upload if the device
    /// already holds identical content.
    pub fn put(&mut self, path: &str, data: &[u8]) -> Result<bool, MpyError> {
        self.put_with_progress(path, data, None)
    }

    /// Same as [`Mpy::put`], reporting `(bytes_written, total_size)` to
    /// `progress` after each chunk.
    pub fn put_with_progress(
        &mut self,
        path: &str,
        data: &[u8],
        progress: Option<&mut dyn FnMut(u64, u64)>,
    ) -> Result<bool, MpyError> {
        let profile = self.profile()?;
        Ok(transfer::put(&mut self.repl, path, data, &profile, progress)?)
    }

    /// SHA-256 hex digest of a device file, if it exists.
    pub fn hashfile(&mut self, path: &str) -> Result<Option<String>, MpyError> {
        Ok(transfer::device_hash(&mut self.repl, path)?)
    }

    /// Renames (or moves) a device path.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), MpyError> {
        self.import_module("os")?;
        self.repl.exec(
            &format!(
                "os.rename({}, {})",
                transfer::py_str_literal(from),
                transfer::py_str_literal(to)
            ),
            EXEC_TIMEOUT,
        )?;
        Ok(())
    }

    /// Changes the device's current working directory.
    pub fn chdir(&mut self, path: &str) -> Result<(), MpyError> {
        self.import_module("os")?;
        self.repl
            .exec(&format!("os.chdir({})", transfer::py_str_literal(path)), EXEC_TIMEOUT)?;
        Ok(())
    }

    /// Returns the device's current working directory.
    pub fn getcwd(&mut self) -> Result<String, MpyError> {
        self.import_module("os")?;
        let out = self.repl.exec_eval("os.getcwd()", EXEC_TIMEOUT)?;
        match Value::parse(&String::from_utf8_lossy(&out)).map_err(|e| ReplError::Protocol(e.to_string()))? {
            Value::Str(s) => Ok(s),
            other => Err(ReplError::Protocol(format!("expected a path string, got {other}")).into()),
        }
    }

    /// Prepends `path` to `sys.path` unless already present.
    pub fn sys_path_prepend(&mut self, path: &str) -> Result<(), MpyError> {
        self.import_module("sys")?;
        self.repl.exec(
            &format!(
                "sys.path.insert(0, {lit}) if {lit} not in sys.path else None",
                lit = transfer::py_str_literal(path)
            ),
            EXEC_TIMEOUT,
        )?;
        Ok(())
    }

    /// Appends `path` to `sys.path` unless already present.
    pub fn sys_path_append(&mut self, path: &str) -> Result<(), MpyError> {
        self.import_module("sys")?;
        self.repl.exec(
            &format!(
                "sys.path.append({lit}) if {lit} not in sys.path else None",
                lit = transfer::py_str_literal(path)
            ),
            EXEC_TIMEOUT,
        )?;
        Ok(())
    }

    /// Removes every occurrence of `path` from `sys.path`.
    pub fn sys_path_remove(&mut self, path: &str) -> Result<(), MpyError> {
        self.import_module("sys")?;
        self.repl.exec(
            &format!(
                "[sys.path.remove({lit}) for _ in range(sys.path.count({lit}))]",
                lit = transfer::py_str_literal(path)
            ),
            EXEC_TIMEOUT,
        )?;
        Ok(())
    }

    /// Overwrites `sys.path` with `entries`.
    pub fn sys_path_set(&mut self, entries: &[String]) -> Result<(), MpyError> {
        self.import_module("sys")?;
        let literal = entries
            .iter()
            .map(|e| transfer::py_str_literal(e))
            .collect::<Vec<_>>()
            .join(", ");
        self.repl.exec(&format!("sys.path[:] = [{literal}]"), EXEC_TIMEOUT)?;
        Ok(())
    }

    /// The device's current `sys.path`.
    pub fn sys_path_get(&mut self) -> Result<Vec<String>, MpyError> {
        self.import_module("sys")?;
        let out = self.repl.exec_eval("list(sys.path)", EXEC_TIMEOUT)?;
        let list = Value::parse(&String::from_utf8_lossy(&out))
            .map_err(|e| ReplError::Protocol(e.to_string()))?
            .into_sequence()
            .ok_or_else(|| ReplError::Protocol("expected a list from sys.path".into()))?;
        list.into_iter()
            .map(|v| match v {
                Value::Str(s) => Ok(s),
                other => Err(ReplError::Protocol(format!("expected a path string, got {other}")).into()),
            })
            .collect()
    }

    /// Batched existence/size/hash lookup, skipping the hash for any
    /// entry whose reported size doesn't match the caller's
    /// expectation. Returns `None` for missing paths or directories.
    pub fn fileinfo(&mut self, paths: &[(String, u64)]) -> Result<Vec<Option<(u64, String)>>, MpyError> {
        self.load_helper("fileinfo", helpers::FILEINFO)?;
        let literal = paths
            .iter()
            .map(|(p, size)| format!("({}, {size})", transfer::py_str_literal(p)))
            .collect::<Vec<_>>()
            .join(", ");
        let out = self
            .repl
            .exec_eval(&format!("_mpylink_fileinfo([{literal}])"), EXEC_TIMEOUT)?;
        let list = Value::parse(&String::from_utf8_lossy(&out))
            .map_err(|e| ReplError::Protocol(e.to_string()))?
            .into_sequence()
            .ok_or_else(|| ReplError::Protocol("expected a list from fileinfo".into()))?;
        list.into_iter()
            .map(|entry| match entry {
                Value::None => Ok(None),
                other => {
                    let mut fields = other
                        .into_sequence()
                        .ok_or_else(|| ReplError::Protocol("malformed fileinfo entry".into()))?;
                    if fields.len() != 2 {
                        return Err(ReplError::Protocol("malformed fileinfo entry".into()).into());
                    }
                    let hash = match fields.pop().unwrap() {
                        Value::Str(s) => s,
                        other => return Err(ReplError::Protocol(format!("expected a hash string, got {other}")).into()),
                    };
                    let size = fields
                        .pop()
                        .unwrap()
                        .as_int()
                        .ok_or_else(|| ReplError::Protocol("expected an integer size".into()))?;
                    Ok(Some((size as u64, hash)))
                }
            })
            .collect()
    }

    /// Device-absolute paths currently mounted, in mount order.
    pub fn list_mounts(&self) -> Vec<String> {
        self.mounts.iter().map(|m| m.device_path.clone()).collect()
    }

    /// Resets the device and recovers REPL state, without replaying
    /// mount registrations (see [`Mpy::remount_all`] for that).
    pub fn soft_reset(&mut self) -> Result<(), MpyError> {
        self.repl.soft_reset()?;
        self.imported_modules.clear();
        self.loaded_helpers.clear();
        self.transfer_profile = None;
        Ok(())
    }

    /// The device's `sys.platform` identifier.
    pub fn platform(&mut self) -> Result<String, MpyError> {
        self.import_module("sys")?;
        let out = self.repl.exec_eval("sys.platform", EXEC_TIMEOUT)?;
        match Value::parse(&String::from_utf8_lossy(&out)).map_err(|e| ReplError::Protocol(e.to_string()))? {
            Value::Str(s) => Ok(s),
            other => Err(ReplError::Protocol(format!("expected a platform string, got {other}")).into()),
        }
    }

    /// Mounts `handler`'s backing directory at `device_path` on the
    /// device, rejecting a mount point nested inside (or containing)
    /// one already mounted.
    pub fn mount(&mut self, device_path: &str, chunk_size: usize, handler: MountHandler) -> Result<(), MpyError> {
        let device_path = device_path.trim_end_matches('/');
        for existing in &self.mounts {
            if device_path == existing.device_path
                || device_path.starts_with(&format!("{}/", existing.device_path))
                || existing.device_path.starts_with(&format!("{device_path}/"))
            {
                return Err(MpyError::Params(format!(
                    "mount point '{device_path}' conflicts with existing mount '{}'",
                    existing.device_path
                )));
            }
        }

        let mid = self.next_mid;
        self.next_mid = self.next_mid.wrapping_add(1);

        self.import_module("os")?;
        self.import_module("sys")?;
        self.repl.exec(
            &helpers::MOUNT_AGENT_TEMPLATE
                .replace("{chunk_size}", &chunk_size.to_string())
                .replace("{mount_point}", device_path)
                .replace("{mid}", &mid.to_string()),
            EXEC_TIMEOUT,
        )?;
        self.repl.exec(&format!("_mt_mount_{mid}()"), EXEC_TIMEOUT)?;

        self.repl.router_mut().register_handler(mid, Box::new(handler));
        self.mounts.push(Mount {
            mid,
            device_path: device_path.to_string(),
        });
        Ok(())
    }

    /// Adds a submount overlay to an already-registered mount point at
    /// `device_path`, without reinstalling the on-device agent.
    pub fn add_submount(
        &mut self,
        device_path: &str,
        prefix: impl Into<String>,
        backing: impl Into<std::path::PathBuf>,
        read_only: bool,
    ) -> Result<(), MpyError> {
        let device_path = device_path.trim_end_matches('/');
        let mid = self
            .mounts
            .iter()
            .find(|m| m.device_path == device_path)
            .map(|m| m.mid)
            .ok_or_else(|| MpyError::Params(format!("'{device_path}' is not mounted")))?;
        let handler = self
            .repl
            .router_mut()
            .handler_mut(mid)
            .and_then(|h| h.as_any_mut().downcast_mut::<MountHandler>())
            .ok_or_else(|| MpyError::Params(format!("'{device_path}' has no reconfigurable handler")))?;
        handler.add_submount(prefix, backing, read_only);
        Ok(())
    }

    /// Unmounts a previously-mounted device path.
    pub fn unmount(&mut self, device_path: &str) -> Result<(), MpyError> {
        let device_path = device_path.trim_end_matches('/');
        let index = self
            .mounts
            .iter()
            .position(|m| m.device_path == device_path)
            .ok_or_else(|| MpyError::Params(format!("'{device_path}' is not mounted")))?;
        let mount = self.mounts.remove(index);
        self.import_module("os")?;
        self.repl
            .exec(&format!("os.umount({})", transfer::py_str_literal(device_path)), EXEC_TIMEOUT)?;
        self.repl.router_mut().unregister_handler(mount.mid);
        Ok(())
    }

    /// Re-applies all currently-registered mounts after a device reset,
    /// e.g. in response to [`ReplEngine::take_remount_event`].
    pub fn remount_all(&mut self, chunk_size: usize) -> Result<(), MpyError> {
        for mount in &self.mounts {
            self.repl.exec(
                &helpers::MOUNT_AGENT_TEMPLATE
                    .replace("{chunk_size}", &chunk_size.to_string())
                    .replace("{mount_point}", &mount.device_path)
                    .replace("{mid}", &mount.mid.to_string()),
                EXEC_TIMEOUT,
            )?;
            self.repl.exec(&format!("_mt_mount_{}()", mount.mid), EXEC_TIMEOUT)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::EscapeRouter;
    use crate::transport::Transport;
    use std::collections::VecDeque;
    use std::io;

    struct NullTransport {
        inbound: VecDeque<Vec<u8>>,
    }

    impl Transport for NullTransport {
        fn has_data(&mut self, _timeout: Duration) -> io::Result<bool> {
            Ok(!self.inbound.is_empty())
        }
        fn read_available(&mut self) -> io::Result<Vec<u8>> {
            Ok(self.inbound.pop_front().unwrap_or_default())
        }
        fn write_raw(&mut self, data: &[u8]) -> io::Result<usize> {
            Ok(data.len())
        }
    }

    fn facade() -> Mpy<NullTransport> {
        let transport = NullTransport {
            inbound: VecDeque::new(),
        };
        Mpy::new(ReplEngine::new(EscapeRouter::new(transport)))
    }

    #[test]
    fn nested_mount_is_rejected() {
        let mut mpy = facade();
        mpy.mounts.push(Mount {
            mid: 1,
            device_path: "/remote".to_string(),
        });
        let handler = MountHandler::new(std::env::temp_dir());
        let err = mpy.mount("/remote/nested", 1024, handler).unwrap_err();
        assert!(matches!(err, MpyError::Params(_)));
    }

    #[test]
    fn sibling_mount_points_are_accepted() {
        let mut mpy = facade();
        mpy.mounts.push(Mount {
            mid: 1,
            device_path: "/remote".to_string(),
        });
        for existing in &mpy.mounts {
            assert_ne!(existing.device_path, "/other");
        }
    }

    #[test]
    fn parses_a_tree_with_nested_directories_and_files() {
        let value = Value::parse(
            "('/lib', 16, [('pkg', 16, [('a.py', 16, None)]), ('root.py', 0, None)])",
        )
        .unwrap();
        let root = parse_tree_node(value).unwrap();
        match root {
            TreeNode::Dir { name, size, children } => {
                assert_eq!(name, "/lib");
                assert_eq!(size, 16);
                assert_eq!(children.len(), 2);
                match &children[0] {
                    TreeNode::Dir { name, children, .. } => {
                        assert_eq!(name, "pkg");
                        assert_eq!(children.len(), 1);
                    }
                    _ => panic!("expected a directory"),
                }
                match &children[1] {
                    TreeNode::File { name, size } => {
                        assert_eq!(name, "root.py");
                        assert_eq!(*size, 0);
                    }
                    _ => panic!("expected a file"),
                }
            }
            _ => panic!("expected a directory"),
        }
    }
}
