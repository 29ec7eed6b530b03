//! Cross-compiles `.py` sources to frozen `.mpy` bytecode on write,
//! mirroring what a device-side `mpy_cross` invocation would produce,
//! so a host can push pre-compiled modules to flash-constrained targets.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use thiserror::Error;

/// Failure compiling or locating a cached `.mpy` artifact.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The `mpy-cross` binary could not be run at all.
    #[error("failed to launch mpy-cross: {0}")]
    Spawn(#[source] std::io::Error),
    /// `mpy-cross` ran but reported a compile error.
    #[error("mpy-cross failed: {stderr}")]
    Failed {
        /// Captured standard error text.
        stderr: String,
    },
    /// Filesystem error reading the source or cache.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Seam over `mpy-cross`, so callers (and tests) can substitute a fake
/// compiler without shelling out.
pub trait Compiler {
    /// Compiles `source` (the contents of a `.py` file) for `arch`,
    /// returning `.mpy` bytecode.
    fn compile(&self, source: &[u8], arch: Option<&str>) -> Result<Vec<u8>, CompileError>;
}

/// Architecture name mpy-cross expects for the `-march` flag, keyed by
/// the device-reported `sys.implementation._mpy` sub-version/arch word.
pub fn arch_name(arch_id: u16) -> Option<&'static str> {
    Some(match arch_id {
        1 => "x86",
        2 => "x64",
        3 => "armv6",
        4 => "armv6m",
        5 => "armv7m",
        6 => "armv7em",
        7 => "armv7emsp",
        8 => "armv7emdp",
        9 => "xtensa",
        10 => "xtensawin",
        _ => return None,
    })
}

/// Invokes a real `mpy-cross` binary found on `PATH` (or at an
/// overridden path).
pub struct MpyCross {
    binary: PathBuf,
}

impl MpyCross {
    /// Uses `mpy-cross` from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("mpy-cross"),
        }
    }

    /// Uses a specific `mpy-cross` binary path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            binary: path.into(),
        }
    }
}

impl Default for MpyCross {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler for MpyCross {
    fn compile(&self, source: &[u8], arch: Option<&str>) -> Result<Vec<u8>, CompileError> {
        let dir = std::env::temp_dir().join(format!("mpylink-{}", std::process::id()));
        fs::create_dir_all(&dir)?;
        let src_path = dir.join("module.py");
        let out_path = dir.join("module.mpy");
        fs::write(&src_path, source)?;

        let mut cmd = Command::new(&self.binary);
        if let Some(arch) = arch {
            cmd.arg("-march").arg(arch);
        }
        cmd.arg("-o").arg(&out_path).arg(&src_path);
        let output = cmd.output().map_err(CompileError::Spawn)?;
        if !output.status.success() {
            return Err(CompileError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        let bytes = fs::read(&out_path)?;
        let _ = fs::remove_dir_all(&dir);
        Ok(bytes)
    }
}

/// Cache directory convention for compiled modules:
/// `__pycache__/{stem}.mpy-{mpy_version}.{mpy_sub_version}[-{arch}].mpy`,
/// matching the layout MicroPython's own cross-compiler cache uses so a
/// device and a host agent can share one cache directory.
pub fn cache_path(source: &Path, mpy_version: u8, mpy_sub_version: u8, arch: Option<&str>) -> PathBuf {
    let parent = source.parent().unwrap_or_else(|| Path::new("."));
    let stem = source.file_stem().and_then(|s| s.to_str()).unwrap_or("module");
    let mut name = format!("{stem}.mpy-{mpy_version}.{mpy_sub_version}");
    if let Some(arch) = arch {
        name.push('-');
        name.push_str(arch);
    }
    name.push_str(".mpy");
    parent.join("__pycache__").join(name)
}

/// Returns cached bytecode for `source` if present and at least as
/// fresh as the source file's modification time.
pub fn cached(cache: &Path, source: &Path) -> Option<Vec<u8>> {
    let cache_meta = fs::metadata(cache).ok()?;
    let source_meta = fs::metadata(source).ok()?;
    let cache_mtime = cache_meta.modified().ok()?;
    let source_mtime = source_meta.modified().ok()?;
    if cache_mtime < source_mtime {
        return None;
    }
    fs::read(cache).ok()
}

/// Compiles `source_path` via `compiler`, storing the result at its
/// conventional cache path (creating `__pycache__` as needed) and
/// returning the bytecode. Reuses a fresh cache entry instead of
/// recompiling when one exists.
pub fn compile_cached(
    compiler: &dyn Compiler,
    source_path: &Path,
    mpy_version: u8,
    mpy_sub_version: u8,
    arch: Option<&str>,
) -> Result<Vec<u8>, CompileError> {
    let cache = cache_path(source_path, mpy_version, mpy_sub_version, arch);
    if let Some(bytes) = cached(&cache, source_path) {
        return Ok(bytes);
    }
    let source = fs::read(source_path)?;
    let bytes = compiler.compile(&source, arch)?;
    if let Some(parent) = cache.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&cache, &bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeCompiler;
    impl Compiler for FakeCompiler {
        fn compile(&self, source: &[u8], _arch: Option<&str>) -> Result<Vec<u8>, CompileError> {
            Ok([b"MPY".as_slice(), source].concat())
        }
    }

    #[test]
    fn arch_name_maps_known_ids() {
        assert_eq!(arch_name(10), Some("xtensawin"));
        assert_eq!(arch_name(0), None);
    }

    #[test]
    fn cache_path_follows_pycache_convention() {
        let path = cache_path(Path::new("/dev/lib/main.py"), 6, 3, Some("xtensawin"));
        assert_eq!(
            path,
            PathBuf::from("/dev/lib/__pycache__/main.mpy-6.3-xtensawin.mpy")
        );
    }

    #[test]
    fn compile_cached_writes_and_reuses_cache() {
        let dir = std::env::temp_dir().join(format!("mpylink-test-{}", std::process::id()));
        let _ = fs::create_dir_all(&dir);
        let src = dir.join("mod.py");
        fs::write(&src, b"print(1)").unwrap();
        let compiler = FakeCompiler;
        let first = compile_cached(&compiler, &src, 6, 3, None).unwrap();
        assert_eq!(first, b"MPYprint(1)");
        let cache = cache_path(&src, 6, 3, None);
        assert!(cache.exists());
        let _ = fs::remove_dir_all(&dir);
    }
}
