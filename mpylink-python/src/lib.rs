#![forbid(unsafe_code)]

use std::sync::Mutex;
use std::time::Duration;

use miette::IntoDiagnostic;
use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use pyo3::types::PyBytes;
use pyo3_stub_gen::{
    define_stub_info_gatherer,
    derive::{gen_stub_pyclass, gen_stub_pymethods},
};

use mpylink::Mpy;
use mpylink::client::MpyError;
use mpylink::repl::ReplEngine;
use mpylink::router::EscapeRouter;
use mpylink::transport::{SerialTransport, TcpTransport, Transport};
use mpylink::vfs::MountHandler;

mod return_types;
pub use return_types::*;

type Backend = Mpy<Box<dyn Transport + Send>>;

/// A high level client for driving a MicroPython REPL over serial or TCP.
#[gen_stub_pyclass]
#[pyclass(frozen)]
struct MpyClient {
    // Mutex<Option<>> so we can release the transport in __exit__().
    client: Mutex<Option<Backend>>,
}

fn err_to_pyerr<E: Into<miette::Report>>(err: E) -> PyErr {
    let report: miette::Report = err.into();
    PyRuntimeError::new_err(format!("{report:?}"))
}

impl MpyClient {
    fn with_client<R>(&self, f: impl FnOnce(&mut Backend) -> Result<R, MpyError>) -> PyResult<R> {
        let mut guard = self.client.lock().unwrap();
        let client = guard
            .as_mut()
            .ok_or_else(|| PyRuntimeError::new_err("client already closed"))?;
        f(client).map_err(err_to_pyerr)
    }
}

#[gen_stub_pymethods]
#[pymethods]
impl MpyClient {
    /// Connects over a serial port.
    ///
    /// ### Arguments
    ///
    /// * `port` - The identifier of the serial device (Windows: `COMxx`, Linux: `/dev/ttyXX`).
    /// * `baud_rate` - The baud rate of the serial port.
    #[staticmethod]
    #[pyo3(signature = (port, baud_rate=115200))]
    fn serial(port: &str, baud_rate: u32) -> PyResult<Self> {
        let transport = SerialTransport::open(port, baud_rate)
            .into_diagnostic()
            .map_err(err_to_pyerr)?;
        Ok(Self::from_transport(Box::new(transport)))
    }

    /// Connects over TCP.
    ///
    /// ### Arguments
    ///
    /// * `address` - `host` or `host:port` (default port 23).
    /// * `connect_timeout_ms` - How long to wait while connecting.
    #[staticmethod]
    #[pyo3(signature = (address, connect_timeout_ms=3000))]
    fn tcp(address: &str, connect_timeout_ms: u64) -> PyResult<Self> {
        let transport = TcpTransport::connect(address, Duration::from_millis(connect_timeout_ms))
            .into_diagnostic()
            .map_err(err_to_pyerr)?;
        Ok(Self::from_transport(Box::new(transport)))
    }

    /// Runs code on the device for its side effects, returning anything
    /// written to stdout.
    fn exec<'py>(&self, py: Python<'py>, code: &str) -> PyResult<Bound<'py, PyBytes>> {
        let out = self.with_client(|client| client.exec(code))?;
        Ok(PyBytes::new(py, &out))
    }

    /// Evaluates an expression on the device, returning its `repr()`
    /// output as raw stdout bytes.
    fn exec_eval<'py>(&self, py: Python<'py>, expr: &str) -> PyResult<Bound<'py, PyBytes>> {
        let out = self.with_client(|client| client.exec_eval(expr))?;
        Ok(PyBytes::new(py, &out))
    }

    /// Uploads and runs a larger body of code through raw-paste mode.
    fn exec_raw_paste<'py>(&self, py: Python<'py>, code: &str) -> PyResult<Bound<'py, PyBytes>> {
        let out = self.with_client(|client| client.exec_raw_paste(code))?;
        Ok(PyBytes::new(py, &out))
    }

    /// Soft-resets the device's Python runtime (`Ctrl-D` at the REPL).
    fn soft_reset(&self) -> PyResult<()> {
        self.with_client(|client| client.soft_reset())
    }

    /// Reports whether `path` is a file, a directory, or doesn't exist.
    ///
    /// Returns `None` if the path doesn't exist, otherwise a [`PyStat`].
    fn stat(&self, path: &str) -> PyResult<Option<PyStat>> {
        self.with_client(|client| client.stat(path))
            .map(|stat| stat.map(PyStat::from))
    }

    /// Lists one directory's immediate entries as `(name, is_dir)` pairs.
    fn ls(&self, path: &str) -> PyResult<Vec<(String, bool)>> {
        self.with_client(|client| client.ls(path))
    }

    /// Recursively lists a directory's contents.
    fn tree<'py>(&self, py: Python<'py>, path: &str) -> PyResult<Py<PyTreeNode>> {
        let node = self.with_client(|client| client.tree(path))?;
        PyTreeNode::from_node(py, node)
    }

    /// Creates a directory, and any missing parents.
    fn mkdir(&self, path: &str) -> PyResult<()> {
        self.with_client(|client| client.mkdir(path))
    }

    /// Deletes a file or directory.
    #[pyo3(signature = (path, recursive=false))]
    fn delete(&self, path: &str, recursive: bool) -> PyResult<()> {
        self.with_client(|client| client.delete(path, recursive))
    }

    /// Renames or moves a file or directory.
    fn rename(&self, from: &str, to: &str) -> PyResult<()> {
        self.with_client(|client| client.rename(from, to))
    }

    /// Downloads a file from the device.
    ///
    /// ### Arguments
    ///
    /// * `path` - The file path on the device.
    /// * `progress` - A callable taking `(transmitted, total)`. Any
    ///   return value is ignored. An exception raised from it is
    ///   captured and re-raised once the transfer (which has no
    ///   mid-flight cancellation point) finishes.
    #[pyo3(signature = (path, progress=None))]
    fn get<'py>(
        &self,
        py: Python<'py>,
        path: &str,
        #[gen_stub(override_type(type_repr = "typing.Optional[collections.abc.Callable[[builtins.int, builtins.int], None]]", imports = ("builtins", "collections.abc", "typing")))]
        progress: Option<Bound<'py, PyAny>>,
    ) -> PyResult<Bound<'py, PyBytes>> {
        let mut cb_error = None;
        let data = self.with_client(|client| {
            if let Some(progress) = &progress {
                let mut cb = |current, total| {
                    if let Err(e) = progress.call((current, total), None) {
                        cb_error.get_or_insert(e);
                    }
                };
                client.get_with_progress(path, Some(&mut cb))
            } else {
                client.get_with_progress(path, None)
            }
        });
        if let Some(cb_error) = cb_error {
            return Err(cb_error);
        }
        Ok(PyBytes::new(py, &data?))
    }

    /// Uploads a file to the device, skipping the transfer if the
    /// remote content already matches. Returns whether data was
    /// actually transferred.
    #[pyo3(signature = (path, data, progress=None))]
    fn put<'py>(
        &self,
        path: &str,
        data: &Bound<'py, PyBytes>,
        #[gen_stub(override_type(type_repr = "typing.Optional[collections.abc.Callable[[builtins.int, builtins.int], None]]", imports = ("builtins", "collections.abc", "typing")))]
        progress: Option<Bound<'py, PyAny>>,
    ) -> PyResult<bool> {
        let bytes: &[u8] = data.extract()?;
        let mut cb_error = None;
        let result = self.with_client(|client| {
            if let Some(progress) = &progress {
                let mut cb = |current, total| {
                    if let Err(e) = progress.call((current, total), None) {
                        cb_error.get_or_insert(e);
                    }
                };
                client.put_with_progress(path, bytes, Some(&mut cb))
            } else {
                client.put_with_progress(path, bytes, None)
            }
        });
        if let Some(cb_error) = cb_error {
            return Err(cb_error);
        }
        result
    }

    /// Computes the SHA-256 digest of a remote file as a hex string, or
    /// `None` if it doesn't exist.
    fn hashfile(&self, path: &str) -> PyResult<Option<String>> {
        self.with_client(|client| client.hashfile(path))
    }

    /// Batched existence/size/hash lookup: `paths` is a list of
    /// `(path, previous_hash_or_0)` pairs. Returns, per path, `None` if
    /// missing or `(size, hash)` if present.
    fn fileinfo(&self, paths: Vec<(String, u64)>) -> PyResult<Vec<Option<(u64, String)>>> {
        self.with_client(|client| client.fileinfo(&paths))
    }

    /// Changes the device's current working directory.
    fn chdir(&self, path: &str) -> PyResult<()> {
        self.with_client(|client| client.chdir(path))
    }

    /// Returns the device's current working directory.
    fn getcwd(&self) -> PyResult<String> {
        self.with_client(|client| client.getcwd())
    }

    /// Returns `sys.path` as a list of strings.
    fn get_sys_path(&self) -> PyResult<Vec<String>> {
        self.with_client(|client| client.sys_path_get())
    }

    /// Replaces `sys.path` wholesale.
    fn set_sys_path(&self, entries: Vec<String>) -> PyResult<()> {
        self.with_client(|client| client.sys_path_set(&entries))
    }

    /// Prepends a directory to `sys.path`.
    fn prepend_sys_path(&self, path: &str) -> PyResult<()> {
        self.with_client(|client| client.sys_path_prepend(path))
    }

    /// Appends a directory to `sys.path`.
    fn append_sys_path(&self, path: &str) -> PyResult<()> {
        self.with_client(|client| client.sys_path_append(path))
    }

    /// Removes a directory from `sys.path`.
    fn remove_from_sys_path(&self, path: &str) -> PyResult<()> {
        self.with_client(|client| client.sys_path_remove(path))
    }

    /// Returns `sys.platform`.
    fn platform(&self) -> PyResult<String> {
        self.with_client(|client| client.platform())
    }

    /// Mounts a host directory at a device-absolute path.
    #[pyo3(signature = (device_path, backing, read_only=false, chunk_size=512))]
    fn mount(
        &self,
        device_path: &str,
        backing: std::path::PathBuf,
        read_only: bool,
        chunk_size: usize,
    ) -> PyResult<()> {
        let handler = MountHandler::new(backing).read_only(read_only);
        self.with_client(|client| client.mount(device_path, chunk_size, handler))
    }

    /// Adds a sub-mount overlay to an already-mounted device path.
    #[pyo3(signature = (device_path, prefix, backing, read_only=false))]
    fn add_submount(
        &self,
        device_path: &str,
        prefix: &str,
        backing: std::path::PathBuf,
        read_only: bool,
    ) -> PyResult<()> {
        self.with_client(|client| client.add_submount(device_path, prefix, backing, read_only))
    }

    /// Unmounts a previously mounted device path.
    fn unmount(&self, device_path: &str) -> PyResult<()> {
        self.with_client(|client| client.unmount(device_path))
    }

    /// Lists currently mounted device paths.
    fn list_mounts(&self) -> PyResult<Vec<String>> {
        self.with_client(|client| Ok(client.list_mounts()))
    }

    fn __enter__(slf: PyRef<Self>) -> PyResult<PyRef<Self>> {
        Ok(slf)
    }

    /// Closes the connection.
    fn __exit__(
        &self,
        _exc_type: Py<PyAny>,
        _exc_value: Py<PyAny>,
        _traceback: Py<PyAny>,
    ) -> PyResult<bool> {
        self.client.lock().unwrap().take();
        Ok(false)
    }
}

impl MpyClient {
    fn from_transport(transport: Box<dyn Transport + Send>) -> Self {
        let router = EscapeRouter::new(transport);
        let client = Mpy::new(ReplEngine::new(router));
        Self {
            client: Mutex::new(Some(client)),
        }
    }
}

/// ### Example
///
/// ```python
/// from mpylink_python import MpyClient
///
/// with MpyClient.serial("/dev/ttyACM0") as client:
///     print(client.platform())
/// ```
#[pymodule]
mod mpylink_python {
    use pyo3::prelude::*;

    #[pymodule_export]
    use super::MpyClient;
    #[pymodule_export]
    use super::return_types::PyStat;
    #[pymodule_export]
    use super::return_types::PyTreeNode;

    #[pymodule_init]
    fn init(_m: &Bound<'_, PyModule>) -> PyResult<()> {
        pyo3_log::init();
        Ok(())
    }
}

define_stub_info_gatherer!(stub_info);
