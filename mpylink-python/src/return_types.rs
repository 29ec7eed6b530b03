use pyo3::prelude::*;
use pyo3_stub_gen::derive::gen_stub_pyclass;

use mpylink::client::{Stat, TreeNode};

/// Return value of `MpyClient.stat`.
#[gen_stub_pyclass]
#[pyclass(frozen)]
pub struct PyStat {
    /// `True` if this path is a directory.
    #[pyo3(get)]
    pub is_dir: bool,
    /// File size in bytes, or `None` for a directory.
    #[pyo3(get)]
    pub size: Option<u64>,
}

impl From<Stat> for PyStat {
    fn from(value: Stat) -> Self {
        match value {
            Stat::Dir => Self {
                is_dir: true,
                size: None,
            },
            Stat::File(size) => Self {
                is_dir: false,
                size: Some(size),
            },
        }
    }
}

/// One node of a recursive directory listing, as returned by
/// `MpyClient.tree`.
#[gen_stub_pyclass]
#[pyclass(frozen)]
pub struct PyTreeNode {
    /// The entry's name (not a full path).
    #[pyo3(get)]
    pub name: String,
    /// `True` if this node is a directory.
    #[pyo3(get)]
    pub is_dir: bool,
    /// File size in bytes. Directories report whatever their `os.stat`
    /// returned, which MicroPython filesystems generally leave at 0.
    #[pyo3(get)]
    pub size: u64,
    /// Child nodes, empty for files.
    #[pyo3(get)]
    pub children: Vec<Py<PyTreeNode>>,
}

impl PyTreeNode {
    pub(crate) fn from_node(py: Python<'_>, node: TreeNode) -> PyResult<Py<PyTreeNode>> {
        let value = match node {
            TreeNode::File { name, size } => Self {
                name,
                is_dir: false,
                size,
                children: Vec::new(),
            },
            TreeNode::Dir { name, size, children } => {
                let children = children
                    .into_iter()
                    .map(|child| Self::from_node(py, child))
                    .collect::<PyResult<Vec<_>>>()?;
                Self {
                    name,
                    is_dir: true,
                    size,
                    children,
                }
            }
        };
        Py::new(py, value)
    }
}
