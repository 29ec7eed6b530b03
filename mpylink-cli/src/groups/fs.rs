use indicatif::MultiProgress;
use mpylink::client::{MpyError, Stat, TreeNode};

use crate::{
    args::CommonArgs,
    client::Client,
    errors::CliError,
    file_read_write::{read_input_file, write_output_file},
    formatting::structured_print,
    progress::with_progress_bar,
};

#[derive(Debug, clap::Subcommand)]
pub enum FsCommand {
    /// Lists one directory's immediate entries
    Ls {
        /// The directory to list
        #[arg(default_value = "/")]
        path: String,
    },
    /// Reports whether a path is a file, a directory, or missing
    Stat {
        /// The path to inspect
        path: String,
    },
    /// Recursively lists a directory's contents
    Tree {
        /// The directory to walk
        #[arg(default_value = "/")]
        path: String,
    },
    /// Creates a directory, and any missing parents
    Mkdir {
        /// The directory to create
        path: String,
    },
    /// Deletes a file or directory
    Rm {
        /// The path to delete
        path: String,
        /// Recurse into non-empty directories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Downloads a file from the device
    Get {
        /// The file path on the device
        remote: String,
        /// The target path. '-' for stdout
        local: String,
    },
    /// Uploads a file to the device
    Put {
        /// The file to copy. '-' for stdin
        local: String,
        /// The target path on the device
        remote: String,
    },
    /// Computes the SHA-256 digest of a file
    Hashfile {
        /// The path of the file on the device
        path: String,
    },
    /// Renames or moves a file or directory
    Rename {
        /// Current path
        from: String,
        /// New path
        to: String,
    },
}

fn print_tree(node: &TreeNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        TreeNode::File { name, size } => println!("{indent}{name}  ({size} bytes)"),
        TreeNode::Dir { name, children, .. } => {
            println!("{indent}{name}/");
            for child in children {
                print_tree(child, depth + 1);
            }
        }
    }
}

pub fn run(
    client: &mut Client,
    multiprogress: &MultiProgress,
    args: CommonArgs,
    command: FsCommand,
) -> Result<(), CliError> {
    let client = client.get_mut()?;
    match command {
        FsCommand::Ls { path } => {
            let mut entries = client.ls(&path)?;
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            if args.json {
                structured_print(None, true, |s| {
                    for (name, is_dir) in entries {
                        s.key_value(name, if is_dir { "dir" } else { "file" });
                    }
                })?;
            } else {
                for (name, is_dir) in entries {
                    println!("{}{}", name, if is_dir { "/" } else { "" });
                }
            }
        }
        FsCommand::Stat { path } => match client.stat(&path)? {
            None => return Err(CliError::Mpy(MpyError::PathNotFound(path))),
            Some(Stat::Dir) => {
                structured_print(Some(path), args.json, |s| s.key_value("type", "dir"))?;
            }
            Some(Stat::File(size)) => {
                structured_print(Some(path), args.json, |s| {
                    s.key_value("type", "file");
                    s.key_value("size", size);
                })?;
            }
        },
        FsCommand::Tree { path } => {
            let root = client.tree(&path)?;
            print_tree(&root, 0);
        }
        FsCommand::Mkdir { path } => client.mkdir(&path)?,
        FsCommand::Rm { path, recursive } => client.delete(&path, recursive)?,
        FsCommand::Get { remote, local } => {
            let data = with_progress_bar(multiprogress, !args.quiet, Some(&remote), |progress| {
                match progress {
                    Some(cb) => {
                        let mut adapter = |current: u64, total: u64| {
                            cb(current, total);
                        };
                        client.get_with_progress(&remote, Some(&mut adapter))
                    }
                    None => client.get_with_progress(&remote, None),
                }
            })?;
            write_output_file(&local, &data)?;
        }
        FsCommand::Put { local, remote } => {
            let data = read_input_file(&local)?;
            let transferred = with_progress_bar(multiprogress, !args.quiet, Some(&remote), |progress| {
                match progress {
                    Some(cb) => {
                        let mut adapter = |current: u64, total: u64| {
                            cb(current, total);
                        };
                        client.put_with_progress(&remote, &data, Some(&mut adapter))
                    }
                    None => client.put_with_progress(&remote, &data, None),
                }
            })?;
            if args.verbose && !transferred {
                println!("unchanged, skipped transfer");
            }
        }
        FsCommand::Hashfile { path } => match client.hashfile(&path)? {
            Some(hash) => println!("{hash}  {path}"),
            None => return Err(CliError::Mpy(MpyError::FileNotFound(path))),
        },
        FsCommand::Rename { from, to } => client.rename(&from, &to)?,
    }
    Ok(())
}
