use std::path::PathBuf;

use mpylink::vfs::MountHandler;

use crate::{args::CommonArgs, client::Client, errors::CliError, formatting::structured_print};

const DEFAULT_CHUNK_SIZE: usize = 512;

#[derive(Debug, clap::Subcommand)]
pub enum MountCommand {
    /// Mounts a host directory at a device path
    Add {
        /// The device-absolute mount point
        device_path: String,
        /// The host directory to expose
        backing: PathBuf,
        /// Reject writes under this mount
        #[arg(long)]
        read_only: bool,
        /// Bytes transferred per VFS read/write round-trip
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// Overlays an additional host directory at a sub-path of an
    /// already-mounted device path
    Submount {
        /// An already-mounted device path
        device_path: String,
        /// The device-side prefix, relative to `device_path`
        prefix: String,
        /// The host directory or file to expose at `prefix`
        backing: PathBuf,
        /// Reject writes under this submount
        #[arg(long)]
        read_only: bool,
    },
    /// Unmounts a previously-mounted device path
    Remove {
        /// The device-absolute mount point
        device_path: String,
    },
    /// Lists currently-mounted device paths
    List,
}

pub fn run(client: &mut Client, args: CommonArgs, command: MountCommand) -> Result<(), CliError> {
    let client = client.get_mut()?;
    match command {
        MountCommand::Add {
            device_path,
            backing,
            read_only,
            chunk_size,
        } => {
            let handler = MountHandler::new(backing).read_only(read_only);
            client.mount(&device_path, chunk_size, handler)?;
        }
        MountCommand::Submount {
            device_path,
            prefix,
            backing,
            read_only,
        } => {
            client.add_submount(&device_path, prefix, backing, read_only)?;
        }
        MountCommand::Remove { device_path } => client.unmount(&device_path)?,
        MountCommand::List => {
            let mounts = client.list_mounts();
            structured_print(None, args.json, |s| {
                s.unaligned();
                for (i, path) in mounts.iter().enumerate() {
                    s.key_value(i.to_string(), path.clone());
                }
            })?;
        }
    }
    Ok(())
}
