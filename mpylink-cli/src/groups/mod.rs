use indicatif::MultiProgress;

use crate::{args::CommonArgs, client::Client, errors::CliError};

mod device;
mod exec;
mod fs;
mod mount;
mod speedtest;
mod sys;
mod term;

#[derive(Debug, clap::Subcommand)]
pub enum Group {
    /// File management: stat, list, transfer, delete
    Fs {
        #[command(subcommand)]
        command: fs::FsCommand,
    },
    /// Runs code on the device directly
    Exec {
        #[command(subcommand)]
        command: exec::ExecCommand,
    },
    /// Mounts a host directory onto the device's filesystem
    Mount {
        #[command(subcommand)]
        command: mount::MountCommand,
    },
    /// `sys.path` and platform queries
    Sys {
        #[command(subcommand)]
        command: sys::SysCommand,
    },
    /// Device-level control: reset, reboot into bootloader
    Device {
        #[command(subcommand)]
        command: device::DeviceCommand,
    },
    /// Interactive terminal mirroring the device REPL
    Term,
    /// Measures sustained transfer throughput
    Speedtest(#[command(flatten)] speedtest::SpeedtestArgs),
}

pub fn run(
    client: &mut Client,
    multiprogress: &MultiProgress,
    args: CommonArgs,
    group: Group,
) -> Result<(), CliError> {
    match group {
        Group::Fs { command } => fs::run(client, multiprogress, args, command),
        Group::Exec { command } => exec::run(client, args, command),
        Group::Mount { command } => mount::run(client, args, command),
        Group::Sys { command } => sys::run(client, args, command),
        Group::Device { command } => device::run(client, args, command),
        Group::Term => term::run(client),
        Group::Speedtest(speedtest_args) => speedtest::run(client, multiprogress, args, speedtest_args),
    }
}
