use crate::{args::CommonArgs, client::Client, errors::CliError, formatting::structured_print};

#[derive(Debug, clap::Subcommand)]
pub enum SysCommand {
    /// Prints `sys.platform`
    Platform,
    /// Prints the current working directory
    Pwd,
    /// Changes the current working directory
    Cd {
        /// The path to change into
        path: String,
    },
    /// Prints `sys.path`
    PathList,
    /// Prepends an entry to `sys.path`
    PathPrepend {
        /// The path to prepend
        path: String,
    },
    /// Appends an entry to `sys.path`
    PathAppend {
        /// The path to append
        path: String,
    },
    /// Removes every occurrence of an entry from `sys.path`
    PathRemove {
        /// The path to remove
        path: String,
    },
}

pub fn run(client: &mut Client, args: CommonArgs, command: SysCommand) -> Result<(), CliError> {
    let client = client.get_mut()?;
    match command {
        SysCommand::Platform => println!("{}", client.platform()?),
        SysCommand::Pwd => println!("{}", client.getcwd()?),
        SysCommand::Cd { path } => client.chdir(&path)?,
        SysCommand::PathList => {
            let entries = client.sys_path_get()?;
            structured_print(None, args.json, |s| {
                s.unaligned();
                for (i, entry) in entries.iter().enumerate() {
                    s.key_value(i.to_string(), entry.clone());
                }
            })?;
        }
        SysCommand::PathPrepend { path } => client.sys_path_prepend(&path)?,
        SysCommand::PathAppend { path } => client.sys_path_append(&path)?,
        SysCommand::PathRemove { path } => client.sys_path_remove(&path)?,
    }
    Ok(())
}
