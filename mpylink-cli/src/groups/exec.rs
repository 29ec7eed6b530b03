use crate::{args::CommonArgs, client::Client, errors::CliError};

#[derive(Debug, clap::Subcommand)]
pub enum ExecCommand {
    /// Runs code for its side effects and prints anything written to
    /// stdout
    Run {
        /// The code to run
        code: String,
    },
    /// Evaluates an expression and prints its `repr()`
    Eval {
        /// The expression to evaluate
        expr: String,
    },
    /// Runs code via raw-paste mode, falling back to plain raw submission
    /// when the device doesn't support it
    Paste {
        /// The code to run
        code: String,
    },
    /// Triggers a soft reset and reinstalls helper state on next use
    SoftReset,
}

pub fn run(client: &mut Client, args: CommonArgs, command: ExecCommand) -> Result<(), CliError> {
    let client = client.get_mut()?;
    match command {
        ExecCommand::Run { code } => {
            let out = client.exec(&code)?;
            print_stdout(&out, args.quiet);
        }
        ExecCommand::Eval { expr } => {
            let out = client.exec_eval(&expr)?;
            print_stdout(&out, args.quiet);
        }
        ExecCommand::Paste { code } => {
            let out = client.exec_raw_paste(&code)?;
            print_stdout(&out, args.quiet);
        }
        ExecCommand::SoftReset => client.soft_reset()?,
    }
    Ok(())
}

fn print_stdout(out: &[u8], quiet: bool) {
    if out.is_empty() && quiet {
        return;
    }
    print!("{}", String::from_utf8_lossy(out));
}
