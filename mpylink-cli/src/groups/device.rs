use crate::{args::CommonArgs, client::Client, errors::CliError};

#[derive(Debug, clap::Subcommand)]
pub enum DeviceCommand {
    /// Pulses DTR/RTS to force a hardware reset
    Reset,
    /// Pulses DTR/RTS to reboot into the bootloader
    Bootloader,
}

pub fn run(client: &mut Client, _args: CommonArgs, command: DeviceCommand) -> Result<(), CliError> {
    let client = client.get_mut()?;
    let transport = client.repl_mut().router_mut().transport_mut();
    match command {
        DeviceCommand::Reset => transport.hard_reset().map_err(CliError::DeviceControlFailed)?,
        DeviceCommand::Bootloader => transport
            .reset_to_bootloader()
            .map_err(CliError::DeviceControlFailed)?,
    }
    Ok(())
}
