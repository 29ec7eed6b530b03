use crate::{client::Client, errors::CliError, terminal};

pub fn run(client: &mut Client) -> Result<(), CliError> {
    terminal::run(client.get_mut()?)
}
