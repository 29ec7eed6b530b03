use mpylink::Mpy;
use mpylink::transport::Transport;

use crate::errors::CliError;

/// Optional-backend wrapper so argument parsing and backend construction
/// can happen before it's known whether a backend was actually selected.
#[derive(Default)]
pub struct Client(Option<Mpy<Box<dyn Transport>>>);

impl Client {
    pub fn new(mpy: Mpy<Box<dyn Transport>>) -> Self {
        Self(Some(mpy))
    }

    pub fn get(&self) -> Result<&Mpy<Box<dyn Transport>>, CliError> {
        self.0.as_ref().ok_or(CliError::NoBackendSelected)
    }

    pub fn get_mut(&mut self) -> Result<&mut Mpy<Box<dyn Transport>>, CliError> {
        self.0.as_mut().ok_or(CliError::NoBackendSelected)
    }
}
