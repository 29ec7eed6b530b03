#![forbid(unsafe_code)]

mod args;
mod client;
mod errors;
mod file_read_write;
mod formatting;
mod groups;
mod progress;
mod terminal;

use std::time::Duration;

use clap::Parser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use miette::IntoDiagnostic;
use mpylink::Mpy;
use mpylink::repl::ReplEngine;
use mpylink::router::EscapeRouter;
use mpylink::transport::{SerialTransport, TcpTransport, Transport};

use crate::errors::CliError;

fn main() -> miette::Result<()> {
    let logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).build();
    let multiprogress = MultiProgress::new();
    LogWrapper::new(multiprogress.clone(), logger)
        .try_init()
        .into_diagnostic()?;

    let args = args::App::parse();

    let mut client = client::Client::default();
    if let Some(mpy) = connect(&args).into_diagnostic()? {
        client = client::Client::new(mpy);
    }

    if let Err(err) = groups::run(&mut client, &multiprogress, args.common, args.group) {
        if let Some(hint) = errors::device_os_error_hint(&err) {
            log::error!("{hint}");
        }
        return Err(err).into_diagnostic();
    }

    Ok(())
}

fn connect(args: &args::App) -> Result<Option<Mpy<Box<dyn Transport>>>, CliError> {
    let timeout = Duration::from_millis(args.timeout);

    let transport: Box<dyn Transport> = if let Some(address) = &args.tcp {
        Box::new(TcpTransport::connect(address, timeout)?)
    } else if let Some(port) = &args.serial {
        Box::new(SerialTransport::open(port, args.baud)?)
    } else {
        match autodetect_serial_port()? {
            Some(port) => {
                log::info!("autodetected serial port: {port}");
                Box::new(SerialTransport::open(&port, args.baud)?)
            }
            None => return Ok(None),
        }
    };

    let router = EscapeRouter::new(transport);
    Ok(Some(Mpy::new(ReplEngine::new(router))))
}

/// Scans available serial ports for likely MicroPython boards (USB CDC
/// devices), erroring out if more than one candidate is found rather than
/// guessing.
fn autodetect_serial_port() -> Result<Option<String>, CliError> {
    let candidates: Vec<String> = serialport::available_ports()
        .unwrap_or_default()
        .into_iter()
        .filter(|port| matches!(port.port_type, serialport::SerialPortType::UsbPort(_)))
        .map(|port| port.port_name)
        .collect();

    match candidates.len() {
        0 => Ok(None),
        1 => Ok(Some(candidates.into_iter().next().unwrap())),
        _ => Err(CliError::AmbiguousAutodetect(candidates)),
    }
}
