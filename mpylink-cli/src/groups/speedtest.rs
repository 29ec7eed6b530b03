use std::time::Instant;

use indicatif::MultiProgress;
use mpylink::transfer::{self, TransferProfile};

use crate::{args::CommonArgs, client::Client, errors::CliError, formatting::structured_print};

const SCRATCH_PATH: &str = "/_mpylink_speedtest.bin";

#[derive(Debug, clap::Args)]
pub struct SpeedtestArgs {
    /// Bytes transferred per trial
    #[arg(long, default_value_t = 32 * 1024)]
    size: usize,
    /// Chunk sizes to measure, in bytes
    #[arg(long, value_delimiter = ',', default_values_t = [256, 512, 1024, 2048, 4096])]
    chunk_sizes: Vec<usize>,
}

struct Trial {
    chunk_size: usize,
    label: &'static str,
    upload_bps: f64,
    download_bps: f64,
}

pub fn run(
    client: &mut Client,
    _multiprogress: &MultiProgress,
    args: CommonArgs,
    speedtest_args: SpeedtestArgs,
) -> Result<(), CliError> {
    let client = client.get_mut()?;
    let deflate_supported = TransferProfile::probe(client.repl_mut())
        .map(|p| p.deflate_supported)
        .unwrap_or(false);

    let payloads: &[(&str, fn(usize) -> Vec<u8>)] = &[
        ("text", |n| vec![b'A'; n]),
        ("zeros", |n| vec![0u8; n]),
        ("random", pseudo_random_bytes),
    ];

    let mut trials = Vec::new();
    for &chunk_size in &speedtest_args.chunk_sizes {
        let profile = TransferProfile {
            chunk_size,
            deflate_supported,
        };
        for &(label, make) in payloads {
            let data = make(speedtest_args.size);

            let start = Instant::now();
            transfer::put(client.repl_mut(), SCRATCH_PATH, &data, &profile, None)
                .map_err(mpylink::client::MpyError::from)?;
            let upload_secs = start.elapsed().as_secs_f64().max(f64::EPSILON);

            let start = Instant::now();
            let round_tripped = transfer::get(
                client.repl_mut(),
                SCRATCH_PATH,
                &profile,
                data.len() as u64,
                None,
            )
            .map_err(mpylink::client::MpyError::from)?;
            let download_secs = start.elapsed().as_secs_f64().max(f64::EPSILON);

            if round_tripped != data {
                log::warn!("speedtest round-trip mismatch at chunk size {chunk_size} ({label})");
            }

            trials.push(Trial {
                chunk_size,
                label,
                upload_bps: data.len() as f64 / upload_secs,
                download_bps: data.len() as f64 / download_secs,
            });
        }
    }

    client.delete(SCRATCH_PATH, false).ok();

    structured_print(Some("Speedtest".to_string()), args.json, |s| {
        for trial in &trials {
            s.sublist(format!("{}b/{}", trial.chunk_size, trial.label), |s| {
                s.key_value("upload", format!("{:.1} KiB/s", trial.upload_bps / 1024.0));
                s.key_value("download", format!("{:.1} KiB/s", trial.download_bps / 1024.0));
            });
        }
    })?;

    Ok(())
}

fn pseudo_random_bytes(n: usize) -> Vec<u8> {
    let mut state: u32 = 0x2545F491;
    (0..n)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xff) as u8
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_requested_length() {
        assert_eq!(pseudo_random_bytes(0).len(), 0);
        assert_eq!(pseudo_random_bytes(37).len(), 37);
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(pseudo_random_bytes(64), pseudo_random_bytes(64));
    }

    #[test]
    fn is_not_a_constant_stream() {
        let bytes = pseudo_random_bytes(64);
        assert!(bytes.iter().any(|&b| b != bytes[0]));
    }
}
