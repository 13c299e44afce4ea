/*
 Copyright (c) 2023 clone206

 This file is part of srdoubler

 srdoubler is free software: you can redistribute it and/or modify it
 under the terms of the GNU General Public License as published by the
 Free Software Foundation, either version 3 of the License, or
 (at your option) any later version.

 srdoubler is distributed in the hope that it will be useful, but
 WITHOUT ANY WARRANTY; without even the implied warranty of
 MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 GNU General Public License for more details.
 You should have received a copy of the GNU General Public License
 along with srdoubler. If not, see <https://www.gnu.org/licenses/>.
*/

use std::error::Error;
use std::f64::consts::TAU;
use std::time::Instant;

use clap::Parser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use log::{debug, info};
use srdoubler::{
    ColorLogger, DEFAULT_ALPHA, DEFAULT_TABLE_WIDTH, DoublerError, FilterTable, SampleFrame,
    TermResult, Upsampler,
};

/// Largest absolute error accepted between the upsampled and the directly
/// generated sine (about -140 dBFS).
const MAX_ABS_ERROR: f64 = 10E-7;

/// Largest relative difference accepted between a fresh and a cached table.
const MAX_TABLE_REL_ERROR: f64 = 10E-8;

#[derive(Parser, Debug)]
#[command(
    name = "sine_check",
    about = "Upsample a generated sine wave and verify it against one generated at twice the rate",
    version
)]
struct Cli {
    /// Sine frequency in Hz
    #[arg(short = 'f', long = "freq", default_value = "441")]
    frequency: f64,

    /// Input sample rate in Hz
    #[arg(short = 'r', long = "rate", default_value = "44100")]
    sample_rate: u32,

    /// Length of the generated signal in seconds. The first and last
    /// second are excluded from the comparison.
    #[arg(short = 's', long = "seconds", default_value = "10")]
    seconds: usize,

    /// Kaiser window shape factor
    #[arg(short = 'a', long = "alpha", default_value_t = DEFAULT_ALPHA)]
    alpha: f64,

    /// Number of filter taps. Must be even.
    #[arg(short = 'w', long = "width", default_value_t = DEFAULT_TABLE_WIDTH)]
    width: usize,

    /// Print diagnostic messages
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> TermResult {
    match run() {
        Ok(()) => TermResult(Ok(())),
        Err(e) => TermResult(Err(e.into())),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let logger = ColorLogger::new(false, cli.verbose);
    let multi = MultiProgress::new();
    LogWrapper::new(multi.clone(), logger).try_init()?;
    log::set_max_level(logger.max_level());

    if cli.seconds < 3 {
        return Err(DoublerError::InvalidParameter(
            "need at least 3 seconds of signal to compare".to_string(),
        )
        .into());
    }

    let table = FilterTable::new(cli.alpha, cli.width)?;
    info!("Built {}-tap filter table (alpha {})", table.width(), table.alpha());

    if let Some(i) = table.iter().position(|&c| c == 0.0) {
        return Err(DoublerError::Message(format!("filter coefficient {} is zero", i)).into());
    }
    info!("No zero coefficients");

    let cached = FilterTable::shared(cli.alpha, cli.width)?;
    for (i, (&fresh, &memo)) in table.iter().zip(cached.iter()).enumerate() {
        if ((fresh - memo) / fresh).abs() > MAX_TABLE_REL_ERROR {
            return Err(DoublerError::Message(format!(
                "cached table differs at tap {}: {} vs {}",
                i, memo, fresh
            ))
            .into());
        }
    }
    info!("Cached and freshly built tables match");

    let rate = f64::from(cli.sample_rate);
    let input_len = cli.sample_rate as usize * cli.seconds;
    let step = TAU * cli.frequency / rate;
    let input: Vec<SampleFrame<1>> = (0..input_len)
        .map(|i| SampleFrame::new([(step * i as f64).sin()]))
        .collect();
    debug!(
        "Generated {} Hz sine: {} frames at {} Hz",
        cli.frequency, input_len, cli.sample_rate
    );

    let upsampler = Upsampler::new(&input, &table);
    info!("About to start upsampling...");
    let start = Instant::now();
    let upsampled = upsampler.run();
    info!("Upsampling took {} ms", start.elapsed().as_millis());

    let half_step = step / 2.0;
    let first = 2 * cli.sample_rate as usize;
    let last = upsampled.len() - first;
    let mut worst = 0.0f64;
    for (i, frame) in upsampled.iter().enumerate().take(last).skip(first) {
        let expected = (half_step * i as f64).sin();
        let err = (frame[0] - expected).abs();
        worst = worst.max(err);
        if err > MAX_ABS_ERROR {
            return Err(DoublerError::Message(format!(
                "Upsampling isn't accurate: output {} is off by {:e}",
                i, err
            ))
            .into());
        }
    }
    debug!("Largest error over {} compared samples: {:e}", last - first, worst);
    info!("Upsampling accuracy confirmed");

    Ok(())
}
