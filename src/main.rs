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

use clap::Parser;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use log::{debug, info, trace, warn};
use srdoubler::{
    AudioFile, AudioFileFormat, ColorLogger, DEFAULT_ALPHA, DEFAULT_TABLE_WIDTH, Dither,
    DitherType, DoublerError, FilterTable, ONE_HUNDRED_PERCENT, ProgressUpdate, TermResult,
    Upsampler, frames_from_interleaved, frames_to_interleaved,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::thread::available_parallelism;
use std::{error::Error, time::Instant};

static CANCEL_FLAG: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "srdoubler", version)]
struct Cli {
    /// Kaiser window shape factor. Higher values trade a wider
    /// transition band for lower stopband ripple.
    #[arg(short = 'a', long = "alpha", default_value_t = DEFAULT_ALPHA)]
    alpha: f64,

    /// Number of filter taps. Must be even.
    #[arg(short = 'w', long = "width", default_value_t = DEFAULT_TABLE_WIDTH)]
    width: usize,

    /// Output bit depth: 16, 24 (fixed integer), or 32 (float, WAV only)
    #[arg(short = 'b', long = "bitdepth", default_value = "24")]
    bit_depth: u16,

    /// Dither type: T (TPDF), R (rectangular), X (none)
    /// [default: X for 32 bit, T otherwise]
    #[arg(short = 'd', long = "dither")]
    dither_type: Option<char>,

    /// Output type: W (wave) or F (flac)
    /// [default: from the output file extension, else W]
    #[arg(short = 'o', long = "output")]
    output_type: Option<char>,

    /// Worker threads for the convolution [default: available cores]
    #[arg(short = 'j', long = "threads")]
    threads: Option<usize>,

    /// Print diagnostic messages
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Quiet mode: suppress all log output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Input WAV file
    #[arg(name = "INPUT")]
    input: PathBuf,

    /// Output file, written at twice the input sample rate
    #[arg(name = "OUTPUT")]
    output: PathBuf,
}

fn main() -> TermResult {
    match run() {
        Ok(()) => TermResult(Ok(())),
        Err(e) => TermResult(Err(e.into())),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let logger = ColorLogger::new(cli.quiet, cli.verbose);
    let multi = MultiProgress::new();
    if cli.quiet {
        multi.set_draw_target(ProgressDrawTarget::hidden());
    }
    LogWrapper::new(multi.clone(), logger).try_init()?;
    log::set_max_level(logger.max_level());

    let thread_count = cli
        .threads
        .unwrap_or_else(|| available_parallelism().map(|n| n.get()).unwrap_or(1))
        .max(1);

    // build_global can only be called once; ignore error if already set.
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build_global()
    {
        warn!(
            "Rayon pool initialization error ({} threads). Details: {:?}",
            thread_count, e
        );
    } else {
        trace!("Configured Rayon pool with {} threads", thread_count);
    }

    if ![16, 24, 32].contains(&cli.bit_depth) {
        return Err(DoublerError::InvalidParameter(format!(
            "Unsupported bit depth {}; must be 16, 24, or 32",
            cli.bit_depth
        ))
        .into());
    }

    let dither_type = DitherType::from_flag(
        cli.dither_type
            .unwrap_or(if cli.bit_depth == 32 { 'X' } else { 'T' }),
    )?;

    let format = match cli.output_type {
        Some(flag) => AudioFileFormat::from_flag(flag)?,
        None => AudioFileFormat::from_path(&cli.output).unwrap_or(AudioFileFormat::Wave),
    };
    if format == AudioFileFormat::Flac && cli.bit_depth == 32 {
        return Err(DoublerError::InvalidParameter(
            "FLAC output supports 16 or 24 bit only".to_string(),
        )
        .into());
    }

    let input = AudioFile::load(&cli.input)?;
    info!(
        "Read {} frames ({} channel(s), {} Hz) from {}",
        input.num_frames(),
        input.num_channels(),
        input.sample_rate(),
        cli.input.display()
    );

    let table = FilterTable::shared(cli.alpha, cli.width)?;
    debug!(
        "Filter: {} taps, alpha {}, latency {} input frames, DC gain {:.9}",
        table.width(),
        table.alpha(),
        table.half_width(),
        table.dc_gain()
    );

    let serial = serial_requested();
    if serial {
        debug!("SRDOUBLER_SERIAL set; upsampling on the calling thread");
    }

    let label = file_label(&cli.input);
    let samples = input.samples();
    let upsampled = match input.num_channels() {
        1 => upsample::<1>(samples, &table, serial, &multi, &label)?,
        2 => upsample::<2>(samples, &table, serial, &multi, &label)?,
        3 => upsample::<3>(samples, &table, serial, &multi, &label)?,
        4 => upsample::<4>(samples, &table, serial, &multi, &label)?,
        5 => upsample::<5>(samples, &table, serial, &multi, &label)?,
        6 => upsample::<6>(samples, &table, serial, &multi, &label)?,
        7 => upsample::<7>(samples, &table, serial, &multi, &label)?,
        8 => upsample::<8>(samples, &table, serial, &multi, &label)?,
        n => {
            return Err(DoublerError::ChannelMismatch {
                expected: srdoubler::MAX_CHANNELS,
                found: n,
            }
            .into());
        }
    };

    let output_rate = input
        .sample_rate()
        .checked_mul(2)
        .ok_or_else(|| DoublerError::Format("output sample rate overflows".to_string()))?;
    let output = AudioFile::from_interleaved(upsampled, input.num_channels(), output_rate)?;

    let mut dither = Dither::new(dither_type);
    let stats = output.save(&cli.output, format, cli.bit_depth, &mut dither)?;
    info!(
        "Wrote {} frames ({} bit, {} Hz) to {}",
        stats.frames,
        cli.bit_depth,
        output_rate,
        cli.output.display()
    );
    if stats.clipped > 0 {
        warn!("{} samples clipped", stats.clipped);
    }

    Ok(())
}

/// Upsample interleaved samples as `N`-channel frames, with a progress bar
/// unless the serial path was requested.
fn upsample<const N: usize>(
    samples: &[f64],
    table: &FilterTable,
    serial: bool,
    multi: &MultiProgress,
    label: &str,
) -> Result<Vec<f64>, Box<dyn Error>> {
    let frames = frames_from_interleaved::<N>(samples)?;
    let upsampler = Upsampler::new(&frames, table);

    let start = Instant::now();
    let output = if serial {
        upsampler.run()
    } else {
        let (sender, receiver) = mpsc::channel::<ProgressUpdate>();
        let style = ProgressStyle::with_template("{prefix} {bar:20.cyan/blue} {percent}{msg}")?;
        let pg = multi
            .add(ProgressBar::new(100))
            .with_style(style)
            .with_prefix(format!("{} {}", "[Upsampling]".bold(), label.bold()))
            .with_message("%");

        // Drive the bar from a lightweight OS thread while rayon does the work.
        let progress_handle = std::thread::spawn(move || {
            while let Ok(progress) = receiver.recv() {
                pg.set_position(progress.percent.floor() as u64);
                if progress.percent == ONE_HUNDRED_PERCENT {
                    pg.finish();
                    break;
                }
            }
        });

        let res = upsampler.run_with_progress(&CANCEL_FLAG, Some(sender));
        if let Err(e) = progress_handle.join() {
            return Err(format!("Progress thread panicked: {:?}", e).into());
        }
        res?
    };
    info!(
        "Upsampled {} frames in {} ms",
        upsampler.input_len(),
        start.elapsed().as_millis()
    );

    Ok(frames_to_interleaved(&output))
}

fn serial_requested() -> bool {
    std::env::var("SRDOUBLER_SERIAL")
        .map(|v| {
            let v = v.to_ascii_lowercase();
            v == "1" || v == "true" || v == "yes" || v == "on"
        })
        .unwrap_or(false)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
