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

//! Sample rate doubling with a Kaiser-windowed sinc interpolation filter.
//!
//! ```no_run
//! use srdoubler::{FilterTable, SampleFrame, Upsampler};
//!
//! let table = FilterTable::new(9.0, 3200)?;
//! let input = vec![SampleFrame::new([0.0, 0.0]); 1024];
//! let output = Upsampler::new(&input, &table).run();
//! assert_eq!(output.len(), 2048);
//! # Ok::<(), srdoubler::DoublerError>(())
//! ```

mod audio_file;
mod bessel;
mod color_logger;
mod dither;
mod filter_table;
mod frame;
mod kaiser;
mod model;
mod upsampler;

pub use audio_file::{AudioFile, AudioFileFormat, MAX_CHANNELS, WriteStats};
pub use bessel::{BESSEL_EPSILON, BESSEL_MAX_ITERATIONS, bessel_i0};
pub use color_logger::ColorLogger;
pub use dither::{Dither, DitherType};
pub use filter_table::{DEFAULT_ALPHA, DEFAULT_TABLE_WIDTH, FilterTable, sinc};
pub use frame::{SampleFrame, frames_from_interleaved, frames_to_interleaved};
pub use kaiser::{kaiser, kaiser_mapped};
pub use model::{DoublerError, DoublerResult, TermResult};
pub use upsampler::{ONE_HUNDRED_PERCENT, PROGRESS_BLOCK_FRAMES, ProgressUpdate, Upsampler};
