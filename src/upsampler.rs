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

// x2 sample rate conversion by direct-form FIR interpolation.
// Output alternates input frames with frames interpolated halfway
// between input i and input i+1. Input outside the slice reads as silence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use rayon::prelude::*;

use crate::filter_table::FilterTable;
use crate::frame::SampleFrame;
use crate::model::{DoublerError, DoublerResult};

pub const ONE_HUNDRED_PERCENT: f64 = 100.0;

/// Input frames converted between cancellation checks / progress reports.
pub const PROGRESS_BLOCK_FRAMES: usize = 16_384;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub percent: f64,
}

pub struct Upsampler<'a, const N: usize> {
    input: &'a [SampleFrame<N>],
    table: &'a FilterTable,
    half_width: isize,
}

impl<'a, const N: usize> Upsampler<'a, N> {
    pub fn new(input: &'a [SampleFrame<N>], table: &'a FilterTable) -> Self {
        Self {
            input,
            table,
            half_width: table.half_width() as isize,
        }
    }

    pub fn input_len(&self) -> usize {
        self.input.len()
    }

    /// Number of frames every run produces.
    pub fn output_len(&self) -> usize {
        2 * self.input.len()
    }

    /// Input frames past `i` that the frame interpolated after `i` depends on.
    pub fn latency(&self) -> usize {
        self.table.half_width()
    }

    pub fn table(&self) -> &FilterTable {
        self.table
    }

    /// Input frame at `index`, or silence outside the input.
    #[inline]
    pub fn input_frame(&self, index: isize) -> SampleFrame<N> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.input.get(i))
            .copied()
            .unwrap_or_default()
    }

    /// Frame halfway between input `index` and input `index + 1`.
    ///
    /// The table is laid over inputs `index + 1 - half_width ..
    /// index + 1 + half_width`. Taps that land outside the input would
    /// multiply silence, so only the overlapping span is summed, in the
    /// same tap order.
    pub fn interpolated_frame(&self, index: isize) -> SampleFrame<N> {
        let width = self.table.width() as isize;
        let len = self.input.len() as isize;
        let start = index.saturating_add(1).saturating_sub(self.half_width);

        let first = start.saturating_neg().clamp(0, width);
        let last = len.saturating_sub(start).clamp(0, width);

        let mut out = SampleFrame::silence();
        if first >= last {
            return out;
        }

        let taps = &self.table.coefficients()[first as usize..last as usize];
        let frames = &self.input[(start + first) as usize..(start + last) as usize];
        for (frame, &coeff) in frames.iter().zip(taps) {
            out += *frame * coeff;
        }
        out
    }

    #[inline]
    fn fill_pair(&self, index: usize, pair: &mut [SampleFrame<N>]) {
        pair[0] = self.input[index];
        pair[1] = self.interpolated_frame(index as isize);
    }

    /// Upsample the whole input on the calling thread.
    pub fn run(&self) -> Vec<SampleFrame<N>> {
        let mut output = Vec::with_capacity(self.output_len());
        for (i, frame) in self.input.iter().enumerate() {
            // alternate input and interpolated frames
            output.push(*frame);
            output.push(self.interpolated_frame(i as isize));
        }
        output
    }

    /// Upsample into a caller-provided buffer of exactly `output_len()` frames.
    pub fn run_into(&self, out: &mut [SampleFrame<N>]) -> DoublerResult<()> {
        self.check_output_len(out.len())?;
        for (i, pair) in out.chunks_exact_mut(2).enumerate() {
            self.fill_pair(i, pair);
        }
        Ok(())
    }

    /// Same output as [`run`](Self::run), computed on the rayon pool.
    pub fn run_parallel(&self) -> Vec<SampleFrame<N>> {
        let mut output = vec![SampleFrame::silence(); self.output_len()];
        output
            .par_chunks_mut(2)
            .enumerate()
            .for_each(|(i, pair)| self.fill_pair(i, pair));
        output
    }

    /// Parallel run in blocks of [`PROGRESS_BLOCK_FRAMES`] input frames.
    ///
    /// `cancel` is polled before every block. After each block the share of
    /// converted input is sent on `progress`; the last update is exactly
    /// [`ONE_HUNDRED_PERCENT`].
    pub fn run_with_progress(
        &self,
        cancel: &AtomicBool,
        progress: Option<Sender<ProgressUpdate>>,
    ) -> DoublerResult<Vec<SampleFrame<N>>> {
        let total = self.input.len();
        let mut output = vec![SampleFrame::silence(); self.output_len()];

        for (block_idx, block) in output
            .chunks_mut(2 * PROGRESS_BLOCK_FRAMES)
            .enumerate()
        {
            if cancel.load(Ordering::Relaxed) {
                return Err(DoublerError::Cancelled);
            }
            let base = block_idx * PROGRESS_BLOCK_FRAMES;
            block
                .par_chunks_mut(2)
                .enumerate()
                .for_each(|(k, pair)| self.fill_pair(base + k, pair));

            if let Some(sender) = &progress {
                let done = base + block.len() / 2;
                let percent = if done >= total {
                    ONE_HUNDRED_PERCENT
                } else {
                    done as f64 * ONE_HUNDRED_PERCENT / total as f64
                };
                // Receiver may have gone away; conversion result still stands
                let _ = sender.send(ProgressUpdate { percent });
            }
        }

        if total == 0
            && let Some(sender) = &progress
        {
            let _ = sender.send(ProgressUpdate {
                percent: ONE_HUNDRED_PERCENT,
            });
        }

        Ok(output)
    }

    fn check_output_len(&self, found: usize) -> DoublerResult<()> {
        let expected = self.output_len();
        if found != expected {
            return Err(DoublerError::OutputLength { expected, found });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn ramp<const N: usize>(len: usize) -> Vec<SampleFrame<N>> {
        (0..len)
            .map(|i| {
                let mut frame = SampleFrame::silence();
                for ch in 0..N {
                    frame[ch] = ((i * 7 + ch * 3) % 11) as f64 / 11.0 - 0.5;
                }
                frame
            })
            .collect()
    }

    // Zero-padded convolution over every tap, no range clipping.
    fn reference_interpolation<const N: usize>(
        up: &Upsampler<'_, N>,
        table: &FilterTable,
        index: isize,
    ) -> SampleFrame<N> {
        let mut out = SampleFrame::silence();
        let start = index + 1 - table.half_width() as isize;
        for (j, &coeff) in table.iter().enumerate() {
            out.accumulate(&(up.input_frame(start + j as isize) * coeff));
        }
        out
    }

    fn assert_bit_identical<const N: usize>(a: &[SampleFrame<N>], b: &[SampleFrame<N>]) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b).enumerate() {
            for ch in 0..N {
                assert_eq!(x[ch].to_bits(), y[ch].to_bits(), "frame {i} channel {ch}");
            }
        }
    }

    #[test]
    fn output_is_twice_input_length() {
        let table = FilterTable::new(9.0, 16).unwrap();
        for &len in &[0usize, 1, 2, 7, 16, 100] {
            let input = ramp::<2>(len);
            let up = Upsampler::new(&input, &table);
            assert_eq!(up.output_len(), 2 * len);
            assert_eq!(up.run().len(), 2 * len);
        }
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let table = FilterTable::new(9.0, 32).unwrap();
        let input: Vec<SampleFrame<1>> = Vec::new();
        let up = Upsampler::new(&input, &table);
        assert!(up.run().is_empty());
        assert!(up.run_parallel().is_empty());
        let mut out: Vec<SampleFrame<1>> = Vec::new();
        up.run_into(&mut out).unwrap();
    }

    #[test]
    fn even_positions_preserve_input() {
        let table = FilterTable::new(9.0, 32).unwrap();
        let input = ramp::<3>(57);
        let output = Upsampler::new(&input, &table).run();
        for (i, frame) in input.iter().enumerate() {
            assert_eq!(output[2 * i], *frame, "frame {i}");
        }
    }

    #[test]
    fn out_of_range_reads_are_silent() {
        let table = FilterTable::new(9.0, 8).unwrap();
        let input = ramp::<2>(5);
        let up = Upsampler::new(&input, &table);
        for &i in &[-1isize, -2, -1000, 5, 6, 1_000_000, isize::MIN, isize::MAX] {
            assert_eq!(up.input_frame(i), SampleFrame::silence(), "index {i}");
        }
        assert_eq!(up.input_frame(4), input[4]);
    }

    #[test]
    fn extreme_interpolation_indices_do_not_fault() {
        let table = FilterTable::new(9.0, 8).unwrap();
        let input = ramp::<2>(5);
        let up = Upsampler::new(&input, &table);
        assert_eq!(up.interpolated_frame(isize::MIN), SampleFrame::silence());
        assert_eq!(up.interpolated_frame(isize::MAX), SampleFrame::silence());
        assert_eq!(up.interpolated_frame(-100), SampleFrame::silence());
        assert_eq!(up.interpolated_frame(100), SampleFrame::silence());
    }

    #[test]
    fn interpolation_matches_zero_padded_convolution() {
        let table = FilterTable::new(9.0, 24).unwrap();
        for &len in &[3usize, 12, 24, 40] {
            let input = ramp::<2>(len);
            let up = Upsampler::new(&input, &table);
            for i in -30..(len as isize + 30) {
                assert_eq!(
                    up.interpolated_frame(i),
                    reference_interpolation(&up, &table, i),
                    "len {len} index {i}"
                );
            }
        }
    }

    #[test]
    fn impulse_traces_the_filter_table() {
        let table = FilterTable::new(9.0, 20).unwrap();
        let half = table.half_width();
        let pos = 30;
        let mut input = vec![SampleFrame::<1>::silence(); 60];
        input[pos] = SampleFrame::new([1.0]);
        let output = Upsampler::new(&input, &table).run();

        // frame after input i reads the impulse through tap pos - i - 1 + half
        for i in (pos - half)..=(pos + half - 1) {
            let tap = pos + half - i - 1;
            assert_eq!(output[2 * i + 1][0], table[tap], "input {i}");
        }
        // just outside the filter's reach
        assert_eq!(output[2 * (pos - half - 1) + 1][0], 0.0);
        assert_eq!(output[2 * (pos + half) + 1][0], 0.0);
    }

    #[test]
    fn channels_are_processed_independently() {
        let table = FilterTable::new(9.0, 32).unwrap();
        let input: Vec<SampleFrame<2>> = ramp::<1>(50)
            .into_iter()
            .map(|f| SampleFrame::new([f[0], 2.0 * f[0]]))
            .collect();
        let output = Upsampler::new(&input, &table).run();
        for frame in &output {
            assert_eq!(frame[1], 2.0 * frame[0]);
        }
    }

    #[test]
    fn run_is_deterministic() {
        let table = FilterTable::new(9.0, 64).unwrap();
        let input = ramp::<2>(300);
        let up = Upsampler::new(&input, &table);
        let first = up.run();
        let second = up.run();
        assert_bit_identical(&first, &second);
    }

    #[test]
    fn all_run_variants_agree() {
        let table = FilterTable::new(9.0, 64).unwrap();
        let input = ramp::<2>(333);
        let up = Upsampler::new(&input, &table);
        let serial = up.run();

        assert_bit_identical(&serial, &up.run_parallel());

        let mut buf = vec![SampleFrame::silence(); up.output_len()];
        up.run_into(&mut buf).unwrap();
        assert_bit_identical(&serial, &buf);

        let cancel = AtomicBool::new(false);
        let progressed = up.run_with_progress(&cancel, None).unwrap();
        assert_bit_identical(&serial, &progressed);
    }

    #[test]
    fn run_into_rejects_wrong_buffer_size() {
        let table = FilterTable::new(9.0, 8).unwrap();
        let input = ramp::<1>(10);
        let up = Upsampler::new(&input, &table);
        let mut short = vec![SampleFrame::silence(); 19];
        match up.run_into(&mut short) {
            Err(DoublerError::OutputLength { expected: 20, found: 19 }) => {}
            other => panic!("expected output length error, got {:?}", other),
        }
    }

    #[test]
    fn progress_ends_at_one_hundred_percent() {
        let table = FilterTable::new(9.0, 8).unwrap();
        let input = ramp::<1>(2 * PROGRESS_BLOCK_FRAMES + 5);
        let up = Upsampler::new(&input, &table);
        let (sender, receiver) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        up.run_with_progress(&cancel, Some(sender)).unwrap();

        let updates: Vec<f64> = receiver.iter().map(|u| u.percent).collect();
        assert_eq!(updates.len(), 3);
        assert!(updates.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*updates.last().unwrap(), ONE_HUNDRED_PERCENT);
    }

    #[test]
    fn progress_for_empty_input_reports_completion() {
        let table = FilterTable::new(9.0, 8).unwrap();
        let input: Vec<SampleFrame<2>> = Vec::new();
        let (sender, receiver) = mpsc::channel();
        let cancel = AtomicBool::new(false);
        let out = Upsampler::new(&input, &table)
            .run_with_progress(&cancel, Some(sender))
            .unwrap();
        assert!(out.is_empty());
        let updates: Vec<ProgressUpdate> = receiver.iter().collect();
        assert_eq!(updates, vec![ProgressUpdate { percent: ONE_HUNDRED_PERCENT }]);
    }

    #[test]
    fn cancelled_run_reports_cancellation() {
        let table = FilterTable::new(9.0, 8).unwrap();
        let input = ramp::<1>(100);
        let cancel = AtomicBool::new(true);
        assert!(matches!(
            Upsampler::new(&input, &table).run_with_progress(&cancel, None),
            Err(DoublerError::Cancelled)
        ));
    }

    #[test]
    fn interior_of_dc_input_follows_table_gain() {
        let table = FilterTable::new(9.0, 64).unwrap();
        let input = vec![SampleFrame::new([1.0]); 200];
        let output = Upsampler::new(&input, &table).run();
        let half = table.half_width();
        for i in half..(200 - half) {
            assert!((output[2 * i + 1][0] - table.dc_gain()).abs() < 1e-12);
        }
    }
}
