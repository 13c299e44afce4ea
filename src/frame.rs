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

use std::ops::{AddAssign, Index, IndexMut, Mul};

use crate::model::{DoublerError, DoublerResult};

/// One sample instant across `N` channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleFrame<const N: usize>([f64; N]);

impl<const N: usize> SampleFrame<N> {
    pub const fn new(samples: [f64; N]) -> Self {
        Self(samples)
    }

    /// All channels at zero.
    pub const fn silence() -> Self {
        Self([0.0; N])
    }

    pub const fn channels(&self) -> usize {
        N
    }

    pub fn as_array(&self) -> &[f64; N] {
        &self.0
    }

    pub fn into_array(self) -> [f64; N] {
        self.0
    }

    /// Channel-wise `self += other`, returning `self` so calls can chain.
    pub fn accumulate(&mut self, other: &Self) -> &mut Self {
        *self += *other;
        self
    }
}

impl<const N: usize> Default for SampleFrame<N> {
    fn default() -> Self {
        Self::silence()
    }
}

impl<const N: usize> From<[f64; N]> for SampleFrame<N> {
    fn from(samples: [f64; N]) -> Self {
        Self(samples)
    }
}

impl<const N: usize> Mul<f64> for SampleFrame<N> {
    type Output = Self;

    #[inline]
    fn mul(self, factor: f64) -> Self {
        let mut out = self;
        for s in &mut out.0 {
            *s *= factor;
        }
        out
    }
}

impl<const N: usize> AddAssign for SampleFrame<N> {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        for (s, o) in self.0.iter_mut().zip(other.0) {
            *s += o;
        }
    }
}

impl<const N: usize> Index<usize> for SampleFrame<N> {
    type Output = f64;

    fn index(&self, channel: usize) -> &f64 {
        &self.0[channel]
    }
}

impl<const N: usize> IndexMut<usize> for SampleFrame<N> {
    fn index_mut(&mut self, channel: usize) -> &mut f64 {
        &mut self.0[channel]
    }
}

/// Group interleaved samples (`L R L R ...`) into frames of `N` channels.
pub fn frames_from_interleaved<const N: usize>(
    samples: &[f64],
) -> DoublerResult<Vec<SampleFrame<N>>> {
    if N == 0 {
        return Err(DoublerError::ChannelMismatch { expected: 1, found: 0 });
    }
    if samples.len() % N != 0 {
        return Err(DoublerError::Format(format!(
            "{} interleaved samples do not form whole {}-channel frames",
            samples.len(),
            N
        )));
    }
    Ok(samples
        .chunks_exact(N)
        .map(|chunk| {
            let mut frame = SampleFrame::silence();
            frame.0.copy_from_slice(chunk);
            frame
        })
        .collect())
}

pub fn frames_to_interleaved<const N: usize>(frames: &[SampleFrame<N>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(frames.len() * N);
    for frame in frames {
        out.extend_from_slice(&frame.0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_default() {
        assert_eq!(SampleFrame::<3>::default(), SampleFrame::new([0.0; 3]));
        assert_eq!(SampleFrame::<2>::silence().channels(), 2);
    }

    #[test]
    fn scalar_multiply_scales_every_channel() {
        let frame = SampleFrame::new([1.0, -2.0, 0.5]);
        let scaled = frame * 2.0;
        assert_eq!(scaled.into_array(), [2.0, -4.0, 1.0]);
        // original untouched
        assert_eq!(frame.into_array(), [1.0, -2.0, 0.5]);
    }

    #[test]
    fn accumulate_adds_channel_wise_and_chains() {
        let mut acc = SampleFrame::new([1.0, 1.0]);
        acc.accumulate(&SampleFrame::new([0.5, -3.0]))
            .accumulate(&SampleFrame::new([0.25, 0.0]));
        assert_eq!(acc.into_array(), [1.75, -2.0]);
    }

    #[test]
    fn add_assign_matches_accumulate() {
        let a = SampleFrame::new([0.1, 0.2]);
        let b = SampleFrame::new([0.3, 0.4]);
        let mut x = a;
        x += b;
        let mut y = a;
        y.accumulate(&b);
        assert_eq!(x, y);
    }

    #[test]
    fn index_by_channel() {
        let mut frame = SampleFrame::new([0.0, 0.0]);
        frame[1] = 0.75;
        assert_eq!(frame[0], 0.0);
        assert_eq!(frame[1], 0.75);
    }

    #[test]
    fn interleaved_conversion() {
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let frames = frames_from_interleaved::<2>(&samples).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].into_array(), [3.0, 4.0]);
        assert_eq!(frames_to_interleaved(&frames), samples.to_vec());
    }

    #[test]
    fn ragged_interleaved_data_is_rejected() {
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0];
        match frames_from_interleaved::<2>(&samples) {
            Err(DoublerError::Format(msg)) => assert!(msg.contains("2-channel"), "{}", msg),
            other => panic!("expected format error, got {:?}", other),
        }
    }
}
