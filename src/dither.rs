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

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::{DoublerError, DoublerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DitherType {
    /// Triangular PDF
    Tpdf,
    /// Rectangular PDF
    Rectangular,
    None,
}

impl DitherType {
    /// Parse the single-letter command line form: T, R or X.
    pub fn from_flag(flag: char) -> DoublerResult<Self> {
        match flag.to_ascii_lowercase() {
            't' => Ok(DitherType::Tpdf),
            'r' => Ok(DitherType::Rectangular),
            'x' => Ok(DitherType::None),
            _ => Err(DoublerError::InvalidParameter(
                "Invalid dither type; must be T, R, or X".to_string(),
            )),
        }
    }
}

/// Dither applied to samples already scaled so that 1.0 is one LSB of the
/// target integer format.
#[derive(Clone)]
pub struct Dither {
    dither_type: DitherType,
    rng: StdRng,
}

impl Dither {
    pub fn new(dither_type: DitherType) -> Self {
        Self {
            dither_type,
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible noise sequence, for tests and comparisons.
    pub fn with_seed(dither_type: DitherType, seed: u64) -> Self {
        Self {
            dither_type,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn dither_type(&self) -> DitherType {
        self.dither_type
    }

    pub fn process_samp(&mut self, sample: &mut f64) {
        match self.dither_type {
            DitherType::Tpdf => *sample += self.process_tpdf(),
            DitherType::Rectangular => *sample += self.process_rpdf(),
            DitherType::None => (),
        }
    }

    fn process_tpdf(&mut self) -> f64 {
        // 1 LSB peak-to-peak, triangular distribution over [-0.5, 0.5]
        let r1 = self.rng.r#gen::<f64>();
        let r2 = self.rng.r#gen::<f64>();
        (r1 - r2) * 0.5
    }

    fn process_rpdf(&mut self) -> f64 {
        self.rng.r#gen::<f64>() - 0.5
    }
}
