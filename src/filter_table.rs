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

// Kaiser-windowed sinc table for a half-band interpolation filter.
// The table has an EVEN number of taps (no center tap): the virtual center
// lies between two input samples, so every tap sits at a half-integer
// distance from it.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::ops::Index;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::kaiser::kaiser_mapped;
use crate::model::{DoublerError, DoublerResult};

/// Kaiser shape factor used by the command line tools.
pub const DEFAULT_ALPHA: f64 = 9.0;
/// Number of taps used by the command line tools.
pub const DEFAULT_TABLE_WIDTH: usize = 3200;

static SHARED_TABLES: Lazy<Mutex<HashMap<(u64, usize), Arc<FilterTable>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Normalized sinc: `sin(pi t) / (pi t)`, 1 at the origin.
pub fn sinc(t: f64) -> f64 {
    if t == 0.0 {
        1.0
    } else {
        (PI * t).sin() / (PI * t)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterTable {
    alpha: f64,
    coeffs: Box<[f64]>,
}

impl FilterTable {
    /// Build a `width`-tap table with Kaiser shape factor `alpha`.
    ///
    /// Tap `i` lies `dist + 0.5` samples from the center, where `dist`
    /// counts outwards from the two innermost taps. The window is mapped
    /// over `0..=half + 1` so the outermost tap keeps a nonzero weight.
    pub fn new(alpha: f64, width: usize) -> DoublerResult<Self> {
        if width % 2 != 0 {
            return Err(DoublerError::OddTableWidth(width));
        }
        if width == 0 {
            return Err(DoublerError::InvalidParameter(
                "filter table needs at least 2 taps".to_string(),
            ));
        }
        let half = width / 2;

        let coeffs = (0..width)
            .map(|i| {
                let dist = if i < half { half - i - 1 } else { i - half };
                let t = dist as f64 + 0.5;
                Ok(kaiser_mapped(t, alpha, 0, half + 1)? * sinc(t))
            })
            .collect::<DoublerResult<Vec<f64>>>()?;

        Ok(Self {
            alpha,
            coeffs: coeffs.into_boxed_slice(),
        })
    }

    /// Process-wide memoized table. Repeated calls with the same parameters
    /// return the same allocation.
    pub fn shared(alpha: f64, width: usize) -> DoublerResult<Arc<Self>> {
        let key = (alpha.to_bits(), width);
        let mut tables = SHARED_TABLES
            .lock()
            .map_err(|_| DoublerError::Message("filter table cache poisoned".to_string()))?;
        if let Some(table) = tables.get(&key) {
            return Ok(Arc::clone(table));
        }
        let table = Arc::new(Self::new(alpha, width)?);
        tables.insert(key, Arc::clone(&table));
        Ok(table)
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn width(&self) -> usize {
        self.coeffs.len()
    }

    pub fn half_width(&self) -> usize {
        self.coeffs.len() / 2
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.coeffs.iter()
    }

    /// Sum of all taps, i.e. the filter's gain at DC.
    pub fn dc_gain(&self) -> f64 {
        self.coeffs.iter().sum()
    }
}

impl Index<usize> for FilterTable {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.coeffs[index]
    }
}

impl<'a> IntoIterator for &'a FilterTable {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.coeffs.iter()
    }
}
