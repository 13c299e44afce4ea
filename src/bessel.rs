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

// Zero-order modified Bessel function of the first kind, evaluated by its
// power series: I0(z) = sum_{k>=0} (z^2/4)^k / (k!)^2

use crate::model::{DoublerError, DoublerResult};

/// Absolute size below which a series term ends the summation.
pub const BESSEL_EPSILON: f64 = 1e-15;

/// Hard cap on series terms. Every argument whose I0 fits in an `f64`
/// (|z| up to about 713) converges in under 1000 terms.
pub const BESSEL_MAX_ITERATIONS: u32 = 10_000;

pub fn bessel_i0(z: f64) -> DoublerResult<f64> {
    let zz4 = z * z / 4.0;
    let mut k = 0.0f64;
    let mut term = 1.0f64;
    let mut sum = 1.0f64; // k = 0 term

    for iterations in 1..=BESSEL_MAX_ITERATIONS {
        k += 1.0;
        // (z^2/4)^k / (k!)^2 from its predecessor, so neither factor overflows
        term *= zz4 / (k * k);
        sum += term;
        if !sum.is_finite() {
            return Err(DoublerError::NumericInstability { z, iterations });
        }
        if term < BESSEL_EPSILON {
            return Ok(sum);
        }
    }

    Err(DoublerError::NumericInstability {
        z,
        iterations: BESSEL_MAX_ITERATIONS,
    })
}
