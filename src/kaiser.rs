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

use crate::bessel::bessel_i0;
use crate::model::{DoublerError, DoublerResult};

/// Kaiser window falling from 1 at `x = 0` to 0 at `x = 1`.
///
/// Outside `[0, 1)` the window saturates: 1 before the start, 0 from the
/// end onwards. This keeps mapped evaluations at the extreme table indices
/// well defined.
pub fn kaiser(x: f64, alpha: f64) -> DoublerResult<f64> {
    if x < 0.0 {
        Ok(1.0)
    } else if x >= 1.0 {
        Ok(0.0)
    } else {
        Ok(bessel_i0(alpha * (1.0 - x * x).sqrt())? / bessel_i0(alpha)?)
    }
}

/// Kaiser window stretched so it falls from 1 to 0 while `x` goes from `n0`
/// to `n1`.
pub fn kaiser_mapped(x: f64, alpha: f64, n0: usize, n1: usize) -> DoublerResult<f64> {
    if n0 == n1 {
        return Err(DoublerError::InvalidParameter(format!(
            "kaiser range is empty (n0 = n1 = {})",
            n0
        )));
    }
    let (n0, n1) = (n0 as f64, n1 as f64);
    kaiser((x - n0) / (n1 - n0), alpha)
}
