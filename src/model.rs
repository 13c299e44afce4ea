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

use core::fmt;
use std::io;
use std::process::{ExitCode, Termination};

use log::error;

#[derive(Debug)]
pub enum DoublerError {
    /// A parameter outside the domain of the function it was passed to.
    InvalidParameter(String),
    /// Filter tables must have an even number of taps.
    OddTableWidth(usize),
    /// The Bessel series failed to converge.
    NumericInstability { z: f64, iterations: u32 },
    ChannelMismatch { expected: usize, found: usize },
    OutputLength { expected: usize, found: usize },
    Cancelled,
    /// Unsupported or malformed audio container.
    Format(String),
    Io(io::Error),
    Message(String),
}

impl fmt::Display for DoublerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoublerError::InvalidParameter(msg) => {
                write!(f, "Invalid parameter: {}", msg)
            }
            DoublerError::OddTableWidth(width) => write!(
                f,
                "Filter table width must be an even number (got {})",
                width
            ),
            DoublerError::NumericInstability { z, iterations } => write!(
                f,
                "Bessel I0({}) did not converge after {} terms",
                z, iterations
            ),
            DoublerError::ChannelMismatch { expected, found } => write!(
                f,
                "Channel mismatch: expected {} channel(s), found {}",
                expected, found
            ),
            DoublerError::OutputLength { expected, found } => write!(
                f,
                "Output buffer holds {} frames but {} are required",
                found, expected
            ),
            DoublerError::Cancelled => write!(f, "Upsampling cancelled"),
            DoublerError::Format(msg) => write!(f, "Audio format error: {}", msg),
            DoublerError::Io(err) => write!(f, "I/O error: {}", err),
            DoublerError::Message(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DoublerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DoublerError::Io(err) => Some(err),
            _ => None,
        }
    }
}

pub type DoublerResult<T> = Result<T, DoublerError>;

impl From<io::Error> for DoublerError {
    fn from(err: io::Error) -> Self {
        DoublerError::Io(err)
    }
}

impl From<hound::Error> for DoublerError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(err) => DoublerError::Io(err),
            other => DoublerError::Format(other.to_string()),
        }
    }
}

// Convert boxed dynamic errors into DoublerError
impl From<Box<dyn std::error::Error>> for DoublerError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        match err.downcast::<DoublerError>() {
            Ok(inner) => *inner,
            Err(other) => DoublerError::Message(other.to_string()),
        }
    }
}

pub struct TermResult(pub DoublerResult<()>);

impl Termination for TermResult {
    fn report(self) -> ExitCode {
        match self.0 {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                error!("{}", err);
                ExitCode::FAILURE
            }
        }
    }
}
