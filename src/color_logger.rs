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

use std::io::{self, Write};

use colored::Colorize;
use log::{Level, LevelFilter, Metadata, Record};

/// Stderr logger: errors red, warnings yellow, everything else tagged blue.
#[derive(Debug, Clone, Copy)]
pub struct ColorLogger {
    max_level: LevelFilter,
}

impl ColorLogger {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            max_level: Self::level_for(quiet, verbose),
        }
    }

    /// `quiet` wins over `verbose`.
    pub fn level_for(quiet: bool, verbose: bool) -> LevelFilter {
        if quiet {
            LevelFilter::Off
        } else if verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Info
        }
    }

    pub fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    fn render(record: &Record) -> String {
        match record.level() {
            Level::Error => format!(
                "{} {}",
                "[ERROR]".red().bold(),
                record.args().to_string().red().bold()
            ),
            Level::Warn => format!(
                "{} {}",
                "[WARN]".yellow().bold(),
                record.args().to_string().yellow().bold()
            ),
            level => format!("[{}] {}", level.to_string().blue(), record.args()),
        }
    }
}

impl log::Log for ColorLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", Self::render(record));
        }
        self.flush();
    }

    fn flush(&self) {
        // Nothing useful to do if stderr is gone
        let _ = io::stderr().flush();
    }
}
