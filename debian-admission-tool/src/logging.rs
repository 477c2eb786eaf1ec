// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use slog::Drain;

/// A slog Drain that uses eprintln!.
pub struct StderrDrain {
    /// Minimum logging level that we're emitting.
    pub min_level: slog::Level,
}

impl slog::Drain for StderrDrain {
    type Ok = ();
    type Err = std::io::Error;

    fn log(
        &self,
        record: &slog::Record,
        _values: &slog::OwnedKVList,
    ) -> Result<Self::Ok, Self::Err> {
        if !record.level().is_at_least(self.min_level) {
            return Ok(());
        }

        match record.level() {
            slog::Level::Critical | slog::Level::Error | slog::Level::Warning => {
                eprintln!("{}: {}", record.level().as_str().to_lowercase(), record.msg())
            }
            _ => eprintln!("{}", record.msg()),
        }

        Ok(())
    }
}

/// The minimum level to log given how often verbosity was raised.
pub fn level_from_verbosity(verbosity: u64) -> slog::Level {
    match verbosity {
        0 => slog::Level::Info,
        1 => slog::Level::Debug,
        _ => slog::Level::Trace,
    }
}

/// Construct a slog::Logger writing to stderr.
pub fn logger_from_verbosity(verbosity: u64) -> slog::Logger {
    slog::Logger::root(
        StderrDrain {
            min_level: level_from_verbosity(verbosity),
        }
        .fuse(),
        slog::o!(),
    )
}
