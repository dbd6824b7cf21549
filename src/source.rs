//! CSV bar input
//!
//! Expects a header row with `timestamp,open,high,low,close,volume`, where
//! `timestamp` is seconds since the Unix epoch. Column order does not matter
//! and surrounding whitespace is trimmed.

use std::{fs::File, io::Read, path::Path};

use crate::{Bar, BarSeries, HuntError, Result, ScanError};

/// Parse and validate a bar series from any CSV reader.
///
/// Errors carry the 1-based line number of the offending row (the header is
/// line 1).
pub fn read_bars<R: Read>(reader: R) -> Result<BarSeries> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();
    for (i, row) in csv_reader.deserialize::<Bar>().enumerate() {
        let bar = row.map_err(|e| HuntError::Source {
            line: e.position().map_or(i + 2, |p| p.line() as usize),
            message: e.to_string(),
        })?;
        bars.push(bar);
    }

    tracing::debug!(bars = bars.len(), "parsed bar rows");

    BarSeries::new(bars).map_err(|e| match e {
        HuntError::InvalidBar { index, reason } => HuntError::Source {
            line: index + 2,
            message: reason.to_string(),
        },
        HuntError::NonMonotonicTimestamp {
            index,
            previous,
            current,
        } => HuntError::Source {
            line: index + 2,
            message: format!("timestamp {current} is not after {previous}"),
        },
        other => other,
    })
}

/// Open and parse a CSV file; see [`read_bars`].
pub fn load_bars(path: &Path) -> Result<BarSeries> {
    let file = File::open(path).map_err(|e| HuntError::Source {
        line: 0,
        message: format!("{}: {e}", path.display()),
    })?;
    read_bars(file)
}

/// Load one series per file, keyed by file stem.
///
/// A file that cannot be read or parsed is reported in the error list and
/// skipped; the others still load.
pub fn load_watchlist<P: AsRef<Path>>(paths: &[P]) -> (Vec<(String, BarSeries)>, Vec<ScanError>) {
    let mut loaded = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let instrument = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
        match load_bars(path) {
            Ok(series) => {
                tracing::debug!(%instrument, bars = series.len(), "loaded");
                loaded.push((instrument, series));
            }
            Err(error) => {
                tracing::warn!(%instrument, %error, "instrument skipped");
                errors.push(ScanError { instrument, error });
            }
        }
    }

    (loaded, errors)
}
