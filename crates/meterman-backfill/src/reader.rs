// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Meter CSV parsing
//!
//! Files look like:
//!
//! ```text
//! #date,time,IMP,EXP,GEN-T,...
//! 2022-07-25,14:00,1234.5,567.8,910.1,...
//! ```
//!
//! Only the header labels matter; column order and extra columns are ignored.

use crate::error::{BackfillError, Result};
use crate::series::{MeterSeries, Quantity};
use crate::zone::MeterZone;
use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

pub const DATE_HEADER: &str = "#date";
pub const TIME_HEADER: &str = "time";

/// Column positions found in a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub date: usize,
    pub time: usize,
    pub import: Option<usize>,
    pub export: Option<usize>,
    pub generation: Option<usize>,
    /// Field count every data row must match
    pub width: usize,
}

impl Columns {
    /// Locate the known labels. Returns `None` when date or time is missing.
    #[must_use]
    pub fn from_header(header: &StringRecord) -> Option<Self> {
        let find = |label: &str| header.iter().position(|field| field == label);
        Some(Self {
            date: find(DATE_HEADER)?,
            time: find(TIME_HEADER)?,
            import: find(Quantity::Import.header()),
            export: find(Quantity::Export.header()),
            generation: find(Quantity::Generation.header()),
            width: header.len(),
        })
    }

    #[must_use]
    pub fn value(&self, quantity: Quantity) -> Option<usize> {
        match quantity {
            Quantity::Import => self.import,
            Quantity::Export => self.export,
            Quantity::Generation => self.generation,
        }
    }
}

/// What one file contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileReport {
    pub rows: usize,
    pub skipped_rows: usize,
    pub values: usize,
    /// File was read but contributed nothing by construction
    /// (empty, or no date/time header)
    pub ignored: bool,
}

/// Read one CSV file from disk and feed its rows into `series`.
///
/// The file is read to completion and closed before any row is applied, so a
/// file that fails to parse contributes nothing.
pub fn read_file(path: &Path, zone: MeterZone, series: &mut MeterSeries) -> Result<FileReport> {
    let mut content = String::new();
    File::open(path)
        .and_then(|mut file| file.read_to_string(&mut content))
        .map_err(|source| BackfillError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    read_records(path, content.as_bytes(), zone, series)
}

/// Parse CSV text from `reader` and feed it into `series`.
///
/// `path` is used only for log messages and errors.
pub fn read_records<R: Read>(
    path: &Path,
    reader: R,
    zone: MeterZone,
    series: &mut MeterSeries,
) -> Result<FileReport> {
    let records = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|source| BackfillError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut report = FileReport::default();

    let [header, rows @ ..] = records.as_slice() else {
        warn!("{}: empty file", path.display());
        report.ignored = true;
        return Ok(report);
    };
    if rows.is_empty() {
        warn!("{}: empty file", path.display());
        report.ignored = true;
        return Ok(report);
    }

    let Some(columns) = Columns::from_header(header) else {
        warn!("{}: cannot find date or time", path.display());
        report.ignored = true;
        return Ok(report);
    };

    // Last accepted timestamp, used to walk through a DST fold in order
    let mut previous = None;
    for (index, row) in rows.iter().enumerate() {
        let line = index + 1;
        report.rows += 1;

        if row.len() != columns.width {
            warn!("{}: {line}: Mismatch in column count", path.display());
            report.skipped_rows += 1;
            continue;
        }

        let text = format!("{} {}", &row[columns.date], &row[columns.time]);
        let Some(timestamp) = zone.parse_local_after(&text, previous.as_ref()) else {
            warn!("{}: {line}: Cannot parse date ({text})", path.display());
            report.skipped_rows += 1;
            continue;
        };
        previous = Some(timestamp);

        for quantity in Quantity::ALL {
            let Some(col) = columns.value(quantity) else {
                continue;
            };
            if series.get_mut(quantity).add_value(&row[col], timestamp) {
                report.values += 1;
            }
        }
    }

    Ok(report)
}
