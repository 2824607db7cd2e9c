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

use crate::collector::collect_files;
use crate::config::{BackfillConfig, MetadataKeys};
use crate::error::Result;
use crate::reader::read_file;
use crate::series::{MeterSeries, Quantity, ResetMarkers};
use crate::statements::{Statement, StatementGenerator};
use crate::zone::MeterZone;
use std::path::PathBuf;
use tracing::{info, warn};

/// Counters for one run, logged when processing finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_found: usize,
    pub files_read: usize,
    pub files_failed: usize,
    pub files_ignored: usize,
    pub rows: usize,
    pub rows_skipped: usize,
}

/// Accumulated series plus what it took to build them.
#[derive(Debug, Clone)]
pub struct BackfillOutcome {
    pub series: MeterSeries,
    pub summary: RunSummary,
}

impl BackfillOutcome {
    /// Statements for import, export and generation, in that order.
    #[must_use]
    pub fn statements(
        &self,
        generator: &StatementGenerator,
        keys: &MetadataKeys,
        transaction: bool,
    ) -> Vec<Statement> {
        let mut statements = Vec::new();
        if transaction {
            statements.push(Statement::Begin);
        }
        for quantity in Quantity::ALL {
            statements.extend(generator.generate(self.series.get(quantity), keys.get(quantity)));
        }
        if transaction {
            statements.push(Statement::Commit);
        }
        statements
    }
}

/// Collect and read every CSV file under the configured directory.
///
/// Only a failure to walk the directory is an error; problems with individual
/// files or rows are logged and skipped.
pub fn run(config: &BackfillConfig) -> Result<BackfillOutcome> {
    info!("Reading CSV files from {}", config.dir.display());
    let files = collect_files(&config.dir)?;
    if !config.resets.is_empty() {
        info!("Using {} explicit reset times", config.resets.len());
    }

    let outcome = process_files(&files, config.zone, config.resets.clone());
    log_summary(&outcome);
    Ok(outcome)
}

/// Feed `files` into fresh series, in the order given.
#[must_use]
pub fn process_files(files: &[PathBuf], zone: MeterZone, resets: ResetMarkers) -> BackfillOutcome {
    let mut series = MeterSeries::new(resets);
    let mut summary = RunSummary {
        files_found: files.len(),
        ..RunSummary::default()
    };

    for file in files {
        match read_file(file, zone, &mut series) {
            Ok(report) => {
                summary.files_read += 1;
                summary.rows += report.rows;
                summary.rows_skipped += report.skipped_rows;
                if report.ignored {
                    summary.files_ignored += 1;
                }
            }
            Err(e) => {
                warn!("{e}");
                summary.files_failed += 1;
            }
        }
    }

    BackfillOutcome { series, summary }
}

fn log_summary(outcome: &BackfillOutcome) {
    let summary = &outcome.summary;
    info!(
        "Processed {} files ({} failed, {} without data), {} rows ({} skipped)",
        summary.files_found,
        summary.files_failed,
        summary.files_ignored,
        summary.rows,
        summary.rows_skipped
    );
    for quantity in Quantity::ALL {
        let series = outcome.series.get(quantity);
        info!(
            "{quantity}: {} samples, {} resets, total {:.3}",
            series.samples().len(),
            series.resets(),
            series.total()
        );
    }
}
