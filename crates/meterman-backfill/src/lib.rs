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

//! MeterMan backfill - Home Assistant energy statistics from meter CSV history
//!
//! Reads the daily CSV files written by the MeterMan logger, converts the
//! cumulative import, export and solar generation counters into running sums
//! and produces SQL that replaces the matching rows of the Home Assistant
//! `statistics` and `statistics_short_term` tables.
//!
//! ## Pipeline
//!
//! - **collector**: list CSV files in chronological (path) order
//! - **reader**: map header labels to columns and parse rows
//! - **series**: accumulate readings, absorbing meter resets
//! - **statements**: render deletes and inserts per `metadata_id`

pub mod backfill;
pub mod collector;
pub mod config;
pub mod error;
pub mod reader;
pub mod series;
pub mod statements;
pub mod zone;

pub use backfill::{BackfillOutcome, RunSummary, process_files, run};
pub use config::{BackfillConfig, Cli, FileConfig, MetadataKeys};
pub use error::{BackfillError, Result};
pub use series::{MeterSeries, Quantity, ResetMarkers, Sample, Series};
pub use statements::{Statement, StatementGenerator, Table, write_statements};
pub use zone::MeterZone;
