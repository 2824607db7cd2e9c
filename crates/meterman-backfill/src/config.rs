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

//! Configuration for the backfill
//!
//! Values come from the command line, then an optional TOML file, then the
//! built-in defaults.

use crate::error::{BackfillError, Result};
use crate::series::{Quantity, ResetMarkers};
use crate::zone::MeterZone;
use chrono::{DateTime, TimeDelta, Utc};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CSV_DIR: &str = "/var/cache/MeterMan/csv";
pub const DEFAULT_SHORT_TERM_DAYS: u32 = 14;

// metadata_id values from the statistics_meta table
pub const DEFAULT_IMPORT_KEY: &str = "14";
pub const DEFAULT_EXPORT_KEY: &str = "13";
pub const DEFAULT_GENERATION_KEY: &str = "15";

#[derive(Debug, Parser)]
#[command(name = "meterman-backfill")]
#[command(
    about = "Generate SQL that replaces Home Assistant energy statistics with MeterMan CSV history",
    long_about = None
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Base directory for CSV files [default: /var/cache/MeterMan/csv]
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Days of 5-minute samples written to statistics_short_term [default: 14]
    #[arg(long)]
    pub days: Option<u32>,

    /// metadata_id key for import records [default: 14]
    #[arg(long)]
    pub import_key: Option<String>,

    /// metadata_id key for export records [default: 13]
    #[arg(long)]
    pub export_key: Option<String>,

    /// metadata_id key for solar generation records [default: 15]
    #[arg(long)]
    pub gen_key: Option<String>,

    /// Comma-separated meter replacement times (YYYY-MM-DD HH:MM)
    #[arg(long, value_delimiter = ',')]
    pub reset: Vec<String>,

    /// IANA timezone of the CSV timestamps [default: system local time]
    #[arg(long)]
    pub timezone: Option<String>,

    /// Wrap the output in a single transaction (`--transaction=false` overrides
    /// the config file)
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub transaction: Option<bool>,

    /// Reference time for the short-term window, RFC 3339 [default: now]
    #[arg(long)]
    pub now: Option<String>,
}

/// Layout of the optional TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub dir: Option<PathBuf>,
    pub days: Option<u32>,
    pub timezone: Option<String>,
    pub transaction: Option<bool>,
    pub resets: Vec<String>,
    pub keys: KeySettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeySettings {
    pub import: Option<String>,
    pub export: Option<String>,
    pub generation: Option<String>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BackfillError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
            .map_err(|e| BackfillError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BackfillError::Config(e.to_string()))
    }
}

/// `metadata_id` of each quantity in the statistics store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataKeys {
    pub import: String,
    pub export: String,
    pub generation: String,
}

impl MetadataKeys {
    #[must_use]
    pub fn get(&self, quantity: Quantity) -> &str {
        match quantity {
            Quantity::Import => &self.import,
            Quantity::Export => &self.export,
            Quantity::Generation => &self.generation,
        }
    }
}

impl Default for MetadataKeys {
    fn default() -> Self {
        Self {
            import: DEFAULT_IMPORT_KEY.to_owned(),
            export: DEFAULT_EXPORT_KEY.to_owned(),
            generation: DEFAULT_GENERATION_KEY.to_owned(),
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub dir: PathBuf,
    pub short_term_days: u32,
    pub keys: MetadataKeys,
    pub zone: MeterZone,
    pub resets: ResetMarkers,
    pub transaction: bool,
    pub now: Option<DateTime<Utc>>,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CSV_DIR),
            short_term_days: DEFAULT_SHORT_TERM_DAYS,
            keys: MetadataKeys::default(),
            zone: MeterZone::default(),
            resets: ResetMarkers::default(),
            transaction: false,
            now: None,
        }
    }
}

impl BackfillConfig {
    #[must_use]
    pub fn short_term_window(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.short_term_days))
    }

    fn validate(&self) -> Result<()> {
        if self.short_term_days == 0 {
            return Err(BackfillError::Config(
                "short-term window must be at least one day".to_owned(),
            ));
        }
        for quantity in Quantity::ALL {
            if self.keys.get(quantity).trim().is_empty() {
                return Err(BackfillError::Config(format!(
                    "metadata key for {quantity} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

impl Cli {
    /// Read the TOML file named by `--config`, if any, and resolve.
    pub fn load(self) -> Result<BackfillConfig> {
        let file = match &self.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        self.resolve(file)
    }

    /// Merge command line values over `file` and the defaults.
    pub fn resolve(self, file: FileConfig) -> Result<BackfillConfig> {
        let defaults = MetadataKeys::default();

        let zone = match self.timezone.or(file.timezone) {
            Some(name) => MeterZone::from_name(&name)?,
            None => MeterZone::Local,
        };

        let reset_times = if self.reset.is_empty() {
            file.resets
        } else {
            self.reset
        };
        let resets = parse_resets(&reset_times, zone)?;

        let now = self
            .now
            .map(|text| {
                DateTime::parse_from_rfc3339(text.trim())
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|_| BackfillError::InvalidTimestamp(text))
            })
            .transpose()?;

        let config = BackfillConfig {
            dir: self
                .dir
                .or(file.dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_DIR)),
            short_term_days: self
                .days
                .or(file.days)
                .unwrap_or(DEFAULT_SHORT_TERM_DAYS),
            keys: MetadataKeys {
                import: self
                    .import_key
                    .or(file.keys.import)
                    .unwrap_or(defaults.import),
                export: self
                    .export_key
                    .or(file.keys.export)
                    .unwrap_or(defaults.export),
                generation: self
                    .gen_key
                    .or(file.keys.generation)
                    .unwrap_or(defaults.generation),
            },
            zone,
            resets,
            transaction: self.transaction.or(file.transaction).unwrap_or(false),
            now,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parse `YYYY-MM-DD HH:MM` reset times in `zone`. Blank entries are ignored.
pub fn parse_resets(times: &[String], zone: MeterZone) -> Result<ResetMarkers> {
    let markers = times
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            zone.parse_local(s)
                .ok_or_else(|| BackfillError::InvalidTimestamp(s.to_owned()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ResetMarkers::new(markers))
}
