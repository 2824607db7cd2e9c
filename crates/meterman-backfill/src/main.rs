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

//! Prints the backfill SQL to stdout, e.g.
//!
//! ```text
//! meterman-backfill --dir /var/cache/MeterMan/csv | sqlite3 home-assistant_v2.db
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use meterman_backfill::{Cli, StatementGenerator, write_statements};
use std::io::{self, BufWriter};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Logs go to stderr, stdout is reserved for SQL
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("meterman_backfill=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load().context("Invalid configuration")?;

    let outcome = meterman_backfill::run(&config)
        .with_context(|| format!("Failed to read {}", config.dir.display()))?;

    let generator = StatementGenerator::new(
        config.now.unwrap_or_else(Utc::now),
        config.short_term_window(),
    );
    info!(
        "Short-term rows from {} onwards",
        generator.short_term_cutoff().format("%Y-%m-%d %H:%M:%S")
    );

    let statements = outcome.statements(&generator, &config.keys, config.transaction);
    let mut out = BufWriter::new(io::stdout().lock());
    let written = write_statements(&mut out, &statements).context("Failed to write SQL")?;
    info!("Wrote {written} statements");

    Ok(())
}
