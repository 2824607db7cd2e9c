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

//! SQL generation for the Home Assistant statistics tables
//!
//! Each series replaces everything stored under its `metadata_id`: two deletes,
//! then an hourly row in `statistics` for every on-the-hour sample and a
//! 5-minute row in `statistics_short_term` for every recent sample.

use crate::series::Series;
use chrono::{DateTime, TimeDelta, Timelike, Utc};
use std::fmt;
use std::io::{self, Write};

/// Added to the sample time to form the `created` column
pub const CREATED_OFFSET: TimeDelta = TimeDelta::seconds(10);

/// Period covered by one `statistics` row
pub const HOURLY_PERIOD: TimeDelta = TimeDelta::hours(1);

/// Period covered by one `statistics_short_term` row
pub const SHORT_TERM_PERIOD: TimeDelta = TimeDelta::minutes(5);

const SQL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Statistics,
    ShortTerm,
}

impl Table {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Statistics => "statistics",
            Self::ShortTerm => "statistics_short_term",
        }
    }

    fn period(self) -> TimeDelta {
        match self {
            Self::Statistics => HOURLY_PERIOD,
            Self::ShortTerm => SHORT_TERM_PERIOD,
        }
    }
}

/// One line of generated SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Begin,
    Commit,
    Delete {
        table: Table,
        key: String,
    },
    Insert {
        table: Table,
        created: DateTime<Utc>,
        start: DateTime<Utc>,
        state: f64,
        sum: f64,
        key: String,
    },
}

impl Statement {
    #[must_use]
    pub fn table(&self) -> Option<Table> {
        match self {
            Self::Delete { table, .. } | Self::Insert { table, .. } => Some(*table),
            Self::Begin | Self::Commit => None,
        }
    }

    #[must_use]
    pub fn is_insert(&self) -> bool {
        matches!(self, Self::Insert { .. })
    }
}

struct Quoted<'a>(&'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.0.replace('\'', "''"))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => f.write_str("BEGIN TRANSACTION;"),
            Self::Commit => f.write_str("COMMIT;"),
            Self::Delete { table, key } => write!(
                f,
                "DELETE FROM {} WHERE metadata_id = {};",
                table.name(),
                Quoted(key)
            ),
            Self::Insert {
                table,
                created,
                start,
                state,
                sum,
                key,
            } => write!(
                f,
                "INSERT INTO {} (created, start, state, sum, metadata_id) \
                 VALUES ('{}', '{}', {state:.6}, {sum:.6}, {});",
                table.name(),
                created.format(SQL_TIME_FORMAT),
                start.format(SQL_TIME_FORMAT),
                Quoted(key)
            ),
        }
    }
}

/// Turns a finished [`Series`] into statements.
#[derive(Debug, Clone, Copy)]
pub struct StatementGenerator {
    now: DateTime<Utc>,
    short_term_window: TimeDelta,
}

impl StatementGenerator {
    #[must_use]
    pub fn new(now: DateTime<Utc>, short_term_window: TimeDelta) -> Self {
        Self {
            now,
            short_term_window,
        }
    }

    /// Earliest sample time that still gets a short-term row
    #[must_use]
    pub fn short_term_cutoff(&self) -> DateTime<Utc> {
        self.now - self.short_term_window
    }

    /// Deletes for `key`, followed by inserts for every retained sample.
    #[must_use]
    pub fn generate(&self, series: &Series, key: &str) -> Vec<Statement> {
        let cutoff = self.short_term_cutoff();
        let mut statements = vec![
            Statement::Delete {
                table: Table::Statistics,
                key: key.to_owned(),
            },
            Statement::Delete {
                table: Table::ShortTerm,
                key: key.to_owned(),
            },
        ];

        for sample in series.samples() {
            let local = sample.timestamp;
            let utc = local.with_timezone(&Utc);

            let mut tables = Vec::with_capacity(2);
            if local.minute() == 0 && local.second() == 0 {
                tables.push(Table::Statistics);
            }
            if utc >= cutoff {
                tables.push(Table::ShortTerm);
            }

            statements.extend(tables.into_iter().map(|table| Statement::Insert {
                table,
                created: utc + CREATED_OFFSET,
                start: utc - table.period(),
                state: sample.value,
                sum: sample.sum,
                key: key.to_owned(),
            }));
        }

        statements
    }
}

/// Write one statement per line and flush.
pub fn write_statements<'a, W: Write>(
    out: &mut W,
    statements: impl IntoIterator<Item = &'a Statement>,
) -> io::Result<usize> {
    let mut written = 0;
    for statement in statements {
        writeln!(out, "{statement}")?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{Quantity, Series};
    use chrono::{FixedOffset, TimeZone};
    use std::rc::Rc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    fn generator() -> StatementGenerator {
        StatementGenerator::new(now(), TimeDelta::days(14))
    }

    fn series(offset_hours: i32, points: &[(u32, u32, u32, f64)]) -> Series {
        let tz = FixedOffset::east_opt(offset_hours * 3600).unwrap();
        let mut series = Series::new(Quantity::Import, Rc::default());
        for &(day, hour, minute, value) in points {
            let ts = tz.with_ymd_and_hms(2024, 5, day, hour, minute, 0).unwrap();
            series.push(value, ts);
        }
        series
    }

    fn rendered(statements: &[Statement]) -> Vec<String> {
        statements.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_empty_series_only_deletes() {
        let statements = generator().generate(&series(0, &[]), "14");
        assert_eq!(
            rendered(&statements),
            vec![
                "DELETE FROM statistics WHERE metadata_id = '14';",
                "DELETE FROM statistics_short_term WHERE metadata_id = '14';",
            ]
        );
    }

    #[test]
    fn test_old_hourly_sample() {
        // Ten hours ahead of UTC, well outside the short-term window
        let statements = generator().generate(&series(10, &[(1, 14, 0, 1234.5)]), "14");
        assert_eq!(
            rendered(&statements)[2..],
            [
                "INSERT INTO statistics (created, start, state, sum, metadata_id) \
                 VALUES ('2024-05-01 04:00:10', '2024-05-01 03:00:00', 1234.500000, 0.000000, '14');"
            ]
        );
    }

    #[test]
    fn test_recent_samples_go_to_short_term() {
        let statements = generator().generate(
            &series(0, &[(19, 9, 55, 10.0), (19, 10, 0, 10.5), (19, 10, 5, 11.0)]),
            "13",
        );
        let lines = rendered(&statements);
        assert_eq!(
            lines[2..],
            [
                "INSERT INTO statistics_short_term (created, start, state, sum, metadata_id) \
                 VALUES ('2024-05-19 09:55:10', '2024-05-19 09:50:00', 10.000000, 0.000000, '13');",
                "INSERT INTO statistics (created, start, state, sum, metadata_id) \
                 VALUES ('2024-05-19 10:00:10', '2024-05-19 09:00:00', 10.500000, 0.500000, '13');",
                "INSERT INTO statistics_short_term (created, start, state, sum, metadata_id) \
                 VALUES ('2024-05-19 10:00:10', '2024-05-19 09:55:00', 10.500000, 0.500000, '13');",
                "INSERT INTO statistics_short_term (created, start, state, sum, metadata_id) \
                 VALUES ('2024-05-19 10:05:10', '2024-05-19 10:00:00', 11.000000, 1.000000, '13');",
            ]
        );
    }

    #[test]
    fn test_only_on_the_hour_samples_reach_statistics() {
        let points: Vec<_> = (0..24)
            .flat_map(|hour| (0..60).step_by(5).map(move |minute| (2, hour, minute, 1.0)))
            .collect();
        let statements = generator().generate(&series(2, &points), "14");

        let hourly: Vec<_> = statements
            .iter()
            .filter(|s| s.is_insert() && s.table() == Some(Table::Statistics))
            .collect();
        assert_eq!(hourly.len(), 24);
        assert!(
            !statements
                .iter()
                .any(|s| s.is_insert() && s.table() == Some(Table::ShortTerm))
        );
    }

    #[test]
    fn test_short_term_window_boundary() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let cutoff = now() - TimeDelta::days(14);
        let mut s = Series::new(Quantity::Export, Rc::default());
        s.push(1.0, (cutoff - TimeDelta::minutes(5)).with_timezone(&tz));
        s.push(2.0, cutoff.with_timezone(&tz));

        let statements = generator().generate(&s, "13");
        let short_term: Vec<_> = statements
            .iter()
            .filter(|s| s.is_insert() && s.table() == Some(Table::ShortTerm))
            .collect();
        assert_eq!(short_term.len(), 1);
        assert!(matches!(short_term[0], Statement::Insert { state, .. } if (*state - 2.0).abs() < 1e-9));
    }

    #[test]
    fn test_deletes_precede_inserts_once() {
        let statements =
            generator().generate(&series(0, &[(19, 10, 0, 1.0), (19, 11, 0, 2.0)]), "15");
        let deletes: Vec<_> = statements
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Statement::Delete { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(deletes, vec![0, 1]);
        assert!(statements[2..].iter().all(Statement::is_insert));
    }

    #[test]
    fn test_key_quotes_are_escaped() {
        let statement = Statement::Delete {
            table: Table::Statistics,
            key: "it's".to_owned(),
        };
        assert_eq!(
            statement.to_string(),
            "DELETE FROM statistics WHERE metadata_id = 'it''s';"
        );
    }

    #[test]
    fn test_write_statements_one_per_line() {
        let statements = generator().generate(&series(0, &[]), "14");
        let mut out = Vec::new();
        let written = write_statements(&mut out, &statements).unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "DELETE FROM statistics WHERE metadata_id = '14';\n\
             DELETE FROM statistics_short_term WHERE metadata_id = '14';\n"
        );
    }

    #[test]
    fn test_transaction_markers() {
        assert_eq!(Statement::Begin.to_string(), "BEGIN TRANSACTION;");
        assert_eq!(Statement::Commit.to_string(), "COMMIT;");
        assert_eq!(Statement::Begin.table(), None);
    }
}
