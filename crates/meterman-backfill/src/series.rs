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

//! Running-sum accumulation of cumulative meter counters
//!
//! Energy meters report ever-increasing kWh counters that occasionally drop back
//! (meter swap, rollover). A [`Series`] turns those raw readings into a sum that
//! never goes backwards: a drop rebases the baseline so the reading contributes a
//! zero delta.

use chrono::{DateTime, FixedOffset};
use std::collections::BTreeSet;
use std::fmt;
use std::num::FpCategory;
use std::rc::Rc;

/// The metered quantities carried by the CSV files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Import,
    Export,
    Generation,
}

impl Quantity {
    pub const ALL: [Self; 3] = [Self::Import, Self::Export, Self::Generation];

    /// Column label in the CSV header
    #[must_use]
    pub fn header(self) -> &'static str {
        match self {
            Self::Import => "IMP",
            Self::Export => "EXP",
            Self::Generation => "GEN-T",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Import => "import",
            Self::Export => "export",
            Self::Generation => "generation",
        };
        f.write_str(name)
    }
}

/// One accepted reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Wall-clock time of the reading, with the offset it was recorded under
    pub timestamp: DateTime<FixedOffset>,
    /// Raw counter value (kWh)
    pub value: f64,
    /// Running total since the first reading (kWh)
    pub sum: f64,
}

/// Instants at which a meter is known to have been replaced.
///
/// A reading at one of these instants always rebases, even when the new counter
/// happens to be above the old one.
#[derive(Debug, Clone, Default)]
pub struct ResetMarkers(BTreeSet<DateTime<FixedOffset>>);

impl ResetMarkers {
    #[must_use]
    pub fn new(markers: impl IntoIterator<Item = DateTime<FixedOffset>>) -> Self {
        Self(markers.into_iter().collect())
    }

    #[must_use]
    pub fn contains(&self, timestamp: &DateTime<FixedOffset>) -> bool {
        self.0.contains(timestamp)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Accumulated samples for one quantity.
#[derive(Debug, Clone)]
pub struct Series {
    quantity: Quantity,
    markers: Rc<ResetMarkers>,
    last: Option<f64>,
    total: f64,
    resets: usize,
    samples: Vec<Sample>,
}

impl Series {
    #[must_use]
    pub fn new(quantity: Quantity, markers: Rc<ResetMarkers>) -> Self {
        Self {
            quantity,
            markers,
            last: None,
            total: 0.0,
            resets: 0,
            samples: Vec::new(),
        }
    }

    /// Parse and accumulate a raw CSV field.
    ///
    /// Unparsable and zero readings are treated as missing and ignored. Returns
    /// whether a sample was appended.
    pub fn add_value(&mut self, raw: &str, timestamp: DateTime<FixedOffset>) -> bool {
        match raw.trim().parse::<f64>() {
            Ok(value) => self.push(value, timestamp),
            Err(_) => false,
        }
    }

    /// Accumulate a numeric reading. Zero (of either sign) and non-finite values
    /// are ignored.
    pub fn push(&mut self, value: f64, timestamp: DateTime<FixedOffset>) -> bool {
        if !matches!(value.classify(), FpCategory::Normal | FpCategory::Subnormal) {
            return false;
        }

        let last = match self.last {
            None => value,
            Some(prev) if value < prev || self.markers.contains(&timestamp) => {
                tracing::debug!(
                    "{} reset at {timestamp}: {prev} -> {value}",
                    self.quantity
                );
                self.resets += 1;
                value
            }
            Some(prev) => prev,
        };

        self.total += value - last;
        self.samples.push(Sample {
            timestamp,
            value,
            sum: self.total,
        });
        self.last = Some(value);
        true
    }

    #[must_use]
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Number of rebases caused by a falling counter or a reset marker
    #[must_use]
    pub fn resets(&self) -> usize {
        self.resets
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// The three series fed by one pass over the CSV files.
#[derive(Debug, Clone)]
pub struct MeterSeries {
    pub import: Series,
    pub export: Series,
    pub generation: Series,
}

impl MeterSeries {
    #[must_use]
    pub fn new(markers: ResetMarkers) -> Self {
        let markers = Rc::new(markers);
        Self {
            import: Series::new(Quantity::Import, Rc::clone(&markers)),
            export: Series::new(Quantity::Export, Rc::clone(&markers)),
            generation: Series::new(Quantity::Generation, markers),
        }
    }

    #[must_use]
    pub fn get(&self, quantity: Quantity) -> &Series {
        match quantity {
            Quantity::Import => &self.import,
            Quantity::Export => &self.export,
            Quantity::Generation => &self.generation,
        }
    }

    pub fn get_mut(&mut self, quantity: Quantity) -> &mut Series {
        match quantity {
            Quantity::Import => &mut self.import,
            Quantity::Export => &mut self.export,
            Quantity::Generation => &mut self.generation,
        }
    }
}

impl Default for MeterSeries {
    fn default() -> Self {
        Self::new(ResetMarkers::default())
    }
}
