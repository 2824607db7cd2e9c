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

//! Wall-clock interpretation of meter timestamps

use crate::error::{BackfillError, Result};
use chrono::{DateTime, FixedOffset, Local, MappedLocalTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Combined `date time` format written by the meter logger
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Timezone the CSV wall-clock times are recorded in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MeterZone {
    /// Zone of the machine running the backfill
    #[default]
    Local,
    Named(Tz),
}

impl MeterZone {
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse::<Tz>()
            .map(Self::Named)
            .map_err(|_| BackfillError::InvalidTimezone(name.to_owned()))
    }

    /// Pin a wall-clock time to an instant.
    ///
    /// Times falling into a DST gap have no instant and yield `None`; times in a
    /// DST fold resolve to the earlier of the two instants.
    #[must_use]
    pub fn resolve(self, naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        self.resolve_after(naive, None)
    }

    /// Like [`resolve`](Self::resolve), but a DST-fold time takes the later
    /// instant when the earlier one is not after `previous`.
    ///
    /// Feeding each row the timestamp of the row before it walks a file through
    /// the repeated hour in order: the first pass gets the summer offset and the
    /// second pass the winter one.
    #[must_use]
    pub fn resolve_after(
        self,
        naive: &NaiveDateTime,
        previous: Option<&DateTime<FixedOffset>>,
    ) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Local => pick(Local.from_local_datetime(naive), previous),
            Self::Named(tz) => pick(tz.from_local_datetime(naive), previous),
        }
    }

    /// Parse `YYYY-MM-DD HH:MM` in this zone.
    #[must_use]
    pub fn parse_local(self, text: &str) -> Option<DateTime<FixedOffset>> {
        self.parse_local_after(text, None)
    }

    /// Parse `YYYY-MM-DD HH:MM` in this zone, following `previous` through a
    /// DST fold.
    #[must_use]
    pub fn parse_local_after(
        self,
        text: &str,
        previous: Option<&DateTime<FixedOffset>>,
    ) -> Option<DateTime<FixedOffset>> {
        NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
            .ok()
            .and_then(|naive| self.resolve_after(&naive, previous))
    }
}

fn pick<Z: TimeZone>(
    local: MappedLocalTime<DateTime<Z>>,
    previous: Option<&DateTime<FixedOffset>>,
) -> Option<DateTime<FixedOffset>> {
    match local {
        MappedLocalTime::Single(t) => Some(t.fixed_offset()),
        MappedLocalTime::Ambiguous(early, late) => {
            let early = early.fixed_offset();
            if previous.is_some_and(|prev| early <= *prev) {
                Some(late.fixed_offset())
            } else {
                Some(early)
            }
        }
        MappedLocalTime::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Utc};

    #[test]
    fn test_named_zone_offsets() {
        let zone = MeterZone::from_name("Australia/Sydney").unwrap();

        // AEST in winter, AEDT in summer
        let winter = zone.parse_local("2022-07-25 14:00").unwrap();
        assert_eq!(winter.offset().local_minus_utc(), 10 * 3600);
        assert_eq!(winter.with_timezone(&Utc).hour(), 4);

        let summer = zone.parse_local("2023-01-10 14:00").unwrap();
        assert_eq!(summer.offset().local_minus_utc(), 11 * 3600);
    }

    #[test]
    fn test_unknown_zone_is_rejected() {
        let err = MeterZone::from_name("Mars/Olympus").unwrap_err();
        assert!(matches!(err, BackfillError::InvalidTimezone(name) if name == "Mars/Olympus"));
    }

    #[test]
    fn test_dst_gap_has_no_instant() {
        let zone = MeterZone::from_name("Europe/Prague").unwrap();
        assert!(zone.parse_local("2024-03-31 02:30").is_none());
    }

    #[test]
    fn test_dst_fold_takes_earliest() {
        let zone = MeterZone::from_name("Europe/Prague").unwrap();
        let t = zone.parse_local("2024-10-27 02:30").unwrap();
        // Still on CEST (+02:00) for the first pass through 02:30
        assert_eq!(t.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_dst_fold_follows_previous_row() {
        let zone = MeterZone::from_name("Europe/Prague").unwrap();
        let first = zone.parse_local_after("2024-10-27 02:30", None).unwrap();
        assert_eq!(first.offset().local_minus_utc(), 2 * 3600);

        // Second pass through 02:00 after 02:30 CEST was already seen
        let again = zone.parse_local_after("2024-10-27 02:00", Some(&first)).unwrap();
        assert_eq!(again.offset().local_minus_utc(), 3600);
        assert!(again > first);

        // Same wall-clock time repeated lands on the winter instant
        let repeat = zone.parse_local_after("2024-10-27 02:30", Some(&first)).unwrap();
        assert_eq!(repeat.with_timezone(&Utc).hour(), 1);

        // Outside a fold the previous row has no effect
        let later = zone.parse_local_after("2024-10-27 04:00", Some(&repeat)).unwrap();
        assert_eq!(later, zone.parse_local("2024-10-27 04:00").unwrap());
    }

    #[test]
    fn test_malformed_text() {
        let zone = MeterZone::from_name("UTC").unwrap();
        assert!(zone.parse_local("2024-13-01 00:00").is_none());
        assert!(zone.parse_local("yesterday").is_none());
        assert!(zone.parse_local("2024-01-01").is_none());
    }
}
