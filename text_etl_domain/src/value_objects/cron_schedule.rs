// /////////////////////////////////////////////////////////////////////////////
// Text ETL RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cron Schedule Value Object
//!
//! Five-field cron expressions used by the scheduler. The grammar accepts
//! `*`, literal values, ranges (`a-b`), lists (`a,b,c`), and steps (`*/n`,
//! `a/n`) within these field ranges:
//!
//! | Field    | Range |
//! |----------|-------|
//! | minute   | 0-59  |
//! | hour     | 0-23  |
//! | day      | 1-31  |
//! | month    | 1-12  |
//! | weekday  | 0-7 (0 and 7 are Sunday) |
//!
//! An expression is accepted iff every field passes its range check. Parsed
//! schedules expand each field into an explicit value set, so `matches` and
//! `next_after` are simple set lookups.
//!
//! ## Examples
//!
//! ```
//! use text_etl_domain::value_objects::cron_schedule::CronSchedule;
//!
//! let nightly: CronSchedule = "0 2 * * *".parse().unwrap();
//! assert_eq!(nightly.to_string(), "0 2 * * *");
//!
//! // Minute 61 is out of range
//! assert!("0 61 * * *".parse::<CronSchedule>().is_err());
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EtlError;

/// One expanded cron field.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CronField {
    allowed: BTreeSet<u32>,
    /// Whether the field was written as `*` (relevant for the day-of-month /
    /// weekday union rule).
    wildcard: bool,
}

impl CronField {
    fn contains(&self, value: u32) -> bool {
        self.allowed.contains(&value)
    }
}

/// A validated five-field cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: CronField,
    hours: CronField,
    days: CronField,
    months: CronField,
    weekdays: CronField,
}

impl CronSchedule {
    /// Parses and validates a five-field cron expression.
    ///
    /// # Errors
    ///
    /// Returns `EtlError::ValidationError` when the expression does not have
    /// exactly five fields or any field fails its range check.
    pub fn parse(expression: &str) -> Result<Self, EtlError> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(EtlError::ValidationError(format!(
                "cron expression must have 5 fields, got {}: '{}'",
                parts.len(),
                expression
            )));
        }

        let minutes = parse_field(parts[0], 0, 59)?;
        let hours = parse_field(parts[1], 0, 23)?;
        let days = parse_field(parts[2], 1, 31)?;
        let months = parse_field(parts[3], 1, 12)?;
        let mut weekdays = parse_field(parts[4], 0, 7)?;
        // 7 is an alias for Sunday
        if weekdays.allowed.remove(&7) {
            weekdays.allowed.insert(0);
        }

        Ok(Self {
            expression: parts.join(" "),
            minutes,
            hours,
            days,
            months,
            weekdays,
        })
    }

    /// The normalized source expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether the given instant satisfies the schedule.
    ///
    /// Standard cron union rule: when both day-of-month and weekday are
    /// restricted, either matching is sufficient; otherwise both must match.
    pub fn matches(&self, at: &DateTime<Utc>) -> bool {
        if !self.minutes.contains(at.minute()) || !self.hours.contains(at.hour()) {
            return false;
        }
        if !self.months.contains(at.month()) {
            return false;
        }
        self.day_matches(at)
    }

    fn day_matches(&self, at: &DateTime<Utc>) -> bool {
        let dom = self.days.contains(at.day());
        let dow = self.weekdays.contains(at.weekday().num_days_from_sunday());
        match (self.days.wildcard, self.weekdays.wildcard) {
            (false, false) => dom || dow,
            (false, true) => dom,
            (true, false) => dow,
            (true, true) => true,
        }
    }

    /// Earliest instant strictly after `after` that satisfies the schedule.
    ///
    /// Returns `None` when no firing exists within a four-year horizon
    /// (possible with impossible day/month combinations such as `0 0 31 2 *`
    /// on the day-of-month path).
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = (*after + Duration::minutes(1))
            .with_second(0)?
            .with_nanosecond(0)?;
        let horizon = *after + Duration::days(4 * 366);

        while candidate <= horizon {
            if !self.months.contains(candidate.month()) {
                candidate = next_month_start(&candidate)?;
                continue;
            }
            if !self.day_matches(&candidate) {
                candidate = (candidate + Duration::days(1)).with_hour(0)?.with_minute(0)?;
                continue;
            }
            if !self.hours.contains(candidate.hour()) {
                candidate = (candidate + Duration::hours(1)).with_minute(0)?;
                continue;
            }
            if !self.minutes.contains(candidate.minute()) {
                candidate = candidate + Duration::minutes(1);
                continue;
            }
            return Some(candidate);
        }
        None
    }
}

fn next_month_start(at: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if at.month() == 12 {
        (at.year() + 1, 1)
    } else {
        (at.year(), at.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

fn parse_field(part: &str, min: u32, max: u32) -> Result<CronField, EtlError> {
    let invalid = |detail: &str| {
        EtlError::ValidationError(format!("invalid cron field '{}': {}", part, detail))
    };

    if part == "*" {
        return Ok(CronField {
            allowed: (min..=max).collect(),
            wildcard: true,
        });
    }

    let mut allowed = BTreeSet::new();
    for item in part.split(',') {
        let (base, step, has_step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid("step is not a number"))?;
                if step == 0 {
                    return Err(invalid("step must be positive"));
                }
                (base, step, true)
            }
            None => (item, 1, false),
        };

        let (start, end) = if base == "*" {
            (min, max)
        } else if let Some((lo, hi)) = base.split_once('-') {
            let lo: u32 = lo.parse().map_err(|_| invalid("range start is not a number"))?;
            let hi: u32 = hi.parse().map_err(|_| invalid("range end is not a number"))?;
            if lo > hi {
                return Err(invalid("range start exceeds range end"));
            }
            (lo, hi)
        } else {
            let value: u32 = base.parse().map_err(|_| invalid("value is not a number"))?;
            // `a/n` runs from a to the field maximum in steps of n
            if has_step { (value, max) } else { (value, value) }
        };

        if start < min || end > max {
            return Err(invalid(&format!("value out of range {}-{}", min, max)));
        }

        let mut value = start;
        while value <= end {
            allowed.insert(value);
            value += step;
        }
    }

    if allowed.is_empty() {
        return Err(invalid("no values"));
    }

    Ok(CronField {
        allowed,
        wildcard: false,
    })
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}

impl FromStr for CronSchedule {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CronSchedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.expression)
    }
}

impl<'de> Deserialize<'de> for CronSchedule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CronSchedule::parse(&raw).map_err(serde::de::Error::custom)
    }
}
