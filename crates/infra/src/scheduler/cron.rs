//! Minimal cron expressions: `MIN HOUR DOM MON DOW`.
//!
//! Each of MIN, HOUR and DOW accepts `*`, `*/N`, `N` or a comma list of
//! numbers. DOM and MON must be `*`. Sunday is `0` (or `7`).

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("invalid cron expression {expr:?}: need 5 fields (MIN HOUR DOM MON DOW)")]
    FieldCount { expr: String },

    #[error("invalid cron field {field:?} for {name}")]
    Field { name: &'static str, field: String },

    #[error("unsupported cron field {field:?} for {name}: only * is supported")]
    Unsupported { name: &'static str, field: String },
}

/// Parsed schedule; each field is a bitmask of matching values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronSchedule {
    minutes: u64,
    hours: u32,
    days_of_week: u8,
}

/// The longest gap between two runs of a valid schedule is one week.
const SEARCH_LIMIT_MINUTES: i64 = 8 * 24 * 60;

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(CronError::FieldCount {
                expr: expr.to_string(),
            });
        };

        for (name, field) in [("day of month", dom), ("month", month)] {
            if *field != "*" {
                return Err(CronError::Unsupported {
                    name,
                    field: field.to_string(),
                });
            }
        }

        let mut days_of_week = parse_field(dow, "day of week", 0, 7)? as u8;
        // 7 is an alias for Sunday.
        if days_of_week & 0x80 != 0 {
            days_of_week = (days_of_week & 0x7f) | 0x01;
        }

        Ok(Self {
            minutes: parse_field(minute, "minute", 0, 59)?,
            hours: parse_field(hour, "hour", 0, 23)? as u32,
            days_of_week,
        })
    }

    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        let dow = at.weekday().num_days_from_sunday();
        self.minutes & (1 << at.minute()) != 0
            && self.hours & (1 << at.hour()) != 0
            && self.days_of_week & (1 << dow) != 0
    }

    /// First matching minute strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.duration_trunc(Duration::minutes(1)).ok()? + Duration::minutes(1);
        (0..SEARCH_LIMIT_MINUTES)
            .map(|offset| start + Duration::minutes(offset))
            .find(|candidate| self.matches(*candidate))
    }
}

fn parse_field(field: &str, name: &'static str, min: u32, max: u32) -> Result<u64, CronError> {
    let invalid = || CronError::Field {
        name,
        field: field.to_string(),
    };
    let range_mask = |step: u32| (min..=max).step_by(step as usize).fold(0u64, |m, v| m | (1 << v));

    if field == "*" {
        return Ok(range_mask(1));
    }
    if let Some(step) = field.strip_prefix("*/") {
        let n: u32 = step.parse().map_err(|_| invalid())?;
        if n == 0 {
            return Err(invalid());
        }
        return Ok(range_mask(n));
    }

    let mut mask = 0u64;
    for part in field.split(',') {
        let v: u32 = part.trim().parse().map_err(|_| invalid())?;
        if v < min || v > max {
            return Err(invalid());
        }
        mask |= 1 << v;
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn every_five_minutes() {
        let s = CronSchedule::parse("*/5 * * * *").unwrap();
        assert_eq!(s.next_after(at(2026, 2, 22, 10, 2)), Some(at(2026, 2, 22, 10, 5)));
        assert_eq!(s.next_after(at(2026, 2, 22, 10, 5)), Some(at(2026, 2, 22, 10, 10)));
    }

    #[test]
    fn twice_a_day() {
        let s = CronSchedule::parse("0 */12 * * *").unwrap();
        assert_eq!(s.next_after(at(2026, 2, 22, 1, 0)), Some(at(2026, 2, 22, 12, 0)));
        assert_eq!(s.next_after(at(2026, 2, 22, 12, 0)), Some(at(2026, 2, 23, 0, 0)));
    }

    #[test]
    fn weekly_on_sunday_and_monday() {
        // 2026-02-22 is a Sunday.
        let sunday = CronSchedule::parse("0 2 * * 0").unwrap();
        assert_eq!(sunday.next_after(at(2026, 2, 22, 3, 0)), Some(at(2026, 3, 1, 2, 0)));

        let alias = CronSchedule::parse("0 2 * * 7").unwrap();
        assert_eq!(alias, sunday);

        let monday = CronSchedule::parse("0 6 * * 1").unwrap();
        assert_eq!(monday.next_after(at(2026, 2, 22, 3, 0)), Some(at(2026, 2, 23, 6, 0)));
    }

    #[test]
    fn comma_lists() {
        let s = CronSchedule::parse("0,30 8 * * *").unwrap();
        assert_eq!(s.next_after(at(2026, 2, 22, 8, 0)), Some(at(2026, 2, 22, 8, 30)));
    }

    #[test]
    fn seconds_are_ignored() {
        let s = CronSchedule::parse("0 8 * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2026, 2, 22, 7, 59, 30).unwrap();
        assert_eq!(s.next_after(after), Some(at(2026, 2, 22, 8, 0)));
    }

    #[test]
    fn rejects_bad_expressions() {
        assert!(matches!(CronSchedule::parse("bad"), Err(CronError::FieldCount { .. })));
        assert!(matches!(CronSchedule::parse("60 * * * *"), Err(CronError::Field { .. })));
        assert!(matches!(CronSchedule::parse("*/0 * * * *"), Err(CronError::Field { .. })));
        assert!(matches!(CronSchedule::parse("0 0 1 * *"), Err(CronError::Unsupported { .. })));
        assert!(matches!(CronSchedule::parse("0 0 * 1 *"), Err(CronError::Unsupported { .. })));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the next run is a matching minute, strictly later, at most a week out.
            #[test]
            fn next_after_is_a_later_match(
                minute in 0u32..60,
                hour in 0u32..24,
                dow in 0u32..8,
                offset_minutes in 0i64..(60 * 24 * 14),
            ) {
                let schedule = CronSchedule::parse(&format!("{minute} {hour} * * {dow}")).unwrap();
                let after = at(2026, 1, 1, 0, 0) + Duration::minutes(offset_minutes);

                let next = schedule.next_after(after).unwrap();
                prop_assert!(next > after);
                prop_assert!(schedule.matches(next));
                prop_assert!(next - after <= Duration::days(7));
            }
        }
    }
}
