//! Time utilities: day keys, ISO week ids and time-of-day parsing.
//!
//! Every key is derived from the user's local wall clock in one configured
//! IANA timezone. The CLI converts `Utc::now()` once (see [`local_now`]); the
//! rest of the core only ever sees an already-local `NaiveDateTime`, so check-in
//! keys, due dates and reminder log markers can never disagree about midnight.

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar day, rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Day key of a local wall-clock instant.
    pub fn of(now: NaiveDateTime) -> Self {
        Self(now.date())
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// Shift by a signed number of days. Saturates at chrono's date range.
    pub fn add_days(self, days: i64) -> Self {
        self.0
            .checked_add_signed(Duration::days(days))
            .map(Self)
            .unwrap_or(self)
    }

    pub fn next_day(self) -> Self {
        self.add_days(1)
    }

    pub fn week(self) -> WeekId {
        WeekId::of(self.0)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        // Older blobs sometimes carry a full ISO timestamp; the day is what precedes the `T`.
        let head = s.split_once('T').map_or(s, |(day, _)| day);
        NaiveDate::parse_from_str(head, "%Y-%m-%d")
            .map(Self)
            .map_err(|e| anyhow!("invalid day key '{s}': {e}"))
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Whole-day difference `to - from`. Negative when `to` is earlier.
pub fn days_between(from: DayKey, to: DayKey) -> i64 {
    (to.0 - from.0).num_days()
}

/// ISO-8601 week (Monday start; week 1 holds the year's first Thursday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekId {
    pub iso_year: i32,
    pub week: u32,
}

impl WeekId {
    pub fn of(date: NaiveDate) -> Self {
        let w = date.iso_week();
        Self {
            iso_year: w.year(),
            week: w.week(),
        }
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.iso_year, self.week)
    }
}

impl FromStr for WeekId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (year, week) = s
            .split_once("-W")
            .ok_or_else(|| anyhow!("invalid week id '{s}' (expected YYYY-W##)"))?;
        let iso_year: i32 = year
            .parse()
            .map_err(|_| anyhow!("invalid week id year in '{s}'"))?;
        let week: u32 = week
            .parse()
            .map_err(|_| anyhow!("invalid week number in '{s}'"))?;
        if !(1..=53).contains(&week) {
            bail!("week number out of range in '{s}'");
        }
        Ok(Self { iso_year, week })
    }
}

impl Serialize for WeekId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WeekId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// De-duplication unit of a reminder: a day for daily rules, an ISO week for
/// the weekly report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodKey {
    Day(DayKey),
    Week(WeekId),
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Day(d) => d.fmt(f),
            PeriodKey::Week(w) => w.fmt(f),
        }
    }
}

impl FromStr for PeriodKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.contains("-W") {
            Ok(PeriodKey::Week(s.parse()?))
        } else {
            Ok(PeriodKey::Day(s.parse()?))
        }
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 24h wall-clock time such as a cutoff or the weekly report time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay { hour: 0, minute: 0 };

    /// Read-side parse: any component that is missing, non-numeric or out of
    /// range becomes 0. Never fails.
    pub fn parse_lenient(s: &str) -> Self {
        let mut parts = s.split(':');
        let hour = parts
            .next()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|h| *h < 24)
            .unwrap_or(0);
        let minute = parts
            .next()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|m| *m < 60)
            .unwrap_or(0);
        Self { hour, minute }
    }

    /// Write-side parse: strict `H:MM` / `HH:MM`, 00:00 through 23:59.
    pub fn parse_strict(s: &str) -> Result<Self> {
        let re = Regex::new(r"^([01]?\d|2[0-3]):([0-5]\d)$")?;
        let caps = re
            .captures(s.trim())
            .ok_or_else(|| anyhow!("invalid time '{s}' (expected HH:MM, 24h)"))?;
        Ok(Self {
            hour: caps[1].parse()?,
            minute: caps[2].parse()?,
        })
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }

    /// This time of day on the same calendar day as `now`.
    pub fn on(self, now: NaiveDateTime) -> NaiveDateTime {
        now.date().and_time(self.to_naive_time())
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Parse an IANA timezone name like "Asia/Shanghai".
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse()
        .map_err(|_| anyhow!("invalid timezone: {name}"))
}

/// Convert a UTC instant into the local wall clock of `tz`.
pub fn to_local(utc: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    utc.with_timezone(&tz).naive_local()
}

/// Current local wall-clock time in the named timezone.
pub fn local_now(tz: &str) -> Result<NaiveDateTime> {
    Ok(to_local(Utc::now(), parse_timezone(tz)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(s: &str) -> DayKey {
        s.parse().unwrap()
    }

    #[test]
    fn day_key_formats_and_parses() {
        let d = DayKey::from_ymd(2024, 3, 4).unwrap();
        assert_eq!(d.to_string(), "2024-03-04");
        assert_eq!(day("2024-03-04"), d);
        assert_eq!(day("2024-03-04T10:11:12.000Z"), d);
        assert!("2024-13-01".parse::<DayKey>().is_err());
        assert!("2024-03-04xyz".parse::<DayKey>().is_err());
        assert!("2024-03-04 10:00".parse::<DayKey>().is_err());
    }

    #[test]
    fn days_between_counts_calendar_days() {
        assert_eq!(days_between(day("2024-03-01"), day("2024-03-04")), 3);
        assert_eq!(days_between(day("2024-03-04"), day("2024-03-04")), 0);
        assert_eq!(days_between(day("2024-03-04"), day("2024-03-01")), -3);
        // leap day
        assert_eq!(days_between(day("2024-02-28"), day("2024-03-01")), 2);
    }

    #[test]
    fn week_id_follows_iso_rules() {
        assert_eq!(day("2024-03-04").week().to_string(), "2024-W10");
        assert_eq!(day("2021-01-03").week().to_string(), "2020-W53");
        assert_eq!(day("2024-12-30").week().to_string(), "2025-W01");
        // Monday and Sunday of the same ISO week
        assert_eq!(day("2024-03-04").week(), day("2024-03-10").week());
        assert_ne!(day("2024-03-10").week(), day("2024-03-11").week());
    }

    #[test]
    fn period_key_parses_both_shapes() {
        assert_eq!(
            "2025-W01".parse::<PeriodKey>().unwrap(),
            PeriodKey::Week(WeekId { iso_year: 2025, week: 1 })
        );
        assert_eq!(
            "2024-03-04".parse::<PeriodKey>().unwrap(),
            PeriodKey::Day(day("2024-03-04"))
        );
        assert!("2024-W99".parse::<PeriodKey>().is_err());
    }

    #[test]
    fn lenient_time_coerces_garbage_to_zero() {
        assert_eq!(TimeOfDay::parse_lenient("22:30"), TimeOfDay { hour: 22, minute: 30 });
        assert_eq!(TimeOfDay::parse_lenient("ab:15"), TimeOfDay { hour: 0, minute: 15 });
        assert_eq!(TimeOfDay::parse_lenient("7"), TimeOfDay { hour: 7, minute: 0 });
        assert_eq!(TimeOfDay::parse_lenient(""), TimeOfDay::MIDNIGHT);
        assert_eq!(TimeOfDay::parse_lenient("25:99"), TimeOfDay::MIDNIGHT);
    }

    #[test]
    fn strict_time_rejects_out_of_range() {
        assert_eq!(TimeOfDay::parse_strict("9:05").unwrap().to_string(), "09:05");
        assert!(TimeOfDay::parse_strict("24:00").is_err());
        assert!(TimeOfDay::parse_strict("12:60").is_err());
        assert!(TimeOfDay::parse_strict("noon").is_err());
    }

    #[test]
    fn to_local_shifts_across_midnight() {
        let tz = parse_timezone("Asia/Shanghai").unwrap();
        let utc = Utc.with_ymd_and_hms(2024, 3, 3, 16, 30, 0).unwrap();
        let local = to_local(utc, tz);
        assert_eq!(DayKey::of(local).to_string(), "2024-03-04");
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
