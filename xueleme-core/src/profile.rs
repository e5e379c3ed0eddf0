//! Profile, supervisors and reminder settings.
//!
//! Reminder settings are optional in stored blobs (older versions of the app
//! never wrote them). Missing fields get their defaults once, when the state is
//! deserialized or normalized, so the evaluator never has to null-check.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::time::{DayKey, TimeOfDay};

pub const DEFAULT_CUTOFF: &str = "23:00";
pub const DEFAULT_MISS_DAYS_THRESHOLD: u32 = 2;
pub const DEFAULT_WEEKLY_REPORT_TIME: &str = "20:30";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supervisor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Supervisor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            relation: String::new(),
            enabled: true,
        }
    }

    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = relation.into();
        self
    }

    /// Disabled supervisors and those without an address never get reminders.
    pub fn is_reachable(&self) -> bool {
        self.enabled && !self.email.trim().is_empty()
    }
}

/// A flag missing from a stored record reads as off; only
/// [`ReminderSettings::default`] (fresh profiles) turns everything on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettings {
    #[serde(default)]
    pub daily_cutoff_reminder_enabled: bool,
    #[serde(default)]
    pub overdue_tasks_reminder_enabled: bool,
    #[serde(default)]
    pub missed_days_reminder_enabled: bool,
    #[serde(default)]
    pub weekly_report_enabled: bool,
    /// 0 = Sunday .. 6 = Saturday.
    #[serde(default)]
    pub weekly_report_day: u8,
    #[serde(default = "default_weekly_report_time")]
    pub weekly_report_time: String,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            daily_cutoff_reminder_enabled: true,
            overdue_tasks_reminder_enabled: true,
            missed_days_reminder_enabled: true,
            weekly_report_enabled: true,
            weekly_report_day: 0,
            weekly_report_time: DEFAULT_WEEKLY_REPORT_TIME.to_string(),
        }
    }
}

impl ReminderSettings {
    /// Clamp the weekday and replace an unusable report time with the default.
    pub fn normalized(mut self) -> Self {
        if self.weekly_report_day > 6 {
            self.weekly_report_day %= 7;
        }
        if TimeOfDay::parse_strict(&self.weekly_report_time).is_err() {
            self.weekly_report_time = DEFAULT_WEEKLY_REPORT_TIME.to_string();
        }
        self
    }

    pub fn weekly_report_time_of_day(&self) -> TimeOfDay {
        if self.weekly_report_time.trim().is_empty() {
            TimeOfDay::parse_lenient(DEFAULT_WEEKLY_REPORT_TIME)
        } else {
            TimeOfDay::parse_lenient(&self.weekly_report_time)
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.daily_cutoff_reminder_enabled
            || self.overdue_tasks_reminder_enabled
            || self.missed_days_reminder_enabled
            || self.weekly_report_enabled
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_cutoff")]
    pub cutoff: String,

    #[serde(default = "default_miss_days")]
    pub miss_days_threshold: u32,

    #[serde(default)]
    pub last_checkin_date: Option<DayKey>,

    #[serde(default)]
    pub streak: u32,

    #[serde(default)]
    pub supervisors: Vec<Supervisor>,

    #[serde(default)]
    pub supervisor_sender_email: String,

    #[serde(default)]
    pub supervisor_sender_name: String,

    /// `None` disables supervisor reminders entirely.
    #[serde(default)]
    pub supervisor_reminder_settings: Option<ReminderSettings>,

    /// Display preferences and legacy fields this crate does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            cutoff: DEFAULT_CUTOFF.to_string(),
            miss_days_threshold: DEFAULT_MISS_DAYS_THRESHOLD,
            last_checkin_date: None,
            streak: 0,
            supervisors: Vec::new(),
            supervisor_sender_email: String::new(),
            supervisor_sender_name: String::new(),
            supervisor_reminder_settings: Some(ReminderSettings::default()),
            extra: BTreeMap::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_weekly_report_time() -> String {
    DEFAULT_WEEKLY_REPORT_TIME.to_string()
}

fn default_cutoff() -> String {
    DEFAULT_CUTOFF.to_string()
}

fn default_miss_days() -> u32 {
    DEFAULT_MISS_DAYS_THRESHOLD
}

impl Profile {
    /// Empty cutoff strings fall back to 23:00; anything else unparseable reads as 00:00.
    pub fn cutoff_time(&self) -> TimeOfDay {
        if self.cutoff.trim().is_empty() {
            TimeOfDay::parse_lenient(DEFAULT_CUTOFF)
        } else {
            TimeOfDay::parse_lenient(&self.cutoff)
        }
    }

    pub fn set_cutoff(&mut self, cutoff: &str) -> Result<()> {
        self.cutoff = TimeOfDay::parse_strict(cutoff)?.to_string();
        Ok(())
    }

    pub fn set_miss_days_threshold(&mut self, days: u32) -> Result<()> {
        if days == 0 {
            bail!("miss-day threshold must be at least 1");
        }
        self.miss_days_threshold = days;
        Ok(())
    }

    /// Apply load-time defaults in one place.
    pub fn normalize(&mut self) {
        if self.cutoff.trim().is_empty() {
            self.cutoff = DEFAULT_CUTOFF.to_string();
        }
        if self.miss_days_threshold == 0 {
            self.miss_days_threshold = DEFAULT_MISS_DAYS_THRESHOLD;
        }
        self.supervisor_reminder_settings = self
            .supervisor_reminder_settings
            .take()
            .map(ReminderSettings::normalized);
    }

    pub fn supervisor(&self, id: &str) -> Option<&Supervisor> {
        self.supervisors.iter().find(|s| s.id == id)
    }

    /// A fresh `sup_<millis>` id.
    pub fn next_supervisor_id(&self, now: DateTime<Utc>) -> String {
        let base = format!("sup_{}", now.timestamp_millis());
        (0..)
            .map(|n| if n == 0 { base.clone() } else { format!("{base}_{n}") })
            .find(|id| self.supervisor(id).is_none())
            .unwrap_or(base)
    }

    pub fn add_supervisor(&mut self, supervisor: Supervisor) -> Result<()> {
        if self.supervisor(&supervisor.id).is_some() {
            bail!("supervisor id already exists: {}", supervisor.id);
        }
        let email = supervisor.email.trim();
        if !email.is_empty() && !is_valid_email(email) {
            bail!("invalid supervisor email: {email}");
        }
        self.supervisors.push(supervisor);
        Ok(())
    }

    pub fn update_supervisor(
        &mut self,
        id: &str,
        update: impl FnOnce(&mut Supervisor),
    ) -> Result<()> {
        let Some(slot) = self.supervisors.iter_mut().find(|s| s.id == id) else {
            bail!("no supervisor with id {id}");
        };
        let mut next = slot.clone();
        update(&mut next);
        next.id = id.to_string();
        let email = next.email.trim();
        if !email.is_empty() && !is_valid_email(email) {
            bail!("invalid supervisor email: {email}");
        }
        *slot = next;
        Ok(())
    }

    pub fn set_supervisor_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        self.update_supervisor(id, |s| s.enabled = enabled)
    }

    pub fn remove_supervisor(&mut self, id: &str) -> Result<Supervisor> {
        let Some(pos) = self.supervisors.iter().position(|s| s.id == id) else {
            bail!("no supervisor with id {id}");
        };
        Ok(self.supervisors.remove(pos))
    }
}

/// Loose `user@domain.tld` check for supervisor addresses.
pub fn is_valid_email(target: &str) -> bool {
    let target = target.trim();
    let Some((local, domain)) = target.split_once('@') else {
        return false;
    };
    let local_ok =
        !local.is_empty() && local.chars().all(|c| c.is_alphanumeric() || "._+-".contains(c));
    let domain_ok = !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '.');
    local_ok && domain_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_fields_read_as_off() {
        let s: ReminderSettings =
            serde_json::from_str(r#"{"weeklyReportEnabled":true,"weeklyReportDay":9}"#).unwrap();
        assert!(s.weekly_report_enabled);
        assert!(!s.daily_cutoff_reminder_enabled);
        assert!(!s.missed_days_reminder_enabled);
        assert!(!s.overdue_tasks_reminder_enabled);
        assert_eq!(s.weekly_report_time, "20:30");
        let s = s.normalized();
        assert_eq!(s.weekly_report_day, 2);

        let empty: ReminderSettings = serde_json::from_str("{}").unwrap();
        assert!(!empty.any_enabled());
        assert_eq!(empty.weekly_report_day, 0);
        assert!(ReminderSettings::default().any_enabled());
    }

    #[test]
    fn normalize_repairs_bad_report_time() {
        let mut p = Profile::default();
        p.supervisor_reminder_settings = Some(ReminderSettings {
            weekly_report_time: "late".to_string(),
            ..ReminderSettings::default()
        });
        p.cutoff = String::new();
        p.normalize();
        assert_eq!(p.cutoff, "23:00");
        assert_eq!(
            p.supervisor_reminder_settings.unwrap().weekly_report_time,
            DEFAULT_WEEKLY_REPORT_TIME
        );
    }

    #[test]
    fn cutoff_validation_happens_on_write() {
        let mut p = Profile::default();
        assert!(p.set_cutoff("22:15").is_ok());
        assert_eq!(p.cutoff_time(), TimeOfDay { hour: 22, minute: 15 });
        assert!(p.set_cutoff("25:00").is_err());
        assert_eq!(p.cutoff, "22:15");
        assert!(p.set_miss_days_threshold(0).is_err());
    }

    #[test]
    fn supervisor_crud() {
        let mut p = Profile::default();
        p.add_supervisor(Supervisor::new("sup_1", "Mom", "mom@example.com")).unwrap();
        assert!(p.add_supervisor(Supervisor::new("sup_1", "Dup", "")).is_err());
        assert!(p.add_supervisor(Supervisor::new("sup_2", "Bad", "not-an-email")).is_err());

        assert!(
            p.update_supervisor("sup_1", |s| s.email = "broken".to_string())
                .is_err()
        );
        assert_eq!(p.supervisor("sup_1").unwrap().email, "mom@example.com");

        p.set_supervisor_enabled("sup_1", false).unwrap();
        assert!(!p.supervisor("sup_1").unwrap().is_reachable());

        let removed = p.remove_supervisor("sup_1").unwrap();
        assert_eq!(removed.name, "Mom");
        assert!(p.remove_supervisor("sup_1").is_err());
    }

    #[test]
    fn email_check() {
        assert!(is_valid_email("coach.li+study@uni.edu.cn"));
        assert!(!is_valid_email("@uni.edu"));
        assert!(!is_valid_email("li@localhost"));
        assert!(!is_valid_email("li@.cn"));
    }
}
