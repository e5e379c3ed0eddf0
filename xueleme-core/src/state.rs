//! The whole application state: one JSON blob owned by the host.
//!
//! Field names are camelCase so a backup exported by the browser build of the
//! app imports unchanged.

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::checkin::{CheckinOutcome, CheckinRecord, MIN_NOTE_CHARS, checkin_note, next_streak};
use crate::profile::Profile;
use crate::reminders::SupervisorReminderLogEntry;
use crate::task::Task;
use crate::time::DayKey;

const MAX_MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeState {
    /// Per-supervisor "last sent" markers, keyed by supervisor id.
    #[serde(default)]
    pub supervisor_reminder_log: BTreeMap<String, SupervisorReminderLogEntry>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub checkins: BTreeMap<DayKey, CheckinRecord>,
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,
    #[serde(default)]
    pub runtime: RuntimeState,
}

impl AppState {
    /// Apply load-time defaults. Call once after deserializing.
    pub fn normalize(&mut self) {
        self.profile.normalize();
    }

    pub fn has_checked_in(&self, day: DayKey) -> bool {
        self.checkins.contains_key(&day)
    }

    /// All-time study minutes.
    pub fn total_minutes(&self) -> u64 {
        self.checkins.values().map(|c| u64::from(c.minutes)).sum()
    }

    /// Tasks the check-in audit would touch today, oldest first.
    pub fn audit_candidates(&self, today: DayKey) -> Vec<&Task> {
        let mut out: Vec<&Task> = self.tasks.values().filter(|t| t.needs_audit(today)).collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }

    /// Record today's check-in.
    ///
    /// Every audited task is either confirmed done (its id is in `completed`) or
    /// postponed to tomorrow. A second check-in on the same day replaces the
    /// first record.
    pub fn check_in(
        &mut self,
        now: NaiveDateTime,
        recorded_at: DateTime<Utc>,
        minutes: u32,
        note: &str,
        completed: &[String],
    ) -> Result<CheckinOutcome> {
        if minutes == 0 || minutes > MAX_MINUTES_PER_DAY {
            bail!("minutes must be between 1 and {MAX_MINUTES_PER_DAY}, got {minutes}");
        }
        if note.trim().chars().count() < MIN_NOTE_CHARS {
            bail!("note must be at least {MIN_NOTE_CHARS} characters");
        }

        let today = DayKey::of(now);
        let tomorrow = today.next_day();

        let mut done_ids = Vec::new();
        let mut done_titles = Vec::new();
        let mut postponed_ids = Vec::new();
        for task in self.tasks.values_mut().filter(|t| t.needs_audit(today)) {
            if completed.iter().any(|id| *id == task.id) {
                task.mark_done(recorded_at);
                done_ids.push(task.id.clone());
                done_titles.push(task.title.clone());
            } else {
                task.due_date = Some(tomorrow);
                postponed_ids.push(task.id.clone());
            }
        }

        let streak = next_streak(self.profile.last_checkin_date, self.profile.streak, today);
        self.profile.streak = streak;
        self.profile.last_checkin_date = Some(today);

        self.checkins.insert(
            today,
            CheckinRecord {
                date: today,
                minutes,
                note: checkin_note(&done_titles, note.trim()),
                at: recorded_at,
            },
        );

        log::info!(
            "check-in {today}: {minutes} min, streak {streak}, {} done, {} postponed",
            done_ids.len(),
            postponed_ids.len()
        );

        Ok(CheckinOutcome {
            day: today,
            streak,
            completed: done_ids,
            postponed: postponed_ids,
        })
    }

    /// A fresh `task_<millis>` id that does not collide with existing tasks.
    pub fn next_task_id(&self, now: DateTime<Utc>) -> String {
        let base = format!("task_{}", now.timestamp_millis());
        if !self.tasks.contains_key(&base) {
            return base;
        }
        (1..)
            .map(|n| format!("{base}_{n}"))
            .find(|id| !self.tasks.contains_key(id))
            .unwrap_or(base)
    }

    pub fn add_task(&mut self, task: Task) -> Result<()> {
        if task.title.trim().is_empty() {
            bail!("task title must not be empty");
        }
        if self.tasks.contains_key(&task.id) {
            bail!("task id already exists: {}", task.id);
        }
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn toggle_task(&mut self, id: &str, at: DateTime<Utc>) -> Result<&Task> {
        let Some(task) = self.tasks.get_mut(id) else {
            bail!("no task with id {id}");
        };
        task.toggle(at);
        Ok(task)
    }

    pub fn delete_task(&mut self, id: &str) -> Result<Task> {
        match self.tasks.remove(id) {
            Some(t) => Ok(t),
            None => bail!("no task with id {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use chrono::{NaiveDate, TimeZone};

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 13, 0, 0).unwrap()
    }

    fn day(s: &str) -> DayKey {
        s.parse().unwrap()
    }

    #[test]
    fn check_in_audits_due_tasks() {
        let mut st = AppState::default();
        st.add_task(Task::new("a", "due yesterday", utc()).with_due(day("2024-03-03"))).unwrap();
        st.add_task(Task::new("b", "undated", utc())).unwrap();
        st.add_task(Task::new("c", "next week", utc()).with_due(day("2024-03-11"))).unwrap();

        let out = st
            .check_in(local(2024, 3, 4, 21, 0), utc(), 45, "read two chapters", &["b".to_string()])
            .unwrap();

        assert_eq!(out.completed, vec!["b".to_string()]);
        assert_eq!(out.postponed, vec!["a".to_string()]);
        assert_eq!(st.tasks["a"].due_date, Some(day("2024-03-05")));
        assert_eq!(st.tasks["a"].status, TaskStatus::Todo);
        assert!(st.tasks["b"].is_done());
        assert_eq!(st.tasks["c"].due_date, Some(day("2024-03-11")));
        assert_eq!(st.profile.last_checkin_date, Some(day("2024-03-04")));
        assert_eq!(st.profile.streak, 1);
        assert_eq!(
            st.checkins[&day("2024-03-04")].note,
            "【核销计划】：undated\n【总结心得】：read two chapters"
        );
    }

    #[test]
    fn note_without_confirmed_tasks() {
        let mut st = AppState::default();
        st.add_task(Task::new("a", "高数", utc())).unwrap();
        st.add_task(Task::new("b", "英语", utc())).unwrap();
        st.check_in(local(2024, 3, 4, 21, 0), utc(), 30, "  ok  ", &[]).unwrap();
        assert_eq!(
            st.checkins[&day("2024-03-04")].note,
            "【核销计划】：无具体核销计划\n【总结心得】：ok"
        );

        st.check_in(local(2024, 3, 5, 21, 0), utc(), 30, "done", &["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(
            st.checkins[&day("2024-03-05")].note,
            "【核销计划】：高数、英语\n【总结心得】：done"
        );
    }

    #[test]
    fn same_day_check_in_overwrites_record() {
        let mut st = AppState::default();
        st.check_in(local(2024, 3, 4, 9, 0), utc(), 20, "morning", &[]).unwrap();
        st.check_in(local(2024, 3, 4, 22, 0), utc(), 90, "evening", &[]).unwrap();
        assert_eq!(st.checkins.len(), 1);
        assert_eq!(st.checkins[&day("2024-03-04")].minutes, 90);
        assert_eq!(st.profile.streak, 1);
        assert_eq!(st.total_minutes(), 90);
    }

    #[test]
    fn consecutive_days_extend_streak() {
        let mut st = AppState::default();
        st.check_in(local(2024, 3, 3, 20, 0), utc(), 30, "day one", &[]).unwrap();
        let out = st.check_in(local(2024, 3, 4, 20, 0), utc(), 30, "day two", &[]).unwrap();
        assert_eq!(out.streak, 2);
    }

    #[test]
    fn rejects_empty_input() {
        let mut st = AppState::default();
        assert!(st.check_in(local(2024, 3, 4, 9, 0), utc(), 0, "note", &[]).is_err());
        assert!(st.check_in(local(2024, 3, 4, 9, 0), utc(), 10, " x ", &[]).is_err());
        assert!(st.checkins.is_empty());
    }

    #[test]
    fn task_crud() {
        let mut st = AppState::default();
        let id = st.next_task_id(utc());
        st.add_task(Task::new(id.clone(), "review", utc())).unwrap();
        assert_ne!(st.next_task_id(utc()), id);
        assert!(st.add_task(Task::new("x", "  ", utc())).is_err());

        assert!(st.toggle_task(&id, utc()).unwrap().is_done());
        assert!(st.toggle_task("missing", utc()).is_err());
        assert_eq!(st.delete_task(&id).unwrap().title, "review");
        assert!(st.delete_task(&id).is_err());
    }

    #[test]
    fn legacy_blob_loads_with_defaults() {
        let json = r#"{
            "profile": {"name":"小明","cutoff":"22:00","missDaysThreshold":3,
                        "supervisorName":"","supervisorContact":"","lastCheckinDate":"2024-03-01",
                        "streak":4,"theme":"dark","isSoundEnabled":true},
            "checkins": {"2024-03-01":{"date":"2024-03-01","minutes":40,"note":"ok","at":"2024-03-01T12:00:00.000Z"}},
            "tasks": {},
            "runtime": {"lastSelfRemindDate":null,"lastSupervisorSuggestDate":null}
        }"#;
        let mut st: AppState = serde_json::from_str(json).unwrap();
        st.normalize();
        assert_eq!(st.profile.miss_days_threshold, 3);
        assert!(st.profile.supervisor_reminder_settings.is_none());
        assert!(st.runtime.supervisor_reminder_log.is_empty());
        assert_eq!(st.profile.extra["theme"], serde_json::json!("dark"));

        let round = serde_json::to_value(&st).unwrap();
        assert_eq!(round["runtime"]["lastSelfRemindDate"], serde_json::Value::Null);
        assert_eq!(round["profile"]["isSoundEnabled"], serde_json::json!(true));
    }
}
