//! Trailing-week statistics used by the reminder messages and `xueleme stats`.

use chrono::NaiveDateTime;

use crate::checkin::CheckinRecord;
use crate::state::AppState;
use crate::task::Task;
use crate::time::DayKey;

/// Days in the trailing window, including today.
pub const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyStats<'a> {
    pub today: DayKey,
    /// Check-ins from `today - 6` through `today`, oldest first.
    pub recent_checkins: Vec<&'a CheckinRecord>,
    pub total_minutes: u64,
    pub done_tasks: usize,
    pub total_tasks: usize,
    /// Todo tasks due on or before today, ordered by due date then id.
    pub overdue_tasks: Vec<&'a Task>,
    /// 0..=100, rounded. 0 when there are no tasks at all.
    pub completion_rate: u32,
}

impl WeeklyStats<'_> {
    /// Study time in hours with one decimal, e.g. "2.5".
    pub fn total_hours(&self) -> String {
        format!("{:.1}", self.total_minutes as f64 / 60.0)
    }
}

pub fn completion_rate(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).round() as u32
}

pub fn weekly_stats(state: &AppState, now: NaiveDateTime) -> WeeklyStats<'_> {
    let today = DayKey::of(now);
    let start = today.add_days(-(WINDOW_DAYS - 1));

    let recent_checkins: Vec<&CheckinRecord> = state.checkins.range(start..=today).map(|(_, c)| c).collect();
    let total_minutes = recent_checkins.iter().map(|c| u64::from(c.minutes)).sum();

    let total_tasks = state.tasks.len();
    let done_tasks = state.tasks.values().filter(|t| t.is_done()).count();

    let mut overdue_tasks: Vec<&Task> = state.tasks.values().filter(|t| t.is_overdue(today)).collect();
    overdue_tasks.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));

    WeeklyStats {
        today,
        recent_checkins,
        total_minutes,
        done_tasks,
        total_tasks,
        overdue_tasks,
        completion_rate: completion_rate(done_tasks, total_tasks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn day(s: &str) -> DayKey {
        s.parse().unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn record(d: &str, minutes: u32) -> CheckinRecord {
        CheckinRecord {
            date: day(d),
            minutes,
            note: "study".to_string(),
            at: at(),
        }
    }

    #[test]
    fn empty_state_has_zero_rate() {
        let st = AppState::default();
        let s = weekly_stats(&st, now());
        assert_eq!(s.completion_rate, 0);
        assert_eq!(s.total_minutes, 0);
        assert!(s.overdue_tasks.is_empty());
        assert_eq!(s.total_hours(), "0.0");
    }

    #[test]
    fn window_is_seven_days_inclusive() {
        let mut st = AppState::default();
        for (d, m) in [("2024-03-03", 100), ("2024-03-04", 30), ("2024-03-10", 60), ("2024-03-11", 500)] {
            st.checkins.insert(day(d), record(d, m));
        }
        let s = weekly_stats(&st, now());
        // 03-04 ..= 03-10
        assert_eq!(s.recent_checkins.len(), 2);
        assert_eq!(s.total_minutes, 90);
        assert_eq!(s.total_hours(), "1.5");
    }

    #[test]
    fn overdue_and_rate() {
        let mut st = AppState::default();
        st.add_task(Task::new("t1", "late", at()).with_due(day("2024-03-09"))).unwrap();
        st.add_task(Task::new("t2", "due today", at()).with_due(day("2024-03-10"))).unwrap();
        st.add_task(Task::new("t3", "tomorrow", at()).with_due(day("2024-03-11"))).unwrap();
        let mut done = Task::new("t4", "finished", at()).with_due(day("2024-03-01"));
        done.mark_done(at());
        st.add_task(done).unwrap();
        st.add_task(Task::new("t5", "someday", at())).unwrap();
        st.add_task(Task::new("t6", "also done", at())).unwrap();
        st.toggle_task("t6", at()).unwrap();

        let s = weekly_stats(&st, now());
        let ids: Vec<&str> = s.overdue_tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert_eq!(s.done_tasks, 2);
        assert_eq!(s.total_tasks, 6);
        // 2/6 = 33.3
        assert_eq!(s.completion_rate, 33);
        assert_eq!(completion_rate(2, 3), 67);
    }
}
