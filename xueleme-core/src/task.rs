//! Task model for the to-do list.
//!
//! Tasks never disappear on their own: an unfinished task that is due gets
//! pushed to the next day by the check-in audit (see `checkin.rs`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::DayKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,

    /// `None` means no deadline.
    #[serde(default)]
    pub due_date: Option<DayKey>,

    #[serde(default)]
    pub desc: String,

    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub done_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            due_date: None,
            desc: String::new(),
            status: TaskStatus::Todo,
            created_at,
            done_at: None,
        }
    }

    pub fn with_due(mut self, due: DayKey) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// Todo with a due date on or before `today`.
    pub fn is_overdue(&self, today: DayKey) -> bool {
        self.status == TaskStatus::Todo && self.due_date.is_some_and(|d| d <= today)
    }

    /// Todo tasks the daily check-in asks about: undated ones plus anything due.
    pub fn needs_audit(&self, today: DayKey) -> bool {
        self.status == TaskStatus::Todo && self.due_date.is_none_or(|d| d <= today)
    }

    pub fn mark_done(&mut self, at: DateTime<Utc>) {
        self.status = TaskStatus::Done;
        self.done_at = Some(at);
    }

    pub fn toggle(&mut self, at: DateTime<Utc>) {
        match self.status {
            TaskStatus::Done => {
                self.status = TaskStatus::Todo;
                self.done_at = None;
            }
            TaskStatus::Todo => self.mark_done(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap()
    }

    fn day(s: &str) -> DayKey {
        s.parse().unwrap()
    }

    #[test]
    fn overdue_includes_due_today() {
        let t = Task::new("t1", "read ch.3", at()).with_due(day("2024-03-04"));
        assert!(t.is_overdue(day("2024-03-04")));
        assert!(!t.is_overdue(day("2024-03-03")));
    }

    #[test]
    fn undated_task_is_audited_but_never_overdue() {
        let t = Task::new("t2", "flashcards", at());
        assert!(!t.is_overdue(day("2030-01-01")));
        assert!(t.needs_audit(day("2024-03-04")));
    }

    #[test]
    fn toggle_sets_and_clears_done_at() {
        let mut t = Task::new("t3", "essay", at());
        t.toggle(at());
        assert!(t.is_done());
        assert_eq!(t.done_at, Some(at()));
        t.toggle(at());
        assert_eq!(t.status, TaskStatus::Todo);
        assert!(t.done_at.is_none());
    }

    #[test]
    fn deserializes_browser_shape() {
        let json = r#"{"id":"task_1","title":"math","dueDate":null,"desc":"","status":"todo",
            "createdAt":"2024-03-01T02:00:00.000Z","doneAt":null}"#;
        let t: Task = serde_json::from_str(json).unwrap();
        assert_eq!(t.status, TaskStatus::Todo);
        assert!(t.due_date.is_none());
    }
}
