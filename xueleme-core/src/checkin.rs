//! Daily check-ins, the task audit that runs with them, and the streak rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{DayKey, days_between};

/// Minimum note length (in chars, after trimming) for a check-in to count.
pub const MIN_NOTE_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRecord {
    pub date: DayKey,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub note: String,
    /// When the check-in was recorded.
    pub at: DateTime<Utc>,
}

/// Result of a successful check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinOutcome {
    pub day: DayKey,
    pub streak: u32,
    /// Task ids marked done by the audit.
    pub completed: Vec<String>,
    /// Task ids whose due date moved to tomorrow.
    pub postponed: Vec<String>,
}

const NO_CONFIRMED_PLAN: &str = "无具体核销计划";

/// The stored note: tasks confirmed done at check-in, then the summary.
pub fn checkin_note(confirmed_titles: &[String], summary: &str) -> String {
    let plans = if confirmed_titles.is_empty() {
        NO_CONFIRMED_PLAN.to_string()
    } else {
        confirmed_titles.join("、")
    };
    format!("【核销计划】：{plans}\n【总结心得】：{summary}")
}

/// Next streak value given the previous check-in day.
///
/// - first check-in ever: 1
/// - yesterday: +1
/// - same day: unchanged
/// - any gap: back to 1
pub fn next_streak(previous: Option<DayKey>, current_streak: u32, today: DayKey) -> u32 {
    let Some(prev) = previous else {
        return 1;
    };
    match days_between(prev, today).abs() {
        0 => current_streak.max(1),
        1 => current_streak.saturating_add(1),
        _ => 1,
    }
}
