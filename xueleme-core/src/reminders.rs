//! Supervisor reminder evaluation + the log commit that de-duplicates it.
//!
//! Read model / write model:
//! - [`pending_supervisor_reminders`] is a pure function of `(state, now)`. It
//!   never mutates anything, so calling it on every tick is safe and repeated
//!   calls with the same input return the same items.
//! - [`mark_sent`] is the only writer. The host calls it once the user has acted
//!   on an item and must persist the state before the next evaluation, otherwise
//!   the same item comes back.
//!
//! A (supervisor, type, period) combination fires at most once: the period is
//! the day for daily rules and the ISO week for the weekly report.

use anyhow::{Result, bail};
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::message::format_supervisor_email;
use crate::profile::{ReminderSettings, Supervisor};
use crate::state::AppState;
use crate::stats::{WeeklyStats, weekly_stats};
use crate::time::{DayKey, PeriodKey, WeekId, days_between};

/// Overdue task titles quoted in a reminder body.
const OVERDUE_EXAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    DailyCutoff,
    MissedDays,
    OverdueTasks,
    WeeklyReport,
}

impl ReminderType {
    pub const ALL: [ReminderType; 4] = [
        ReminderType::DailyCutoff,
        ReminderType::MissedDays,
        ReminderType::OverdueTasks,
        ReminderType::WeeklyReport,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReminderType::DailyCutoff => "daily_cutoff",
            ReminderType::MissedDays => "missed_days",
            ReminderType::OverdueTasks => "overdue_tasks",
            ReminderType::WeeklyReport => "weekly_report",
        }
    }

    /// Short label for listings.
    pub fn label(self) -> &'static str {
        match self {
            ReminderType::DailyCutoff => "每日截止",
            ReminderType::MissedDays => "缺卡提醒",
            ReminderType::OverdueTasks => "任务逾期",
            ReminderType::WeeklyReport => "周报",
        }
    }

    fn enabled_in(self, settings: &ReminderSettings) -> bool {
        match self {
            ReminderType::DailyCutoff => settings.daily_cutoff_reminder_enabled,
            ReminderType::MissedDays => settings.missed_days_reminder_enabled,
            ReminderType::OverdueTasks => settings.overdue_tasks_reminder_enabled,
            ReminderType::WeeklyReport => settings.weekly_report_enabled,
        }
    }
}

impl fmt::Display for ReminderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "Last sent" markers for one supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorReminderLogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_daily_cutoff: Option<DayKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_missed_days: Option<DayKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_overdue_tasks: Option<DayKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_weekly_report: Option<WeekId>,
}

impl SupervisorReminderLogEntry {
    pub fn last_sent(&self, kind: ReminderType) -> Option<PeriodKey> {
        match kind {
            ReminderType::DailyCutoff => self.last_daily_cutoff.map(PeriodKey::Day),
            ReminderType::MissedDays => self.last_missed_days.map(PeriodKey::Day),
            ReminderType::OverdueTasks => self.last_overdue_tasks.map(PeriodKey::Day),
            ReminderType::WeeklyReport => self.last_weekly_report.map(PeriodKey::Week),
        }
    }

    pub fn already_sent(&self, kind: ReminderType, period: PeriodKey) -> bool {
        self.last_sent(kind) == Some(period)
    }

    /// Write the marker for `kind`. The period shape must match the type.
    pub fn record(&mut self, kind: ReminderType, period: PeriodKey) -> Result<()> {
        match (kind, period) {
            (ReminderType::DailyCutoff, PeriodKey::Day(d)) => self.last_daily_cutoff = Some(d),
            (ReminderType::MissedDays, PeriodKey::Day(d)) => self.last_missed_days = Some(d),
            (ReminderType::OverdueTasks, PeriodKey::Day(d)) => self.last_overdue_tasks = Some(d),
            (ReminderType::WeeklyReport, PeriodKey::Week(w)) => self.last_weekly_report = Some(w),
            (kind, period) => bail!("period {period} does not fit reminder type {kind}"),
        }
        Ok(())
    }
}

/// A reminder that is due now. Computed, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorReminderItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ReminderType,
    pub supervisor_id: String,
    pub supervisor_name: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub reason: String,
    /// Period key written into the log when the item is handled.
    pub scheduled_for: PeriodKey,
}

/// Deterministic id: `{supervisor}_{type}_{period}`.
pub fn item_id(supervisor_id: &str, kind: ReminderType, period: PeriodKey) -> String {
    format!("{supervisor_id}_{kind}_{period}")
}

/// Everything the rules need, computed once per pass.
struct Snapshot<'a> {
    state: &'a AppState,
    now: NaiveDateTime,
    today: DayKey,
    week: WeekId,
    after_cutoff: bool,
    checked_in_today: bool,
    days_since_last: Option<i64>,
    weekly_ready: bool,
    stats: WeeklyStats<'a>,
}

impl<'a> Snapshot<'a> {
    fn new(state: &'a AppState, settings: &'a ReminderSettings, now: NaiveDateTime) -> Self {
        let today = DayKey::of(now);
        let after_cutoff = now >= state.profile.cutoff_time().on(now);
        let days_since_last = state
            .profile
            .last_checkin_date
            .map(|last| days_between(last, today));
        let weekly_ready = now.weekday().num_days_from_sunday() == u32::from(settings.weekly_report_day)
            && now >= settings.weekly_report_time_of_day().on(now);

        Self {
            state,
            now,
            today,
            week: today.week(),
            after_cutoff,
            checked_in_today: state.has_checked_in(today),
            days_since_last,
            weekly_ready,
            stats: weekly_stats(state, now),
        }
    }

    /// Period the rule de-duplicates on.
    fn period(&self, kind: ReminderType) -> PeriodKey {
        match kind {
            ReminderType::WeeklyReport => PeriodKey::Week(self.week),
            _ => PeriodKey::Day(self.today),
        }
    }

    /// Rule-specific eligibility, ignoring the enable flag and the log.
    fn is_due(&self, kind: ReminderType) -> bool {
        match kind {
            ReminderType::DailyCutoff => self.after_cutoff && !self.checked_in_today,
            // Gated on the cutoff like the daily rule; no anchor date means no gap.
            ReminderType::MissedDays => {
                self.after_cutoff
                    && self
                        .days_since_last
                        .is_some_and(|gap| gap >= i64::from(self.state.profile.miss_days_threshold))
            }
            ReminderType::OverdueTasks => self.after_cutoff && !self.stats.overdue_tasks.is_empty(),
            ReminderType::WeeklyReport => self.weekly_ready,
        }
    }

    /// (reason, details, suggestion) for the message body.
    fn content(&self, kind: ReminderType) -> (String, String, &'static str) {
        let stats = &self.stats;
        let hours = stats.total_hours();
        let rate = stats.completion_rate;
        match kind {
            ReminderType::DailyCutoff => (
                format!("今日已过截止时间（{}），仍未打卡", self.state.profile.cutoff),
                [
                    "今日尚未完成打卡，建议温和提醒其完成今天的学习闭环。".to_string(),
                    format!("本周累计学习：{hours}h，任务完成率：{rate}%"),
                ]
                .join("\n"),
                "今天也辛苦了，别忘了打卡收个尾，我在等你的好消息。",
            ),
            ReminderType::MissedDays => {
                let gap = self.days_since_last.unwrap_or_default();
                let last = self
                    .state
                    .profile
                    .last_checkin_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "暂无".to_string());
                (
                    format!("已连续{gap}天未打卡（上次：{last}）"),
                    [
                        "可能出现学习节奏中断，需要更有温度的关心与提醒。".to_string(),
                        format!("本周累计学习：{hours}h，任务完成率：{rate}%"),
                    ]
                    .join("\n"),
                    "你最近是不是有点累？我陪你一起把节奏找回来。今天要不要先从15分钟开始？",
                )
            }
            ReminderType::OverdueTasks => {
                let examples: Vec<String> = stats
                    .overdue_tasks
                    .iter()
                    .take(OVERDUE_EXAMPLES)
                    .map(|t| format!("- {}", t.title))
                    .collect();
                let examples = if examples.is_empty() {
                    "暂无具体任务".to_string()
                } else {
                    examples.join("\n")
                };
                (
                    format!("存在{}项逾期任务待处理", stats.overdue_tasks.len()),
                    ["逾期任务示例：".to_string(), examples, format!("本周任务完成率：{rate}%")].join("\n"),
                    "把逾期任务拆成最小一步就好，我在这边给你兜底和鼓励。",
                )
            }
            ReminderType::WeeklyReport => (
                "本周学习周报已生成".to_string(),
                [
                    format!("本周学习天数：{}天", stats.recent_checkins.len()),
                    format!("本周累计学习：{hours}h"),
                    format!("任务完成率：{rate}%"),
                    format!("逾期任务：{}项", stats.overdue_tasks.len()),
                ]
                .join("\n"),
                "这一周的努力看得见，告诉你：我为你感到骄傲，也会继续陪你冲刺。",
            ),
        }
    }

    fn build_item(&self, supervisor: &Supervisor, kind: ReminderType) -> SupervisorReminderItem {
        let period = self.period(kind);
        let (reason, details, suggestion) = self.content(kind);
        let msg = format_supervisor_email(self.state, supervisor, kind, self.now, &reason, &details, suggestion);
        SupervisorReminderItem {
            id: item_id(&supervisor.id, kind, period),
            kind,
            supervisor_id: supervisor.id.clone(),
            supervisor_name: supervisor.name.clone(),
            to: supervisor.email.trim().to_string(),
            subject: msg.subject,
            body: msg.body,
            reason,
            scheduled_for: period,
        }
    }
}

/// Reminders that are due at `now` and not yet marked in the log.
///
/// Order: supervisors in profile order; per supervisor daily_cutoff,
/// missed_days, overdue_tasks, weekly_report.
pub fn pending_supervisor_reminders(state: &AppState, now: NaiveDateTime) -> Vec<SupervisorReminderItem> {
    let Some(settings) = state.profile.supervisor_reminder_settings.as_ref() else {
        log::debug!("supervisor reminders disabled: no settings");
        return vec![];
    };
    let supervisors: Vec<&Supervisor> = state.profile.supervisors.iter().filter(|s| s.is_reachable()).collect();
    if supervisors.is_empty() || !settings.any_enabled() {
        return vec![];
    }

    let snap = Snapshot::new(state, settings, now);
    let due: Vec<ReminderType> = ReminderType::ALL
        .into_iter()
        .filter(|k| k.enabled_in(settings) && snap.is_due(*k))
        .collect();
    if due.is_empty() {
        return vec![];
    }

    let empty = SupervisorReminderLogEntry::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for supervisor in supervisors {
        let sent = state
            .runtime
            .supervisor_reminder_log
            .get(&supervisor.id)
            .unwrap_or(&empty);

        for &kind in &due {
            let period = snap.period(kind);
            if sent.already_sent(kind, period) {
                log::debug!("skip {kind} for {}: already sent for {period}", supervisor.id);
                continue;
            }
            if !seen.insert(item_id(&supervisor.id, kind, period)) {
                continue;
            }
            out.push(snap.build_item(supervisor, kind));
        }
    }

    out
}

/// Commit "handled" for an item into the per-supervisor log.
pub fn mark_sent(
    reminder_log: &mut BTreeMap<String, SupervisorReminderLogEntry>,
    item: &SupervisorReminderItem,
) -> Result<()> {
    let mut entry = reminder_log.get(&item.supervisor_id).cloned().unwrap_or_default();
    entry.record(item.kind, item.scheduled_for)?;
    reminder_log.insert(item.supervisor_id.clone(), entry);
    log::info!("marked {} as sent", item.id);
    Ok(())
}

/// Drop repeated ids, keeping the first occurrence. For callers that merge
/// several evaluation passes before committing.
pub fn dedup_by_id(items: Vec<SupervisorReminderItem>) -> Vec<SupervisorReminderItem> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.id.clone())).collect()
}
