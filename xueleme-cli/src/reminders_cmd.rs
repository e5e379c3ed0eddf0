use anyhow::{Result, bail};
use clap::Subcommand;
use std::collections::HashSet;
use std::time::Duration;
use xueleme_core::{
    AppState, ReminderSettings, SupervisorReminderItem, TimeOfDay, clipboard_text, dedup_by_id,
    local_now, mailto_uri, mark_sent, pending_supervisor_reminders,
};

use crate::config::Config;
use crate::mail::open_mail_client;
use crate::state::{load_state, save_state};

const WEEKDAYS: [&str; 7] = ["周日", "周一", "周二", "周三", "周四", "周五", "周六"];

#[derive(Subcommand, Debug)]
pub enum RemindersCommand {
    /// List supervisor reminders that are due now
    Pending,

    /// Open the reminder in the default mail client, then mark it sent
    Send {
        /// Reminder id, or its 1-based position in `pending`
        id: String,
    },

    /// Print subject + body for pasting elsewhere
    Copy {
        id: String,

        /// Also mark the reminder as sent
        #[arg(long, default_value_t = false)]
        mark: bool,
    },

    /// Mark a reminder as handled without opening mail
    Mark { id: String },

    /// Show or change which reminders are enabled
    Settings {
        #[arg(long)]
        daily: Option<bool>,

        #[arg(long)]
        missed: Option<bool>,

        #[arg(long)]
        overdue: Option<bool>,

        #[arg(long)]
        weekly: Option<bool>,

        /// Weekly report day, 0 = Sunday .. 6 = Saturday
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=6))]
        weekly_day: Option<u8>,

        /// Weekly report time, HH:MM
        #[arg(long)]
        weekly_time: Option<String>,

        /// Turn supervisor reminders off entirely
        #[arg(long, default_value_t = false, conflicts_with_all = ["daily", "missed", "overdue", "weekly", "weekly_day", "weekly_time"])]
        off: bool,
    },

    /// Re-evaluate on a fixed tick and print reminders as they become due
    Watch {
        /// Seconds between evaluations (default from config.watch.interval_secs)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

pub async fn run(cmd: RemindersCommand, cfg: &Config) -> Result<()> {
    match cmd {
        RemindersCommand::Pending => pending(cfg),
        RemindersCommand::Send { id } => send(cfg, &id),
        RemindersCommand::Copy { id, mark } => copy(cfg, &id, mark),
        RemindersCommand::Mark { id } => mark(cfg, &id),
        RemindersCommand::Settings {
            daily,
            missed,
            overdue,
            weekly,
            weekly_day,
            weekly_time,
            off,
        } => settings(daily, missed, overdue, weekly, weekly_day, weekly_time, off),
        RemindersCommand::Watch { interval_secs } => {
            watch(cfg, interval_secs.unwrap_or(cfg.watch.interval_secs)).await
        }
    }
}

fn evaluate(state: &AppState, cfg: &Config) -> Result<Vec<SupervisorReminderItem>> {
    let now = local_now(&cfg.general.timezone)?;
    Ok(pending_supervisor_reminders(state, now))
}

fn find_item(items: Vec<SupervisorReminderItem>, key: &str) -> Result<SupervisorReminderItem> {
    if let Ok(n) = key.parse::<usize>() {
        if let Some(item) = n.checked_sub(1).and_then(|i| items.get(i)) {
            return Ok(item.clone());
        }
    }
    match items.into_iter().find(|i| i.id == key) {
        Some(item) => Ok(item),
        None => bail!("no pending reminder {key} (already handled, or not due yet)"),
    }
}

fn print_item(n: usize, item: &SupervisorReminderItem) {
    let who = if item.supervisor_name.trim().is_empty() {
        "监督人"
    } else {
        item.supervisor_name.as_str()
    };
    println!(
        "{n}. [{}] {who} <{}> {}\n   id: {}",
        item.kind.label(),
        item.to,
        item.reason,
        item.id
    );
}

fn pending(cfg: &Config) -> Result<()> {
    let state = load_state()?;
    let items = evaluate(&state, cfg)?;
    if items.is_empty() {
        println!("暂无待发送提醒 (no pending reminders)");
        return Ok(());
    }
    println!("待发送 {}\n", items.len());
    for (i, item) in items.iter().enumerate() {
        print_item(i + 1, item);
    }
    Ok(())
}

fn commit(state: &mut AppState, item: &SupervisorReminderItem) -> Result<()> {
    mark_sent(&mut state.runtime.supervisor_reminder_log, item)?;
    save_state(state)
}

fn send(cfg: &Config, key: &str) -> Result<()> {
    let mut state = load_state()?;
    let item = find_item(evaluate(&state, cfg)?, key)?;

    open_mail_client(&mailto_uri(&item.to, &item.subject, &item.body), cfg.mail.opener.as_deref())?;
    commit(&mut state, &item)?;

    println!("已打开邮件发送窗口: {}：{}", item.supervisor_name, item.reason);
    Ok(())
}

fn copy(cfg: &Config, key: &str, and_mark: bool) -> Result<()> {
    let mut state = load_state()?;
    let item = find_item(evaluate(&state, cfg)?, key)?;
    println!("{}", clipboard_text(&item));
    if and_mark {
        commit(&mut state, &item)?;
        eprintln!("marked {} as sent", item.id);
    }
    Ok(())
}

fn mark(cfg: &Config, key: &str) -> Result<()> {
    let mut state = load_state()?;
    let item = find_item(evaluate(&state, cfg)?, key)?;
    commit(&mut state, &item)?;
    println!("Marked {} as sent ({})", item.id, item.scheduled_for);
    Ok(())
}

fn settings(
    daily: Option<bool>,
    missed: Option<bool>,
    overdue: Option<bool>,
    weekly: Option<bool>,
    weekly_day: Option<u8>,
    weekly_time: Option<String>,
    off: bool,
) -> Result<()> {
    let mut state = load_state()?;
    let changed = off
        || daily.is_some()
        || missed.is_some()
        || overdue.is_some()
        || weekly.is_some()
        || weekly_day.is_some()
        || weekly_time.is_some();

    if off {
        state.profile.supervisor_reminder_settings = None;
    } else if changed {
        let mut s = state
            .profile
            .supervisor_reminder_settings
            .take()
            .unwrap_or_default();
        if let Some(v) = daily {
            s.daily_cutoff_reminder_enabled = v;
        }
        if let Some(v) = missed {
            s.missed_days_reminder_enabled = v;
        }
        if let Some(v) = overdue {
            s.overdue_tasks_reminder_enabled = v;
        }
        if let Some(v) = weekly {
            s.weekly_report_enabled = v;
        }
        if let Some(d) = weekly_day {
            s.weekly_report_day = d;
        }
        if let Some(t) = weekly_time {
            s.weekly_report_time = TimeOfDay::parse_strict(&t)?.to_string();
        }
        state.profile.supervisor_reminder_settings = Some(s.normalized());
    }

    if changed {
        save_state(&state)?;
    }
    print_settings(state.profile.supervisor_reminder_settings.as_ref());
    Ok(())
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

fn print_settings(settings: Option<&ReminderSettings>) {
    let Some(s) = settings else {
        println!("Supervisor reminders: off");
        println!("Enable with: xueleme reminders settings --daily true");
        return;
    };
    println!("Supervisor reminders:\n");
    println!("- 每日截止提醒 (daily): {}", on_off(s.daily_cutoff_reminder_enabled));
    println!("- 缺卡提醒 (missed): {}", on_off(s.missed_days_reminder_enabled));
    println!("- 任务逾期提醒 (overdue): {}", on_off(s.overdue_tasks_reminder_enabled));
    println!(
        "- 周报提醒 (weekly): {} on {} at {}",
        on_off(s.weekly_report_enabled),
        WEEKDAYS[usize::from(s.weekly_report_day % 7)],
        s.weekly_report_time
    );
}

async fn watch(cfg: &Config, interval_secs: u64) -> Result<()> {
    let period = Duration::from_secs(interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    let mut shown: HashSet<String> = HashSet::new();

    println!("Watching for supervisor reminders every {}s (Ctrl-C to stop)", period.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Re-read each tick: other invocations may have marked items sent.
                let state = load_state()?;
                let items = dedup_by_id(evaluate(&state, cfg)?);
                let live: HashSet<String> = items.iter().map(|i| i.id.clone()).collect();
                for (i, item) in items.iter().enumerate() {
                    if shown.insert(item.id.clone()) {
                        print_item(i + 1, item);
                    }
                }
                shown.retain(|id| live.contains(id));
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopped.");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xueleme_core::{PeriodKey, ReminderType};

    fn item(id: &str) -> SupervisorReminderItem {
        SupervisorReminderItem {
            id: id.to_string(),
            kind: ReminderType::DailyCutoff,
            supervisor_id: "sup_1".to_string(),
            supervisor_name: "妈妈".to_string(),
            to: "mom@example.com".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
            reason: "r".to_string(),
            scheduled_for: PeriodKey::Day("2024-03-04".parse().unwrap()),
        }
    }

    #[test]
    fn find_by_position_or_id() {
        let items = vec![item("a"), item("b")];
        assert_eq!(find_item(items.clone(), "2").unwrap().id, "b");
        assert_eq!(find_item(items.clone(), "a").unwrap().id, "a");
        assert!(find_item(items.clone(), "0").is_err());
        assert!(find_item(items, "zzz").is_err());
    }
}
