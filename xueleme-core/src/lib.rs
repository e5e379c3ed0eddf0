//! xueleme-core: study check-ins, tasks and supervisor reminders.
//!
//! Everything here is pure: no I/O, no clock reads except through
//! [`time::local_now`]. The host application owns persistence and calls
//! [`reminders::mark_sent`] when the user acts on a reminder.

pub mod checkin;
pub mod message;
pub mod profile;
pub mod reminders;
pub mod state;
pub mod stats;
pub mod task;
pub mod time;

pub use checkin::{CheckinOutcome, CheckinRecord, checkin_note, next_streak};
pub use message::{EmailMessage, clipboard_text, format_supervisor_email, mailto_uri};
pub use profile::{Profile, ReminderSettings, Supervisor, is_valid_email};
pub use reminders::{
    ReminderType, SupervisorReminderItem, SupervisorReminderLogEntry, dedup_by_id, mark_sent,
    pending_supervisor_reminders,
};
pub use state::{AppState, RuntimeState};
pub use stats::{WeeklyStats, weekly_stats};
pub use task::{Task, TaskStatus};
pub use time::{DayKey, PeriodKey, TimeOfDay, WeekId, days_between, local_now};
