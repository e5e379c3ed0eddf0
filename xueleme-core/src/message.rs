//! Supervisor email templates and the mail-compose hand-off.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::profile::Supervisor;
use crate::reminders::{ReminderType, SupervisorReminderItem};
use crate::state::AppState;

pub const DEFAULT_SENDER_EMAIL: &str = "hillmis@qq.com";
pub const DEFAULT_SENDER_NAME: &str = "学了么监督系统";
pub const DEFAULT_STUDENT_NAME: &str = "学霸";
pub const DEFAULT_SUPERVISOR_LABEL: &str = "监督人";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

pub fn student_name(state: &AppState) -> &str {
    or_default(&state.profile.name, DEFAULT_STUDENT_NAME)
}

/// Local timestamp in the `2024/3/4 23:05:00` shape used in message bodies.
pub fn format_timestamp(now: NaiveDateTime) -> String {
    now.format("%Y/%-m/%-d %H:%M:%S").to_string()
}

pub fn format_supervisor_email(
    state: &AppState,
    supervisor: &Supervisor,
    kind: ReminderType,
    now: NaiveDateTime,
    reason: &str,
    details: &str,
    suggestion: &str,
) -> EmailMessage {
    let sender_email = or_default(&state.profile.supervisor_sender_email, DEFAULT_SENDER_EMAIL);
    let sender_name = or_default(&state.profile.supervisor_sender_name, DEFAULT_SENDER_NAME);
    let student = student_name(state);
    let greeting = or_default(&supervisor.name, DEFAULT_SUPERVISOR_LABEL);

    let prefix = match kind {
        ReminderType::WeeklyReport => "周报",
        _ => "提醒",
    };
    let subject = format!("【学了么{prefix}】{student}学习进展");

    let body = [
        format!("{greeting}你好："),
        String::new(),
        format!("这里是{sender_name}（发送账号：{sender_email}）。我正在协助监督【{student}】的学习进展。"),
        String::new(),
        format!("【提醒对象】{student}"),
        format!("【提醒原因】{reason}"),
        format!("【当前时间】{}", format_timestamp(now)),
        String::new(),
        details.to_string(),
        String::new(),
        format!("如果你方便，可以给{student}一条温柔但坚定的鼓励："),
        format!("“{suggestion}”"),
        String::new(),
        "感谢你的陪伴与监督。".to_string(),
        format!("— {sender_name}"),
    ]
    .join("\n");

    EmailMessage { subject, body }
}

/// Percent-encode like JavaScript's `encodeURIComponent`.
pub fn encode_uri_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// `mailto:` URI for the platform's default mail client.
pub fn mailto_uri(to: &str, subject: &str, body: &str) -> String {
    format!(
        "mailto:{}?subject={}&body={}",
        encode_uri_component(to),
        encode_uri_component(subject),
        encode_uri_component(body)
    )
}

/// Plain-text form for pasting into any messenger.
pub fn clipboard_text(item: &SupervisorReminderItem) -> String {
    format!("主题：{}\n\n{}", item.subject, item.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(23, 5, 0).unwrap()
    }

    #[test]
    fn defaults_fill_empty_names() {
        let st = AppState::default();
        let sup = Supervisor::new("s1", "", "coach@example.com");
        let msg = format_supervisor_email(&st, &sup, ReminderType::DailyCutoff, now(), "原因", "细节", "加油");
        assert_eq!(msg.subject, "【学了么提醒】学霸学习进展");
        assert!(msg.body.starts_with("监督人你好：\n\n这里是学了么监督系统（发送账号：hillmis@qq.com）。"));
        assert!(msg.body.contains("【当前时间】2024/3/4 23:05:00"));
        assert!(msg.body.contains("\n细节\n"));
        assert!(msg.body.contains("“加油”"));
        assert!(msg.body.ends_with("— 学了么监督系统"));
    }

    #[test]
    fn weekly_subject_and_custom_sender() {
        let mut st = AppState::default();
        st.profile.name = "小明".to_string();
        st.profile.supervisor_sender_name = "小明的助手".to_string();
        st.profile.supervisor_sender_email = "me@example.com".to_string();
        let sup = Supervisor::new("s1", "王老师", "wang@example.com");
        let msg = format_supervisor_email(&st, &sup, ReminderType::WeeklyReport, now(), "r", "d", "s");
        assert_eq!(msg.subject, "【学了么周报】小明学习进展");
        assert!(msg.body.starts_with("王老师你好："));
        assert!(msg.body.contains("这里是小明的助手（发送账号：me@example.com）"));
        assert!(msg.body.contains("【提醒对象】小明"));
    }

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(encode_uri_component("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(encode_uri_component("it's (ok)!*~"), "it's%20(ok)!*~");
        assert_eq!(encode_uri_component("学\n"), "%E5%AD%A6%0A");
        assert_eq!(
            mailto_uri("mom+x@example.com", "hi", "line1\nline2"),
            "mailto:mom%2Bx%40example.com?subject=hi&body=line1%0Aline2"
        );
    }
}
