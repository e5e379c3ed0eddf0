use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use xueleme_core::time::{parse_timezone, to_local};
use xueleme_core::{AppState, DayKey, Supervisor, Task, TaskStatus, weekly_stats};

mod config;
mod mail;
mod reminders_cmd;
mod setup;
mod state;

use config::Config;
use reminders_cmd::RemindersCommand;
use state::{load_state, save_state};

#[derive(Parser, Debug)]
#[command(
    name = "xueleme",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("XUELEME_BUILD_SHA"), ")"),
    about = "学了么: daily study check-ins, tasks and supervisor reminders"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive profile setup
    Setup,

    /// Today's status: check-in, cutoff, tasks waiting for the audit
    Today,

    /// Record today's check-in. Due tasks not passed with --done move to tomorrow.
    Checkin {
        #[arg(long)]
        minutes: u32,

        #[arg(long)]
        note: String,

        /// Id of a task finished today (repeatable)
        #[arg(long = "done")]
        done: Vec<String>,
    },

    /// To-do list
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// People who receive reminder emails
    Supervisor {
        #[command(subcommand)]
        command: SupervisorCommand,
    },

    /// Supervisor reminders
    Reminders {
        #[command(subcommand)]
        command: RemindersCommand,
    },

    /// Last-7-days statistics
    Stats,

    /// Show or change profile settings
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// ~/.xueleme/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Write the full state as JSON (default: ./xueleme_backup_<date>.json)
    Export { path: Option<PathBuf> },

    /// Replace the current state with a JSON backup
    Import { path: PathBuf },

    /// Delete all records
    Reset {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    Add {
        title: String,

        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<String>,

        #[arg(long, default_value = "")]
        desc: String,
    },

    List {
        /// Include finished tasks
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Flip between todo and done
    Toggle { id: String },

    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum SupervisorCommand {
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, default_value = "")]
        relation: String,
    },

    List,

    Edit {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        relation: Option<String>,
    },

    Enable { id: String },

    Disable { id: String },

    Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show,

    Set {
        #[arg(long)]
        name: Option<String>,

        /// Daily cutoff, HH:MM
        #[arg(long)]
        cutoff: Option<String>,

        /// Days without a check-in before supervisors are alerted
        #[arg(long)]
        miss_days: Option<u32>,

        #[arg(long)]
        sender_name: Option<String>,

        #[arg(long)]
        sender_email: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config.toml if none exists
    Init,
    Show,
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// (local wall clock, UTC) for the same instant.
fn clock(cfg: &Config) -> Result<(NaiveDateTime, DateTime<Utc>)> {
    let tz = parse_timezone(&cfg.general.timezone)?;
    let utc = Utc::now();
    Ok((to_local(utc, tz), utc))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config();
    init_logging(
        cfg.as_ref()
            .map(|c| c.general.log_level.as_str())
            .unwrap_or("warn"),
    );
    let cfg = cfg?;

    match cli.command {
        Command::Setup => setup::run_setup()?,
        Command::Today => today(&cfg)?,
        Command::Checkin {
            minutes,
            note,
            done,
        } => checkin(&cfg, minutes, &note, &done)?,
        Command::Task { command } => task(&cfg, command)?,
        Command::Supervisor { command } => supervisor(command)?,
        Command::Reminders { command } => reminders_cmd::run(command, &cfg).await?,
        Command::Stats => stats(&cfg)?,
        Command::Profile { command } => profile(command)?,
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => config::show_config()?,
        },
        Command::Export { path } => {
            let st = load_state()?;
            let (now, _) = clock(&cfg)?;
            let dest = path.unwrap_or_else(|| PathBuf::from(state::default_export_name(DayKey::of(now))));
            state::export_state(&st, &dest)?;
            println!("导出成功: {}", dest.display());
        }
        Command::Import { path } => {
            let st = state::import_state(&path)?;
            save_state(&st)?;
            println!(
                "导入成功: {} check-ins, {} tasks, {} supervisors",
                st.checkins.len(),
                st.tasks.len(),
                st.profile.supervisors.len()
            );
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("this deletes every record and cannot be undone; re-run with --yes");
            }
            state::clear_state()?;
            println!("数据已清空");
        }
    }

    Ok(())
}

fn today(cfg: &Config) -> Result<()> {
    let st = load_state()?;
    let (now, _) = clock(cfg)?;
    let day = DayKey::of(now);

    println!("# {day}\n");
    match st.checkins.get(&day) {
        Some(c) => println!("已打卡: {} 分钟", c.minutes),
        None => {
            let cutoff = st.profile.cutoff_time();
            if now >= cutoff.on(now) {
                println!("未打卡 (已过截止时间 {cutoff})");
            } else {
                println!("未打卡 (截止 {cutoff})");
            }
        }
    }
    println!("连续打卡: {} 天", st.profile.streak);

    let audit = st.audit_candidates(day);
    if audit.is_empty() {
        println!("\n没有需要核销的任务");
    } else {
        println!("\n打卡时需要核销的任务 (pass --done <id> to checkin, the rest move to tomorrow):");
        for t in audit {
            print_task(t);
        }
    }
    Ok(())
}

fn checkin(cfg: &Config, minutes: u32, note: &str, done: &[String]) -> Result<()> {
    let mut st = load_state()?;
    let (now, utc) = clock(cfg)?;

    for id in done {
        if !st.tasks.contains_key(id) {
            bail!("no task with id {id}");
        }
    }

    let out = st.check_in(now, utc, minutes, note, done)?;
    save_state(&st)?;

    let postponed = if out.postponed.is_empty() {
        String::new()
    } else {
        format!("，{} 个未完任务已顺延", out.postponed.len())
    };
    println!("打卡成功！今日已学 {minutes} 分钟{postponed}");
    println!("连续打卡: {} 天", out.streak);
    Ok(())
}

fn print_task(t: &Task) {
    let mark = match t.status {
        TaskStatus::Done => "x",
        TaskStatus::Todo => " ",
    };
    let due = t.due_date.map(|d| format!(" (due {d})")).unwrap_or_default();
    println!("- [{mark}] {}  {}{}", t.id, t.title, due);
    if !t.desc.trim().is_empty() {
        println!("      {}", t.desc.trim());
    }
}

fn task(cfg: &Config, cmd: TaskCommand) -> Result<()> {
    let mut st = load_state()?;
    let (_, utc) = clock(cfg)?;

    match cmd {
        TaskCommand::Add { title, due, desc } => {
            let id = st.next_task_id(utc);
            let mut t = Task::new(id.clone(), title.trim(), utc).with_desc(desc);
            if let Some(due) = due {
                let day: DayKey = due.parse().with_context(|| format!("--due {due}"))?;
                t = t.with_due(day);
            }
            st.add_task(t)?;
            save_state(&st)?;
            println!("Added {id}");
        }
        TaskCommand::List { all } => {
            let mut tasks: Vec<&Task> = st.tasks.values().filter(|t| all || !t.is_done()).collect();
            // todo first, newest first within each group
            tasks.sort_by(|a, b| {
                a.is_done()
                    .cmp(&b.is_done())
                    .then_with(|| b.created_at.cmp(&a.created_at))
            });
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for t in tasks {
                print_task(t);
            }
        }
        TaskCommand::Toggle { id } => {
            let t = st.toggle_task(&id, utc)?;
            let status = if t.is_done() { "done" } else { "todo" };
            println!("{id} -> {status}");
            save_state(&st)?;
        }
        TaskCommand::Delete { id } => {
            let t = st.delete_task(&id)?;
            save_state(&st)?;
            println!("Deleted {} ({})", t.id, t.title);
        }
    }
    Ok(())
}

fn supervisor(cmd: SupervisorCommand) -> Result<()> {
    let mut st = load_state()?;

    match cmd {
        SupervisorCommand::Add {
            name,
            email,
            relation,
        } => {
            let id = st.profile.next_supervisor_id(Utc::now());
            st.profile
                .add_supervisor(Supervisor::new(id.clone(), name, email.trim()).with_relation(relation))?;
            save_state(&st)?;
            println!("Added supervisor {id}");
        }
        SupervisorCommand::List => {
            if st.profile.supervisors.is_empty() {
                println!("No supervisors. Add one with: xueleme supervisor add --name <n> --email <e>");
            }
            for s in &st.profile.supervisors {
                let state = if s.is_reachable() {
                    "on"
                } else if s.enabled {
                    "no email"
                } else {
                    "off"
                };
                let relation = if s.relation.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", s.relation)
                };
                println!("- {} [{state}] {}{} <{}>", s.id, s.name, relation, s.email);
            }
        }
        SupervisorCommand::Edit {
            id,
            name,
            email,
            relation,
        } => {
            st.profile.update_supervisor(&id, |s| {
                if let Some(v) = name {
                    s.name = v;
                }
                if let Some(v) = email {
                    s.email = v.trim().to_string();
                }
                if let Some(v) = relation {
                    s.relation = v;
                }
            })?;
            save_state(&st)?;
            println!("Updated {id}");
        }
        SupervisorCommand::Enable { id } => {
            st.profile.set_supervisor_enabled(&id, true)?;
            save_state(&st)?;
            println!("Enabled {id}");
        }
        SupervisorCommand::Disable { id } => {
            st.profile.set_supervisor_enabled(&id, false)?;
            save_state(&st)?;
            println!("Disabled {id}");
        }
        SupervisorCommand::Remove { id } => {
            let s = st.profile.remove_supervisor(&id)?;
            // the log entry is only meaningful while the supervisor exists
            st.runtime.supervisor_reminder_log.remove(&id);
            save_state(&st)?;
            println!("Removed {} ({})", s.id, s.name);
        }
    }
    Ok(())
}

fn stats(cfg: &Config) -> Result<()> {
    let st = load_state()?;
    let (now, _) = clock(cfg)?;
    print_stats(&st, now);
    Ok(())
}

fn print_stats(st: &AppState, now: NaiveDateTime) {
    let w = weekly_stats(st, now);

    println!("# 学习统计 ({})\n", w.today);
    println!("- 连续打卡: {} 天", st.profile.streak);
    println!(
        "- 累计: {} 分钟, {} 次打卡",
        st.total_minutes(),
        st.checkins.len()
    );
    println!(
        "- 近 7 天: {} 分钟 ({}h), {} 天打卡",
        w.total_minutes,
        w.total_hours(),
        w.recent_checkins.len()
    );
    println!(
        "- 任务: {}/{} 完成 ({}%), {} 项逾期",
        w.done_tasks,
        w.total_tasks,
        w.completion_rate,
        w.overdue_tasks.len()
    );

    println!();
    for offset in (0..7).rev() {
        let day = w.today.add_days(-offset);
        let minutes = st.checkins.get(&day).map(|c| c.minutes).unwrap_or(0);
        let bar = "#".repeat((minutes / 15) as usize);
        println!("{}  {:>4}  {}", day.date().format("%m/%d"), minutes, bar);
    }
}

fn profile(cmd: ProfileCommand) -> Result<()> {
    let mut st = load_state()?;

    match cmd {
        ProfileCommand::Show => {
            let p = &st.profile;
            println!("name: {}", if p.name.is_empty() { "<unset>" } else { &p.name });
            println!("cutoff: {}", p.cutoff);
            println!("miss_days_threshold: {}", p.miss_days_threshold);
            println!(
                "last_checkin_date: {}",
                p.last_checkin_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "暂无".to_string())
            );
            println!("streak: {}", p.streak);
            println!("sender: {} <{}>", p.supervisor_sender_name, p.supervisor_sender_email);
            println!("supervisors: {}", p.supervisors.len());
        }
        ProfileCommand::Set {
            name,
            cutoff,
            miss_days,
            sender_name,
            sender_email,
        } => {
            let p = &mut st.profile;
            if let Some(v) = name {
                p.name = v.trim().to_string();
            }
            if let Some(v) = cutoff {
                p.set_cutoff(&v)?;
            }
            if let Some(v) = miss_days {
                p.set_miss_days_threshold(v)?;
            }
            if let Some(v) = sender_name {
                p.supervisor_sender_name = v.trim().to_string();
            }
            if let Some(v) = sender_email {
                let v = v.trim();
                if !v.is_empty() && !xueleme_core::is_valid_email(v) {
                    bail!("invalid sender email: {v}");
                }
                p.supervisor_sender_email = v.to_string();
            }
            save_state(&st)?;
            println!("Profile updated");
        }
    }
    Ok(())
}
