use anyhow::{Result, bail};
use chrono::Utc;
use std::io::{self, BufRead, Write};
use xueleme_core::{AppState, Supervisor, is_valid_email};

use crate::state::{load_state, save_state, state_path};

fn prompt(input: &mut impl BufRead, label: &str, current: &str) -> Result<String> {
    if current.is_empty() {
        print!("{}: ", label);
    } else {
        print!("{} [{}]: ", label, current);
    }
    io::stdout().flush().ok();
    let mut s = String::new();
    if input.read_line(&mut s)? == 0 {
        bail!("setup aborted: input closed at \"{label}\"");
    }
    let s = s.trim();
    Ok(if s.is_empty() { current.to_string() } else { s.to_string() })
}

/// Re-prompt until `apply` accepts the answer.
fn prompt_until(
    input: &mut impl BufRead,
    label: &str,
    current: &str,
    mut apply: impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    loop {
        let answer = prompt(input, label, current)?;
        match apply(&answer) {
            Ok(()) => return Ok(()),
            Err(e) => println!("  {e}"),
        }
    }
}

pub fn run_setup() -> Result<()> {
    println!("学了么 setup\n");
    let mut state = load_state()?;
    configure_profile(&mut io::stdin().lock(), &mut state)?;
    save_state(&state)?;

    println!("\nWrote {}", state_path()?.display());
    println!("\nNext recommended steps:");
    println!("- xueleme task add \"高数第三章\" --due 2024-03-08");
    println!("- xueleme checkin --minutes 45 --note \"今天的总结\"");
    println!("- xueleme reminders pending");
    Ok(())
}

fn configure_profile(input: &mut impl BufRead, state: &mut AppState) -> Result<()> {
    let p = &mut state.profile;

    p.name = prompt(input, "Your name (optional)", &p.name)?;

    let cutoff = p.cutoff.clone();
    prompt_until(input, "Daily check-in cutoff (HH:MM)", &cutoff, |a| p.set_cutoff(a))?;

    let threshold = p.miss_days_threshold.to_string();
    prompt_until(input, "Alert supervisors after how many missed days", &threshold, |a| {
        p.set_miss_days_threshold(a.parse()?)
    })?;

    p.supervisor_sender_name = prompt(input, "Sender name shown in reminders (optional)", &p.supervisor_sender_name)?;
    let sender_email = p.supervisor_sender_email.clone();
    prompt_until(input, "Sender email shown in reminders (optional)", &sender_email, |a| {
        if !a.is_empty() && !is_valid_email(a) {
            bail!("invalid email: {a}");
        }
        p.supervisor_sender_email = a.to_string();
        Ok(())
    })?;

    if p.supervisors.is_empty() {
        let mut email = String::new();
        prompt_until(input, "Supervisor email (optional, blank to skip)", "", |a| {
            if !a.is_empty() && !is_valid_email(a) {
                bail!("invalid email: {a}");
            }
            email = a.to_string();
            Ok(())
        })?;
        if !email.is_empty() {
            let name = prompt(input, "Supervisor name", "")?;
            let relation = prompt(input, "Relation (e.g. 家人/老师/朋友)", "")?;
            let id = p.next_supervisor_id(Utc::now());
            p.add_supervisor(Supervisor::new(id, name, email).with_relation(relation))?;
        }
    }

    Ok(())
}
