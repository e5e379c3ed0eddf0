use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Openers tried in order when config.toml has no `[mail].opener`.
const AUTO_OPENERS: &[&str] = if cfg!(target_os = "macos") {
    &["open"]
} else if cfg!(target_os = "windows") {
    &["explorer"]
} else {
    &["xdg-open", "gio"]
};

fn resolve_opener(configured: Option<&str>) -> Result<(PathBuf, Vec<String>)> {
    if let Some(cmd) = configured.map(str::trim).filter(|c| !c.is_empty()) {
        let mut parts = cmd.split_whitespace();
        let bin = parts.next().unwrap_or(cmd);
        let path = which::which(bin).with_context(|| format!("mail opener not found: {bin}"))?;
        return Ok((path, parts.map(str::to_string).collect()));
    }

    for bin in AUTO_OPENERS {
        if let Ok(path) = which::which(bin) {
            // `gio` needs the subcommand
            let args = if *bin == "gio" { vec!["open".to_string()] } else { vec![] };
            return Ok((path, args));
        }
    }

    log::warn!("none of {} is on PATH", AUTO_OPENERS.join(", "));
    bail!(
        "no mail opener found (tried {}). Set [mail].opener in config.toml or use `xueleme reminders copy`",
        AUTO_OPENERS.join(", ")
    );
}

/// Hand a mailto: URI to the desktop. Fire-and-forget: we only learn whether
/// the opener could be spawned, never whether mail was sent.
pub fn open_mail_client(uri: &str, configured: Option<&str>) -> Result<()> {
    let (bin, args) = resolve_opener(configured)?;
    log::debug!("opening mail client via {}", bin.display());

    Command::new(&bin)
        .args(&args)
        .arg(uri)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("running {}", bin.display()))?;

    Ok(())
}
