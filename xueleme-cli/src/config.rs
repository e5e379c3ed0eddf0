use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_xueleme_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralSection,
    pub mail: MailSection,
    pub watch: WatchSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSection {
    /// IANA timezone every day key is computed in.
    pub timezone: String,
    /// Default log filter when RUST_LOG is unset.
    pub log_level: String,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            timezone: "Asia/Shanghai".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSection {
    /// Command that opens a mailto: URI. Auto-detected when unset.
    pub opener: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    pub interval_secs: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_xueleme_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", p.display()))?;
    xueleme_core::time::parse_timezone(&cfg.general.timezone)
        .with_context(|| format!("[general].timezone in {}", p.display()))?;
    Ok(cfg)
}

pub fn save_config_to(p: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&p, &Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let p = config_path()?;
    let cfg = load_config_from(&p)?;
    println!("Config: {}{}\n", p.display(), if p.exists() { "" } else { " (defaults)" });
    println!("- timezone: {}", cfg.general.timezone);
    println!("- log_level: {}", cfg.general.log_level);
    println!(
        "- mail opener: {}",
        cfg.mail.opener.as_deref().unwrap_or("<auto-detect>")
    );
    println!("- watch interval: {}s", cfg.watch.interval_secs);
    Ok(())
}
