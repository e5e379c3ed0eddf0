use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use xueleme_core::AppState;

/// `$XUELEME_HOME`, or `~/.xueleme`.
pub fn xueleme_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("XUELEME_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".xueleme"))
}

pub fn ensure_xueleme_home() -> Result<PathBuf> {
    let dir = xueleme_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn state_path() -> Result<PathBuf> {
    Ok(ensure_xueleme_home()?.join("state.json"))
}

pub fn load_state() -> Result<AppState> {
    load_state_from(&state_path()?)
}

pub fn save_state(state: &AppState) -> Result<()> {
    save_state_to(&state_path()?, state)
}

/// Missing file: default state. Unparseable file: moved aside to
/// `<name>.corrupt`, then default state.
pub fn load_state_from(p: &Path) -> Result<AppState> {
    if !p.exists() {
        return Ok(AppState::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    match serde_json::from_str::<AppState>(&s) {
        Ok(mut state) => {
            state.normalize();
            Ok(state)
        }
        Err(e) => {
            let backup = p.with_extension("json.corrupt");
            log::warn!(
                "could not parse {} ({e}); keeping a copy at {} and starting fresh",
                p.display(),
                backup.display()
            );
            fs::copy(p, &backup).with_context(|| format!("backup {}", backup.display()))?;
            Ok(AppState::default())
        }
    }
}

/// Write via a temp file + rename so a crash never leaves half a blob.
pub fn save_state_to(p: &Path, state: &AppState) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    let tmp = p.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, p).with_context(|| format!("rename {} -> {}", tmp.display(), p.display()))?;
    Ok(())
}

pub fn clear_state() -> Result<()> {
    let p = state_path()?;
    if p.exists() {
        fs::remove_file(&p).with_context(|| format!("remove {}", p.display()))?;
    }
    Ok(())
}

pub fn export_state(state: &AppState, dest: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    fs::write(dest, json).with_context(|| format!("write {}", dest.display()))?;
    Ok(())
}

/// Strict: unlike `load_state_from`, a bad import file is an error.
pub fn import_state(src: &Path) -> Result<AppState> {
    let s = fs::read_to_string(src).with_context(|| format!("read {}", src.display()))?;
    let mut state: AppState =
        serde_json::from_str(&s).with_context(|| format!("parse {} (文件格式有误)", src.display()))?;
    state.normalize();
    Ok(state)
}

/// `xueleme_backup_YYYY-MM-DD.json`
pub fn default_export_name(today: xueleme_core::DayKey) -> String {
    format!("xueleme_backup_{today}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use xueleme_core::Supervisor;

    #[test]
    fn missing_file_is_default_state() {
        let dir = tempfile::tempdir().unwrap();
        let st = load_state_from(&dir.path().join("state.json")).unwrap();
        assert_eq!(st, AppState::default());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("state.json");
        let mut st = AppState::default();
        st.profile.name = "小明".to_string();
        st.profile
            .add_supervisor(Supervisor::new("sup_1", "妈妈", "mom@example.com"))
            .unwrap();
        save_state_to(&p, &st).unwrap();
        assert!(!p.with_extension("json.tmp").exists());
        assert_eq!(load_state_from(&p).unwrap(), st);
    }

    #[test]
    fn corrupt_file_recovers_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("state.json");
        fs::write(&p, "{ not json").unwrap();
        let st = load_state_from(&p).unwrap();
        assert_eq!(st, AppState::default());
        assert_eq!(
            fs::read_to_string(dir.path().join("state.json.corrupt")).unwrap(),
            "{ not json"
        );
    }

    #[test]
    fn import_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("backup.json");
        fs::write(&p, "\"not a backup\"").unwrap();
        assert!(import_state(&p).is_err());
    }

    #[test]
    fn export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("backup.json");
        let mut st = AppState::default();
        st.profile.streak = 7;
        export_state(&st, &p).unwrap();
        assert_eq!(import_state(&p).unwrap().profile.streak, 7);
        assert_eq!(
            default_export_name("2024-03-04".parse().unwrap()),
            "xueleme_backup_2024-03-04.json"
        );
    }
}
