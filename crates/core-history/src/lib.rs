//! Per-mode most-recently-used history (§4.7).
//!
//! One file per mode under `$XDG_CACHE_HOME/rofi/` (falling back to
//! `~/.cache/rofi/` when the variable is unset), one entry per line,
//! most-recent first. Concurrent writers are not supported — `save`
//! overwrites the whole file, last writer wins, matching the upstream
//! implementation's lack of any file locking around history writes (unlike
//! the PID file, §11.1).

use std::path::{Path, PathBuf};

pub const DEFAULT_MAX: usize = 25;

#[derive(Debug)]
pub struct History {
    path: PathBuf,
    max: usize,
    entries: Vec<String>,
}

/// `$XDG_CACHE_HOME/rofi/<mode>`, falling back to `~/.cache/rofi/<mode>`.
pub fn cache_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("rofi");
        }
    }
    dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")).join("rofi")
}

pub fn path_for_mode(mode_name: &str) -> PathBuf {
    cache_dir().join(mode_name)
}

impl History {
    /// Load history for `mode_name` from the standard cache location. A
    /// missing file is not an error: it just means no history yet.
    pub fn load(mode_name: &str, max: usize) -> anyhow::Result<Self> {
        Self::load_from(path_for_mode(mode_name), max)
    }

    pub fn load_from(path: PathBuf, max: usize) -> anyhow::Result<Self> {
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => content.lines().map(str::to_string).take(max).collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e).map_err(anyhow::Error::from),
        };
        Ok(Self { path, max, entries })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert `entry` at the front, promoting it (removing any earlier
    /// occurrence found by linear scan) rather than duplicating it. A no-op
    /// if `entry` starts with one of `ignored_prefixes`.
    pub fn prepend_or_promote(&mut self, entry: &str, ignored_prefixes: &[String]) {
        if ignored_prefixes.iter().any(|p| !p.is_empty() && entry.starts_with(p.as_str())) {
            return;
        }
        if let Some(pos) = self.entries.iter().position(|e| e == entry) {
            self.entries.remove(pos);
        }
        self.entries.insert(0, entry.to_string());
        self.truncate(self.max);
    }

    pub fn truncate(&mut self, max: usize) {
        self.max = max;
        if self.entries.len() > max {
            self.entries.truncate(max);
        }
    }

    /// Write errors are the caller's problem to log and ignore (§7 kind 2,
    /// best-effort): history is a convenience, not load-bearing state.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, self.entries.join("\n") + "\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let h = History::load_from(dir.path().join("run"), DEFAULT_MAX).unwrap();
        assert!(h.entries().is_empty());
    }

    #[test]
    fn prepend_or_promote_moves_existing_entry_to_front() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = History::load_from(dir.path().join("run"), DEFAULT_MAX).unwrap();
        h.prepend_or_promote("a", &[]);
        h.prepend_or_promote("b", &[]);
        h.prepend_or_promote("a", &[]);
        assert_eq!(h.entries(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn truncate_enforces_max() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = History::load_from(dir.path().join("run"), 2).unwrap();
        h.prepend_or_promote("a", &[]);
        h.prepend_or_promote("b", &[]);
        h.prepend_or_promote("c", &[]);
        assert_eq!(h.entries(), &["c".to_string(), "b".to_string()]);
    }

    #[test]
    fn ignored_prefix_is_never_inserted() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = History::load_from(dir.path().join("run"), DEFAULT_MAX).unwrap();
        h.prepend_or_promote("secret-thing", &["secret-".to_string()]);
        assert!(h.entries().is_empty());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run");
        let mut h = History::load_from(path.clone(), DEFAULT_MAX).unwrap();
        h.prepend_or_promote("one", &[]);
        h.prepend_or_promote("two", &[]);
        h.save().unwrap();
        let reloaded = History::load_from(path, DEFAULT_MAX).unwrap();
        assert_eq!(reloaded.entries(), h.entries());
    }
}
