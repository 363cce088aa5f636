//! The `drun` mode: `.desktop` launchers found under
//! `$XDG_DATA_HOME/applications` and each `$XDG_DATA_DIRS/applications`
//! directory (later directories do not override entries seen earlier — the
//! first `Name=`/`Exec=` pair for a given file basename wins, matching the
//! usual XDG precedence of user data over system data).

use crate::{find_in_path, AcceptEvent, Mode, ModeResult, StateFlags};
use std::path::PathBuf;

#[derive(Debug, Clone)]
struct DesktopEntry {
    name: String,
    exec: String,
    icon: Option<String>,
    terminal: bool,
}

#[derive(Debug, Default)]
pub struct DrunMode {
    entries: Vec<DesktopEntry>,
}

impl DrunMode {
    pub fn new() -> Self {
        Self::default()
    }

    fn data_dirs() -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(home) = dirs::data_dir() {
            dirs.push(home);
        }
        let extra = std::env::var("XDG_DATA_DIRS").unwrap_or_else(|_| "/usr/local/share:/usr/share".to_string());
        dirs.extend(std::env::split_paths(&extra));
        dirs.into_iter().map(|d| d.join("applications")).collect()
    }

    /// Parse the `[Desktop Entry]` section only; other groups (Desktop
    /// Action subentries) are out of scope.
    fn parse_desktop_file(text: &str) -> Option<DesktopEntry> {
        let mut in_entry_group = false;
        let mut name = None;
        let mut exec = None;
        let mut icon = None;
        let mut terminal = false;
        let mut no_display = false;
        let mut hidden = false;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(group) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                in_entry_group = group == "Desktop Entry";
                continue;
            }
            if !in_entry_group {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else { continue };
            match key.trim() {
                "Name" => name = Some(value.trim().to_string()),
                "Exec" => exec = Some(value.trim().to_string()),
                "Icon" => icon = Some(value.trim().to_string()),
                "Terminal" => terminal = value.trim() == "true",
                "NoDisplay" => no_display = value.trim() == "true",
                "Hidden" => hidden = value.trim() == "true",
                _ => {}
            }
        }
        if no_display || hidden {
            return None;
        }
        Some(DesktopEntry { name: name?, exec: exec?, icon, terminal })
    }

    /// Strip the field-code placeholders (`%f %F %u %U %i %c %k`, ...) a
    /// desktop entry's `Exec=` may contain — this picker never passes files
    /// or URLs through, so every placeholder is simply dropped.
    fn strip_field_codes(exec: &str) -> String {
        let mut out = String::with_capacity(exec.len());
        let mut chars = exec.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '%' {
                chars.next();
                continue;
            }
            out.push(c);
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn scan() -> Vec<DesktopEntry> {
        let mut seen = std::collections::HashSet::new();
        let mut entries = Vec::new();
        for dir in Self::data_dirs() {
            let Ok(read_dir) = std::fs::read_dir(&dir) else { continue };
            for file in read_dir.flatten() {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                    continue;
                }
                let Some(basename) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                    continue;
                };
                if !seen.insert(basename) {
                    continue;
                }
                let Ok(text) = std::fs::read_to_string(&path) else { continue };
                if let Some(entry) = Self::parse_desktop_file(&text) {
                    entries.push(entry);
                }
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

impl Mode for DrunMode {
    fn name(&self) -> &str {
        "drun"
    }

    fn init(&mut self) -> anyhow::Result<()> {
        self.entries = Self::scan();
        Ok(())
    }

    fn num_entries(&self) -> u32 {
        self.entries.len() as u32
    }

    fn display(&self, idx: u32, want_text: bool) -> (Option<String>, StateFlags) {
        (want_text.then(|| self.entries[idx as usize].name.clone()), StateFlags::empty())
    }

    fn completion(&self, idx: u32) -> String {
        self.entries[idx as usize].name.clone()
    }

    fn result(&mut self, event: AcceptEvent, input: &str, idx: Option<u32>) -> ModeResult {
        if event == AcceptEvent::EntryDelete {
            return ModeResult::EntryDelete;
        }
        let Some(i) = idx else {
            return if input.is_empty() { ModeResult::Ok } else { ModeResult::CustomInput };
        };
        let entry = &self.entries[i as usize];
        let exec = Self::strip_field_codes(&entry.exec);
        if exec.is_empty() || find_in_path(exec.split_whitespace().next().unwrap_or("")).is_none() {
            tracing::warn!(exec, "desktop entry's command not found on PATH");
            return ModeResult::Ok;
        }
        let mut command = std::process::Command::new("sh");
        command.arg("-c").arg(&exec);
        match command.spawn() {
            Ok(_) => ModeResult::Exit,
            Err(e) => {
                tracing::warn!(exec, error = %e, "failed to launch desktop entry");
                ModeResult::Ok
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_exec_and_icon() {
        let text = "[Desktop Entry]\nType=Application\nName=Firefox\nExec=firefox %u\nIcon=firefox\n";
        let entry = DrunMode::parse_desktop_file(text).unwrap();
        assert_eq!(entry.name, "Firefox");
        assert_eq!(entry.exec, "firefox %u");
        assert_eq!(entry.icon.as_deref(), Some("firefox"));
        assert!(!entry.terminal);
    }

    #[test]
    fn no_display_entries_are_skipped() {
        let text = "[Desktop Entry]\nName=Hidden\nExec=true\nNoDisplay=true\n";
        assert!(DrunMode::parse_desktop_file(text).is_none());
    }

    #[test]
    fn ignores_groups_other_than_desktop_entry() {
        let text = "[Desktop Entry]\nName=App\nExec=app\n\n[Desktop Action new-window]\nExec=app --new-window\n";
        let entry = DrunMode::parse_desktop_file(text).unwrap();
        assert_eq!(entry.exec, "app");
    }

    #[test]
    fn strip_field_codes_drops_placeholders() {
        assert_eq!(DrunMode::strip_field_codes("firefox %u %U --flag"), "firefox --flag");
    }
}
