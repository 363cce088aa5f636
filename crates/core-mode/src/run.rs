//! The `run` mode: every executable found on `$PATH`, deduplicated and
//! sorted, launched via `sh -c` on accept.

use crate::{AcceptEvent, Mode, ModeResult, StateFlags};
use std::os::unix::fs::PermissionsExt;

#[derive(Debug, Default)]
pub struct RunMode {
    entries: Vec<String>,
}

impl RunMode {
    pub fn new() -> Self {
        Self::default()
    }

    fn scan_path() -> Vec<String> {
        let Some(path) = std::env::var_os("PATH") else {
            return Vec::new();
        };
        let mut names = std::collections::BTreeSet::new();
        for dir in std::env::split_paths(&path) {
            let Ok(read_dir) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in read_dir.flatten() {
                let Ok(meta) = entry.metadata() else { continue };
                if !meta.is_file() && !meta.is_symlink() {
                    continue;
                }
                if meta.permissions().mode() & 0o111 == 0 {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    names.insert(name.to_string());
                }
            }
        }
        names.into_iter().collect()
    }
}

impl Mode for RunMode {
    fn name(&self) -> &str {
        "run"
    }

    fn init(&mut self) -> anyhow::Result<()> {
        self.entries = Self::scan_path();
        Ok(())
    }

    fn num_entries(&self) -> u32 {
        self.entries.len() as u32
    }

    fn display(&self, idx: u32, want_text: bool) -> (Option<String>, StateFlags) {
        let text = want_text.then(|| self.entries[idx as usize].clone());
        (text, StateFlags::empty())
    }

    fn completion(&self, idx: u32) -> String {
        self.entries[idx as usize].clone()
    }

    fn result(&mut self, event: AcceptEvent, input: &str, idx: Option<u32>) -> ModeResult {
        let command = match (event, idx) {
            (AcceptEvent::EntryDelete, _) => return ModeResult::EntryDelete,
            (AcceptEvent::Ok, Some(i)) => self.entries[i as usize].clone(),
            _ => input.to_string(),
        };
        if command.is_empty() {
            return ModeResult::Ok;
        }
        match std::process::Command::new("sh").arg("-c").arg(&command).spawn() {
            Ok(_) => ModeResult::Exit,
            Err(e) => {
                tracing::warn!(command, error = %e, "failed to launch command");
                ModeResult::Ok
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_returns_the_raw_entry() {
        let mode = RunMode { entries: vec!["firefox".to_string()] };
        assert_eq!(mode.completion(0), "firefox");
    }

    #[test]
    fn display_without_text_skips_formatting() {
        let mode = RunMode { entries: vec!["firefox".to_string()] };
        let (text, flags) = mode.display(0, false);
        assert_eq!(text, None);
        assert_eq!(flags, StateFlags::empty());
    }

    #[test]
    fn entry_delete_event_always_returns_entry_delete() {
        let mut mode = RunMode { entries: vec!["firefox".to_string()] };
        assert!(matches!(mode.result(AcceptEvent::EntryDelete, "", Some(0)), ModeResult::EntryDelete));
    }

    #[test]
    fn empty_custom_input_is_a_no_op() {
        let mut mode = RunMode::new();
        assert!(matches!(mode.result(AcceptEvent::CustomInput, "", None), ModeResult::Ok));
    }

    #[test]
    fn default_token_match_is_case_insensitive_by_default() {
        let mode = RunMode { entries: vec!["Firefox".to_string()] };
        let cfg = core_matcher::MatcherConfig::default();
        let tokens = core_matcher::tokenize("fire", cfg);
        assert!(mode.token_match(&tokens, 0, cfg.case_sensitive));
    }

    #[test]
    fn default_token_match_honours_case_sensitive_config() {
        let mode = RunMode { entries: vec!["Firefox".to_string()] };
        let cfg = core_matcher::MatcherConfig { case_sensitive: true, ..Default::default() };
        let tokens = core_matcher::tokenize("fire", cfg);
        assert!(!mode.token_match(&tokens, 0, cfg.case_sensitive));
    }
}
