//! The `script` mode: wraps `core_plugin`'s two external-process protocols
//! (§11.3) behind the `Mode` trait. Either a single command is re-run after
//! every accept (the richer control-line protocol, reloading the list when
//! the script prints a new one) or a fixed `name:command` table is loaded
//! once upfront (the older two-field form, which never reloads).

use crate::{AcceptEvent, Mode, ModeResult, StateFlags};
use core_plugin::{parse_two_field, run_script, ScriptControl, TwoFieldEntry};

enum Source {
    Protocol { command: String },
    TwoField { entries: Vec<TwoFieldEntry> },
}

pub struct ScriptMode {
    mode_name: String,
    source: Source,
    rows: Vec<String>,
    ctrl: ScriptControl,
}

impl ScriptMode {
    /// The richer control-line protocol: `command` is re-invoked with no
    /// args for the initial list, then with the accepted row as `argv[1]`.
    pub fn new_protocol(mode_name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            mode_name: mode_name.into(),
            source: Source::Protocol { command: command.into() },
            rows: Vec::new(),
            ctrl: ScriptControl::default(),
        }
    }

    /// The older two-field form: `spec` is a `name:command`-per-line table,
    /// parsed once; accepting a row just runs its command, no reload.
    pub fn new_two_field(mode_name: impl Into<String>, spec: &str) -> Self {
        Self {
            mode_name: mode_name.into(),
            source: Source::TwoField { entries: parse_two_field(spec) },
            rows: Vec::new(),
            ctrl: ScriptControl::default(),
        }
    }

    fn run_initial(&mut self) {
        if let Source::Protocol { command } = &self.source {
            match run_script(command, None) {
                Ok((rows, ctrl)) => {
                    self.rows = rows;
                    self.ctrl = ctrl;
                }
                Err(e) => {
                    tracing::warn!(command, error = %e, "script mode failed to spawn");
                    self.rows.clear();
                }
            }
        }
    }
}

impl Mode for ScriptMode {
    fn name(&self) -> &str {
        &self.mode_name
    }

    fn init(&mut self) -> anyhow::Result<()> {
        self.run_initial();
        Ok(())
    }

    fn num_entries(&self) -> u32 {
        match &self.source {
            Source::Protocol { .. } => self.rows.len() as u32,
            Source::TwoField { entries } => entries.len() as u32,
        }
    }

    fn display(&self, idx: u32, want_text: bool) -> (Option<String>, StateFlags) {
        if !want_text {
            return (None, StateFlags::empty());
        }
        let text = match &self.source {
            Source::Protocol { .. } => self.rows[idx as usize].clone(),
            Source::TwoField { entries } => entries[idx as usize].name.clone(),
        };
        let flags = if self.ctrl.markup_rows { StateFlags::MARKUP } else { StateFlags::empty() };
        (Some(text), flags)
    }

    fn completion(&self, idx: u32) -> String {
        match &self.source {
            Source::Protocol { .. } => self.rows[idx as usize].clone(),
            Source::TwoField { entries } => entries[idx as usize].name.clone(),
        }
    }

    fn result(&mut self, event: AcceptEvent, input: &str, idx: Option<u32>) -> ModeResult {
        if event == AcceptEvent::EntryDelete {
            return ModeResult::EntryDelete;
        }
        match &self.source {
            Source::Protocol { command } => {
                let selected = idx.map(|i| self.rows[i as usize].clone()).unwrap_or_else(|| input.to_string());
                if self.ctrl.no_custom && idx.is_none() {
                    return ModeResult::Ok;
                }
                match run_script(command, Some(&selected)) {
                    Ok((rows, ctrl)) => {
                        let reload = !rows.is_empty();
                        self.rows = rows;
                        self.ctrl = ctrl;
                        if reload { ModeResult::Reload } else { ModeResult::Exit }
                    }
                    Err(e) => {
                        tracing::warn!(command, error = %e, "script mode failed to spawn on accept");
                        ModeResult::Ok
                    }
                }
            }
            Source::TwoField { entries } => {
                let Some(i) = idx else { return ModeResult::Ok };
                let command = entries[i as usize].command.clone();
                match std::process::Command::new("sh").arg("-c").arg(&command).spawn() {
                    Ok(_) => ModeResult::Exit,
                    Err(e) => {
                        tracing::warn!(command, error = %e, "failed to launch two-field script entry");
                        ModeResult::Ok
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_mode_loads_initial_listing() {
        let mut mode = ScriptMode::new_protocol("custom", "printf 'one\\ntwo\\n'");
        mode.init().unwrap();
        assert_eq!(mode.num_entries(), 2);
        assert_eq!(mode.completion(0), "one");
    }

    #[test]
    fn accepting_a_row_that_prints_a_new_list_reloads() {
        let mut mode = ScriptMode::new_protocol("custom", "printf 'a\\nb\\n'");
        mode.init().unwrap();
        let result = mode.result(AcceptEvent::Ok, "", Some(0));
        assert!(matches!(result, ModeResult::Reload));
        assert_eq!(mode.num_entries(), 2);
    }

    #[test]
    fn two_field_mode_parses_upfront_and_never_reloads() {
        let mut mode = ScriptMode::new_two_field("bookmarks", "Home:cd ~\nWork:cd /work\n");
        mode.init().unwrap();
        assert_eq!(mode.num_entries(), 2);
        assert_eq!(mode.completion(1), "Work");
    }

    #[test]
    fn accepting_a_row_reloads_the_list_to_what_the_script_prints_next() {
        // `--` makes `$0` the placeholder and `$1` the accepted entry
        // run_script appends, so the script can tell an initial call
        // (`$1` unset) apart from an accept (`$1` set).
        let command = r#"sh -c 'if [ -z "$1" ]; then printf "apple\nbanana\n"; else printf "cherry\n"; fi' --"#;
        let mut mode = ScriptMode::new_protocol("custom", command);
        mode.init().unwrap();
        assert_eq!(mode.num_entries(), 2);
        assert_eq!(mode.completion(0), "apple");

        let result = mode.result(AcceptEvent::Ok, "", Some(0));
        assert!(matches!(result, ModeResult::Reload));
        assert_eq!(mode.num_entries(), 1);
        assert_eq!(mode.completion(0), "cherry");
    }

    #[test]
    fn entry_delete_short_circuits_before_running_anything() {
        let mut mode = ScriptMode::new_two_field("bookmarks", "Home:cd ~\n");
        mode.init().unwrap();
        assert!(matches!(mode.result(AcceptEvent::EntryDelete, "", Some(0)), ModeResult::EntryDelete));
    }
}
