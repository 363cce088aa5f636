//! The `combi` mode: concatenates several inner modes into one list.
//!
//! Grounded on `examples/original_source/source/modes/combi.c`'s
//! `starts[]`/`csp`-pair bookkeeping, re-expressed as a binary search over
//! cumulative offsets. A leading `!<prefix>` in the query disables every
//! inner mode whose name does *not* start with `<prefix>` (§4.3, §11.5) —
//! all modes that do match the prefix stay enabled, mirroring
//! `combi_preprocess_input`'s per-switcher `disable` flags rather than
//! picking a single winner. `preprocess_input` strips the bang word before
//! the rest of the pipeline tokenizes.

use crate::{AcceptEvent, Mode, ModeResult, StateFlags};
use std::collections::HashSet;

pub struct CombiMode {
    mode_name: String,
    inner: Vec<Box<dyn Mode>>,
    starts: Vec<u32>,
    hide_mode_prefix: bool,
    disabled: HashSet<usize>,
}

impl CombiMode {
    /// Modes that would make `mode_name` part of its own combi graph
    /// (directly, or through a nested combi member) are dropped with a
    /// warning rather than accepted (§4.3).
    pub fn new(mode_name: impl Into<String>, candidates: Vec<Box<dyn Mode>>, hide_mode_prefix: bool) -> Self {
        let mode_name = mode_name.into();
        let mut inner = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if contains_name(candidate.as_ref(), &mode_name, &mut HashSet::new()) {
                tracing::warn!(mode = %mode_name, member = %candidate.name(), "combi member forms a cycle, skipping");
                continue;
            }
            inner.push(candidate);
        }
        Self { mode_name, inner, starts: Vec::new(), hide_mode_prefix, disabled: HashSet::new() }
    }

    fn rebuild_index(&mut self) {
        self.starts.clear();
        let mut offset = 0u32;
        for m in &self.inner {
            self.starts.push(offset);
            offset += m.num_entries();
        }
    }

    fn locate(&self, idx: u32) -> (usize, u32) {
        let pos = match self.starts.binary_search(&idx) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        (pos, idx - self.starts[pos])
    }

    fn total(&self) -> u32 {
        self.inner.iter().map(|m| m.num_entries()).sum()
    }
}

fn contains_name(mode: &dyn Mode, target: &str, seen: &mut HashSet<String>) -> bool {
    if mode.name() == target {
        return true;
    }
    let Some(combi) = mode.as_combi() else { return false };
    if !seen.insert(combi.mode_name.clone()) {
        return false;
    }
    combi.inner.iter().any(|m| contains_name(m.as_ref(), target, seen))
}

impl Mode for CombiMode {
    fn name(&self) -> &str {
        &self.mode_name
    }

    fn init(&mut self) -> anyhow::Result<()> {
        for m in &mut self.inner {
            if let Err(e) = m.init() {
                tracing::warn!(member = %m.name(), error = %e, "combi member failed to initialise");
            }
        }
        self.rebuild_index();
        Ok(())
    }

    fn num_entries(&self) -> u32 {
        self.total()
    }

    fn display(&self, idx: u32, want_text: bool) -> (Option<String>, StateFlags) {
        let (i, local) = self.locate(idx);
        let (text, flags) = self.inner[i].display(local, want_text);
        if self.hide_mode_prefix {
            return (text, flags);
        }
        let text = text.map(|t| format!("{}: {t}", self.inner[i].name()));
        (text, flags)
    }

    fn completion(&self, idx: u32) -> String {
        let (i, local) = self.locate(idx);
        self.inner[i].completion(local)
    }

    fn token_match(&self, tokens: &[core_matcher::TokenMatcher], idx: u32, case_sensitive: bool) -> bool {
        let (i, local) = self.locate(idx);
        if self.disabled.contains(&i) {
            return false;
        }
        self.inner[i].token_match(tokens, local, case_sensitive)
    }

    fn result(&mut self, event: AcceptEvent, input: &str, idx: Option<u32>) -> ModeResult {
        let Some(idx) = idx else {
            return ModeResult::CustomInput;
        };
        let (i, local) = self.locate(idx);
        self.inner[i].result(event, input, Some(local))
    }

    fn reload(&mut self) {
        for m in &mut self.inner {
            m.reload();
        }
        self.rebuild_index();
    }

    fn preprocess_input(&mut self, raw: &str) -> String {
        self.disabled.clear();
        let Some(rest) = raw.strip_prefix('!') else {
            return raw.to_string();
        };
        // `bang` runs up to the first space or end of string (strchrnul in
        // the original); with no space, the whole remainder is the bang
        // word and the forwarded query is empty, not the raw input.
        let (bang, tail) = match rest.split_once(' ') {
            Some((b, t)) => (b, t),
            None => (rest, ""),
        };
        if bang.is_empty() {
            return raw.to_string();
        }
        let bang_len = bang.chars().count();
        for (i, m) in self.inner.iter().enumerate() {
            let name = m.name();
            if bang_len > name.chars().count() || !name.starts_with(bang) {
                self.disabled.insert(i);
            }
        }
        tail.to_string()
    }

    fn destroy(&mut self) {
        for m in &mut self.inner {
            m.destroy();
        }
    }

    fn as_combi(&self) -> Option<&CombiMode> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RunMode;

    struct Fixed {
        name: &'static str,
        rows: Vec<&'static str>,
    }

    impl Mode for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn init(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
        fn num_entries(&self) -> u32 {
            self.rows.len() as u32
        }
        fn display(&self, idx: u32, want_text: bool) -> (Option<String>, StateFlags) {
            (want_text.then(|| self.rows[idx as usize].to_string()), StateFlags::empty())
        }
        fn completion(&self, idx: u32) -> String {
            self.rows[idx as usize].to_string()
        }
        fn result(&mut self, _event: AcceptEvent, _input: &str, _idx: Option<u32>) -> ModeResult {
            ModeResult::Exit
        }
    }

    fn fixture() -> CombiMode {
        let a = Box::new(Fixed { name: "alpha", rows: vec!["a1", "a2"] });
        let b = Box::new(Fixed { name: "beta", rows: vec!["b1"] });
        let mut combi = CombiMode::new("combi", vec![a, b], false);
        combi.init().unwrap();
        combi
    }

    #[test]
    fn locate_maps_global_index_to_inner_mode() {
        let combi = fixture();
        assert_eq!(combi.num_entries(), 3);
        assert_eq!(combi.completion(0), "a1");
        assert_eq!(combi.completion(2), "b1");
    }

    #[test]
    fn display_prefixes_with_inner_mode_name_unless_hidden() {
        let combi = fixture();
        let (text, _) = combi.display(2, true);
        assert_eq!(text.as_deref(), Some("beta: b1"));
    }

    #[test]
    fn hide_mode_prefix_suppresses_the_prefix() {
        let a = Box::new(Fixed { name: "alpha", rows: vec!["a1"] });
        let mut combi = CombiMode::new("combi", vec![a], true);
        combi.init().unwrap();
        let (text, _) = combi.display(0, true);
        assert_eq!(text.as_deref(), Some("a1"));
    }

    #[test]
    fn self_reference_is_rejected() {
        let inner = Box::new(RunMode::new());
        let mut self_ref: Vec<Box<dyn Mode>> = vec![inner];
        self_ref.push(Box::new(Fixed { name: "combi", rows: vec![] }));
        let combi = CombiMode::new("combi", self_ref, false);
        assert_eq!(combi.inner.len(), 1);
        assert_eq!(combi.inner[0].name(), "run");
    }

    #[test]
    fn preprocess_input_restricts_token_match_to_named_inner_mode() {
        let mut combi = fixture();
        let stripped = combi.preprocess_input("!beta b");
        assert_eq!(stripped, "b");
        assert!(!combi.disabled.contains(&1));
        assert!(combi.disabled.contains(&0));
        assert!(!combi.token_match(&[], 2, false));
        assert!(combi.token_match(&[], 0, false));
    }

    #[test]
    fn preprocess_input_with_no_trailing_space_disables_non_matching_and_empties_query() {
        let a = Box::new(Fixed { name: "ssh", rows: vec!["h1"] });
        let b = Box::new(Fixed { name: "run", rows: vec!["r1"] });
        let mut combi = CombiMode::new("combi", vec![a, b], false);
        combi.init().unwrap();
        let stripped = combi.preprocess_input("!s");
        assert_eq!(stripped, "");
        assert!(!combi.disabled.contains(&0));
        assert!(combi.disabled.contains(&1));
        assert!(combi.token_match(&[], 0, false));
        assert!(!combi.token_match(&[], 1, false));
    }

    #[test]
    fn preprocess_input_keeps_every_inner_mode_sharing_the_bang_prefix() {
        let a = Box::new(Fixed { name: "ssh", rows: vec!["h1"] });
        let b = Box::new(Fixed { name: "ssh-copy", rows: vec!["c1"] });
        let c = Box::new(Fixed { name: "run", rows: vec!["r1"] });
        let mut combi = CombiMode::new("combi", vec![a, b, c], false);
        combi.init().unwrap();
        combi.preprocess_input("!ssh x");
        assert!(!combi.disabled.contains(&0));
        assert!(!combi.disabled.contains(&1));
        assert!(combi.disabled.contains(&2));
    }
}
