//! The `Mode` capability set (§4.3) and its concrete implementations.
//!
//! A mode materialises its candidate list once at `init` (enumerating
//! `$PATH`, reading `.desktop` files, running a script, ...) and answers
//! three questions about each candidate by index: what to display, whether
//! it matches a set of query tokens, and what to do when it is accepted.
//! `ViewState::refilter` (in `core-state`) drives `token_match`/`display`
//! across the whole list every time the query changes; it never inspects a
//! mode's internals directly.

mod combi;
mod drun;
mod run;
mod script;
mod ssh;
mod window;

pub use combi::CombiMode;
pub use drun::DrunMode;
pub use run::RunMode;
pub use script::ScriptMode;
pub use ssh::SshMode;
pub use window::WindowMode;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct StateFlags: u8 {
        const URGENT   = 0b0001;
        const ACTIVE   = 0b0010;
        const SELECTED = 0b0100;
        const MARKUP   = 0b1000;
    }
}

/// Why `Mode::result` was invoked for a given row (§4.4's selection state
/// machine: `AcceptEntry` on a real selection vs. on an empty one, or the
/// `Shift+Delete` binding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptEvent {
    Ok,
    CustomInput,
    EntryDelete,
}

/// What a mode wants to happen next after handling `result`.
pub enum ModeResult {
    Exit,
    Next,
    Previous,
    Reload,
    Ok,
    EntryDelete,
    SwitchTo(Box<dyn Mode>),
    CustomInput,
}

impl std::fmt::Debug for ModeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeResult::Exit => write!(f, "Exit"),
            ModeResult::Next => write!(f, "Next"),
            ModeResult::Previous => write!(f, "Previous"),
            ModeResult::Reload => write!(f, "Reload"),
            ModeResult::Ok => write!(f, "Ok"),
            ModeResult::EntryDelete => write!(f, "EntryDelete"),
            ModeResult::SwitchTo(m) => write!(f, "SwitchTo({})", m.name()),
            ModeResult::CustomInput => write!(f, "CustomInput"),
        }
    }
}

/// A source of candidates for the picker. `&self` methods must be cheap and
/// side-effect free — `refilter` calls `token_match`/`display` for every
/// candidate, potentially from worker threads, once per query change. `Sync`
/// lets `core-state` hold the active mode behind an `Arc` and hand out
/// borrowed references to worker-pool chunks during that one blocking call.
pub trait Mode: Send + Sync {
    /// Stable, human-readable identifier (used for `!<prefix>` combi
    /// restriction and history file naming).
    fn name(&self) -> &str;

    /// Materialise the candidate list. Called once before the mode's first
    /// `refilter`. A mode that fails to enumerate anything (missing
    /// `$PATH`, unreadable desktop directories, a script that can't spawn)
    /// should still return `Ok(())` with zero entries rather than erroring
    /// the whole picker (§7 kind 2).
    fn init(&mut self) -> anyhow::Result<()>;

    fn num_entries(&self) -> u32;

    /// `want_text == false` lets a mode skip building a display string it
    /// won't need (e.g. during a pure `token_match` pass).
    fn display(&self, idx: u32, want_text: bool) -> (Option<String>, StateFlags);

    /// Text fed back into the input box on Tab-completion and used for
    /// Fuzzy/Normal sort scoring in `refilter`.
    fn completion(&self, idx: u32) -> String;

    /// Default: match the candidate's completion text against `tokens`
    /// using `core_matcher::matches`. Modes with richer per-field matching
    /// (e.g. matching window class separately from title) override this.
    /// `case_sensitive` must be the same flag `tokenize` compiled `tokens`
    /// with — `tokens` are already folded to that case, so passing a
    /// mismatched flag here silently breaks case-insensitive matching.
    fn token_match(&self, tokens: &[core_matcher::TokenMatcher], idx: u32, case_sensitive: bool) -> bool {
        let text = self.completion(idx);
        core_matcher::matches(tokens, &text, case_sensitive)
    }

    fn result(&mut self, event: AcceptEvent, input: &str, idx: Option<u32>) -> ModeResult;

    /// Re-enumerate entries in place (script mode reloading after an
    /// accept, §4.3).
    fn reload(&mut self) {}

    /// Rewrite raw input before tokenizing (combi's `!<prefix>` stripping,
    /// which also records the restriction for the next `token_match` pass —
    /// hence `&mut self`).
    fn preprocess_input(&mut self, raw: &str) -> String {
        raw.to_string()
    }

    fn destroy(&mut self) {}

    /// Down-cast hook used only for combi-of-combi cycle detection at
    /// construction time; every mode but `CombiMode` leaves this as `None`.
    fn as_combi(&self) -> Option<&CombiMode> {
        None
    }
}

/// Search `$PATH` for `name`, returning the first match. Shared by the Run
/// and desktop-entry `Exec=` resolution paths (§11.2: PATH search is the
/// executor's job, not a per-mode concern).
pub fn find_in_path(name: &str) -> Option<std::path::PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        let candidate = dir.join(name);
        candidate.is_file().then_some(candidate)
    })
}
