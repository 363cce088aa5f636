//! `ViewState`: per-invocation interactive state (§3, §4.4).
//!
//! One `ViewState` exists per pushed view (the normal picker, an error
//! dialog, a combi sub-view reached via `switch_mode`). Only the InputLoop
//! thread ever calls `&mut self` methods; `refilter` is the one place where
//! read-only borrows of the active mode cross into worker threads, and it
//! blocks until every chunk has reported back before returning.

use core_matcher::{MatcherConfig, MatchingMethod};
use core_mode::{AcceptEvent, Mode, ModeResult};
use core_worker::WorkerPool;
use std::sync::Arc;
use std::time::{Duration, Instant};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ViewFlags: u8 {
        const NORMAL        = 0;
        const PASSWORD      = 0b0001;
        const NORMAL_WINDOW = 0b0010;
        const ERROR_DIALOG  = 0b0100;
        const INDICATOR     = 0b1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortingMethod {
    None,
    Normal,
    Fzf,
}

/// Multi-keystroke text composition (dead keys, compose key), per §9's
/// design note. Surfacing composed text from a live sequence needs an
/// actual compose-key table, which — like the terminal/display backend
/// itself — is out of scope here; what's modelled is the state machine
/// shape so a caller with that table has somewhere to drive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComposeState {
    #[default]
    Idle,
    Composing,
    Cancelled,
}

/// Exit-code-bearing accept result (§6: `0` on Ok, `1` on cancel, `10..28`
/// for `Custom_1..Custom_19`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MenuReturn {
    #[default]
    None,
    Ok,
    Cancel,
    Custom(u8),
}

impl MenuReturn {
    pub fn exit_code(self) -> i32 {
        match self {
            MenuReturn::None | MenuReturn::Cancel => 1,
            MenuReturn::Ok => 0,
            MenuReturn::Custom(n) => 9 + i32::from(n.clamp(1, 19)),
        }
    }
}

/// The matched-and-sorted view over a mode's `0..num_entries` index space
/// (§3). `line_map[k] < num_entries` for every `k`, values unique.
#[derive(Debug, Default, Clone)]
pub struct FilteredView {
    pub line_map: Vec<u32>,
    pub distance: Vec<i32>,
}

impl FilteredView {
    pub fn len(&self) -> usize {
        self.line_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line_map.is_empty()
    }
}

/// The subset of `Config` that shapes filtering/selection behaviour,
/// threaded into `ViewState` at `create` time (kept separate from
/// `core-config::Config` the same way `core_matcher::MatcherConfig` is, to
/// avoid a dependency cycle).
#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub method: MatchingMethod,
    pub case_sensitive: bool,
    pub tokenize: bool,
    pub negate_char: char,
    pub threads: usize,
    pub sorting: SortingMethod,
    pub auto_select: bool,
    pub cycle: bool,
    pub ellipsize_start: bool,
    pub history_max: usize,
    pub ignored_prefixes: Vec<String>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            method: MatchingMethod::Normal,
            case_sensitive: false,
            tokenize: true,
            negate_char: '-',
            threads: 0,
            sorting: SortingMethod::None,
            auto_select: false,
            cycle: true,
            ellipsize_start: false,
            history_max: core_history::DEFAULT_MAX,
            ignored_prefixes: Vec::new(),
        }
    }
}

/// What the caller (`core-actions`, the input loop) must do after a
/// `trigger_action` or accept, beyond what `ViewState` already mutated in
/// place — things that need data `ViewState` itself doesn't own, like the
/// full `-modi` list to cycle through.
#[derive(Debug)]
pub enum ViewOutcome {
    None,
    RequestModeNext,
    RequestModePrevious,
    SwitchMode(Box<dyn Mode>),
}

pub struct ViewState {
    mode: Arc<dyn Mode>,
    mode_stack: Vec<Arc<dyn Mode>>,
    num_lines: u32,
    input: String,
    cursor: usize,
    compose: ComposeState,
    tokens: Option<Vec<core_matcher::TokenMatcher>>,
    selected: u32,
    filtered: FilteredView,
    retv: MenuReturn,
    quit: bool,
    reload: bool,
    refilter: bool,
    flags: ViewFlags,
    overlay_text: Option<String>,
    finalize: Option<Box<dyn FnMut(&mut ViewState)>>,
    config: ViewConfig,
    pool: WorkerPool,
    history: Option<core_history::History>,
    last_reload_request: Option<Instant>,
    last_action: Option<core_keymap::Action>,
}

const RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);
const PAGE_SIZE: u32 = 8;

impl ViewState {
    /// `create(mode, initial_input, flags, finalize)` (§3 Lifecycle). Loads
    /// this mode's history file (best-effort — a load failure just means no
    /// history) and runs `mode.init()` + the first `refilter`.
    pub fn create(
        mut mode: Box<dyn Mode>,
        initial_input: &str,
        flags: ViewFlags,
        config: ViewConfig,
        finalize: Option<Box<dyn FnMut(&mut ViewState)>>,
    ) -> anyhow::Result<Self> {
        mode.init()?;
        let num_lines = mode.num_entries();
        let history = match core_history::History::load(mode.name(), config.history_max) {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load history, starting empty");
                None
            }
        };
        let cursor = initial_input.len();
        let mut state = Self {
            mode: Arc::from(mode),
            mode_stack: Vec::new(),
            num_lines,
            input: initial_input.to_string(),
            cursor,
            compose: ComposeState::Idle,
            tokens: None,
            selected: u32::MAX,
            filtered: FilteredView::default(),
            retv: MenuReturn::None,
            quit: false,
            reload: false,
            refilter: true,
            flags,
            overlay_text: None,
            finalize,
            pool: WorkerPool::new(config.threads),
            config,
            history,
            last_reload_request: None,
            last_action: None,
        };
        state.refilter();
        Ok(state)
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> u32 {
        self.selected
    }

    pub fn filtered(&self) -> &FilteredView {
        &self.filtered
    }

    pub fn retv(&self) -> MenuReturn {
        self.retv
    }

    pub fn quit(&self) -> bool {
        self.quit
    }

    pub fn flags(&self) -> ViewFlags {
        self.flags
    }

    pub fn overlay_text(&self) -> Option<&str> {
        self.overlay_text.as_deref()
    }

    pub fn mode(&self) -> &dyn Mode {
        &*self.mode
    }

    /// Selected entry's original mode index, if any.
    pub fn selected_index(&self) -> Option<u32> {
        (self.selected != u32::MAX).then(|| self.filtered.line_map[self.selected as usize])
    }

    // --- §4.4 operations -------------------------------------------------

    /// `handle_text(s)`: insert at cursor, advance cursor, request refilter.
    pub fn handle_text(&mut self, s: &str) {
        if self.compose == ComposeState::Composing {
            return;
        }
        self.cursor = core_text::cursor::insert(&mut self.input, self.cursor, s);
        self.refilter = true;
    }

    pub fn begin_compose(&mut self) {
        self.compose = ComposeState::Composing;
    }

    pub fn cancel_compose(&mut self) {
        self.compose = ComposeState::Cancelled;
    }

    pub fn end_compose(&mut self, composed: Option<&str>) {
        self.compose = ComposeState::Idle;
        if let Some(text) = composed {
            self.handle_text(text);
        }
    }

    /// `set_selected(i)`: clamp to `[0, len)` or `u32::MAX` if empty.
    pub fn set_selected(&mut self, i: u32) {
        let len = self.filtered.len();
        self.selected = if len == 0 { u32::MAX } else { i.min(len as u32 - 1) };
    }

    /// `handle_mouse_motion(x, y)`: out of scope for this crate — there is
    /// no widget tree here to forward to, only the abstraction boundary
    /// named in §6. Kept as a recorded no-op so callers have a stable entry
    /// point to wire against once a real render/input backend exists.
    pub fn handle_mouse_motion(&mut self, _x: u16, _y: u16) {}

    /// `reload_request()`: marks the moment a reload was asked for; the
    /// actual `mode.reload()` call is coalesced in `tick` (§8's "N
    /// reload() calls within 100ms trigger exactly one mode.reload()").
    pub fn reload_request(&mut self) {
        self.last_reload_request = Some(Instant::now());
    }

    /// Drive the reload debounce and the refilter; call once per InputLoop
    /// iteration. Returns `true` if a refilter/reload actually ran.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut did_work = false;
        if let Some(requested_at) = self.last_reload_request {
            if now.duration_since(requested_at) >= RELOAD_DEBOUNCE {
                self.last_reload_request = None;
                self.reload = true;
                if let Some(mode) = Arc::get_mut(&mut self.mode) {
                    mode.reload();
                } else {
                    tracing::warn!("mode Arc unexpectedly shared outside refilter, skipping reload()");
                }
                self.refilter = true;
                did_work = true;
            }
        }
        if self.refilter {
            self.refilter();
            did_work = true;
        }
        did_work
    }

    pub fn set_overlay(&mut self, text: Option<String>) {
        self.overlay_text = text;
    }

    /// `switch_mode(mode)`: push current onto stack, request reload+refilter.
    pub fn switch_mode(&mut self, mut new_mode: Box<dyn Mode>) -> anyhow::Result<()> {
        new_mode.init()?;
        let num_lines = new_mode.num_entries();
        let old = std::mem::replace(&mut self.mode, Arc::from(new_mode));
        self.mode_stack.push(old);
        self.num_lines = num_lines;
        self.selected = u32::MAX;
        self.reload = true;
        self.refilter = true;
        self.history = core_history::History::load(self.mode.name(), self.config.history_max).ok();
        Ok(())
    }

    /// Pop back to the previous mode (error dialog dismissal, or a mode
    /// that returned `Previous`). No-op with a warning if the stack is
    /// empty — the outermost view has nowhere left to pop to.
    pub fn pop_mode(&mut self) {
        let Some(previous) = self.mode_stack.pop() else {
            tracing::warn!("pop_mode called with an empty mode stack");
            return;
        };
        self.mode = previous;
        self.num_lines = self.mode.num_entries();
        self.selected = u32::MAX;
        self.reload = true;
        self.refilter = true;
    }

    /// `trigger_action(action)` (§4.4/§4.5): dispatch table plus the
    /// selection state machine (§4.4 "Selection state machine").
    pub fn trigger_action(&mut self, action: core_keymap::Action) -> ViewOutcome {
        use core_keymap::Action;
        let len = self.filtered.len() as u32;
        let outcome = match action {
            Action::RowDown | Action::RowRight => {
                self.select_delta(1);
                ViewOutcome::None
            }
            Action::RowUp | Action::RowLeft => {
                self.select_delta(-1);
                ViewOutcome::None
            }
            Action::PageNext => {
                self.select_delta(PAGE_SIZE as i64);
                ViewOutcome::None
            }
            Action::PagePrev => {
                self.select_delta(-(PAGE_SIZE as i64));
                ViewOutcome::None
            }
            Action::RowFirst => {
                self.set_selected(0);
                ViewOutcome::None
            }
            Action::RowLast => {
                if len > 0 {
                    self.set_selected(len - 1);
                }
                ViewOutcome::None
            }
            Action::RowTab => self.trigger_row_tab(len),
            Action::AcceptEntry => self.accept(),
            Action::AcceptCustom => self.accept_custom(),
            Action::DeleteEntry => self.delete_selected(),
            Action::ModeNext => ViewOutcome::RequestModeNext,
            Action::ModePrevious => ViewOutcome::RequestModePrevious,
            Action::Cancel => {
                self.quit = true;
                self.retv = MenuReturn::Cancel;
                ViewOutcome::None
            }
            Action::MoveCursorLeft => {
                self.cursor = core_text::cursor::left(&self.input, self.cursor);
                ViewOutcome::None
            }
            Action::MoveCursorRight => {
                self.cursor = core_text::cursor::right(&self.input, self.cursor);
                ViewOutcome::None
            }
            Action::MoveCursorStart => {
                self.cursor = 0;
                ViewOutcome::None
            }
            Action::MoveCursorEnd => {
                self.cursor = self.input.len();
                ViewOutcome::None
            }
            Action::DeleteCharBefore => {
                self.cursor = core_text::cursor::delete_before(&mut self.input, self.cursor);
                self.refilter = true;
                ViewOutcome::None
            }
            Action::DeleteCharAfter => {
                core_text::cursor::delete_at(&mut self.input, self.cursor);
                self.refilter = true;
                ViewOutcome::None
            }
            Action::ClearInput => {
                self.input.clear();
                self.cursor = 0;
                self.refilter = true;
                ViewOutcome::None
            }
            Action::ToggleCaseSensitivity => {
                self.config.case_sensitive = !self.config.case_sensitive;
                self.refilter = true;
                ViewOutcome::None
            }
        };
        self.last_action = Some(action);
        outcome
    }

    fn select_delta(&mut self, delta: i64) {
        let len = self.filtered.len() as i64;
        if len == 0 {
            self.selected = u32::MAX;
            return;
        }
        let current = if self.selected == u32::MAX { -1 } else { self.selected as i64 };
        let mut next = current + delta;
        if next < 0 {
            next = if self.config.cycle { len - 1 } else { 0 };
        } else if next >= len {
            next = if self.config.cycle { 0 } else { len - 1 };
        }
        self.selected = next as u32;
    }

    /// `RowTab`: accept if there's exactly one row; if the previous action
    /// was also `RowTab` and the list is empty, request cycling to the next
    /// mode; otherwise behave like `RowDown` (§4.4).
    fn trigger_row_tab(&mut self, len: u32) -> ViewOutcome {
        if len == 1 {
            self.set_selected(0);
            return self.accept();
        }
        if len == 0 && self.last_action == Some(core_keymap::Action::RowTab) {
            return ViewOutcome::RequestModeNext;
        }
        self.select_delta(1);
        ViewOutcome::None
    }

    /// `AcceptEntry`: call `mode.result(Ok, ...)` on a real selection, else
    /// `CustomInput` on the typed text (§4.4).
    fn accept(&mut self) -> ViewOutcome {
        let idx = self.selected_index();
        let event = if idx.is_some() { AcceptEvent::Ok } else { AcceptEvent::CustomInput };
        // Capture the accepted row's own text before `result` runs — a
        // script/reload mode may mutate its entry list inside `result`.
        let promoted = idx.map(|i| self.mode.completion(i));
        let Some(mode) = Arc::get_mut(&mut self.mode) else {
            tracing::warn!("mode Arc unexpectedly shared, dropping accept");
            return ViewOutcome::None;
        };
        let result = mode.result(event, &self.input, idx);
        self.record_history_on_accept(&result, promoted.as_deref());
        self.apply_mode_result(result)
    }

    fn accept_custom(&mut self) -> ViewOutcome {
        let Some(mode) = Arc::get_mut(&mut self.mode) else {
            tracing::warn!("mode Arc unexpectedly shared, dropping accept");
            return ViewOutcome::None;
        };
        let result = mode.result(AcceptEvent::CustomInput, &self.input, None);
        self.record_history_on_accept(&result, None);
        self.apply_mode_result(result)
    }

    fn delete_selected(&mut self) -> ViewOutcome {
        let Some(idx) = self.selected_index() else { return ViewOutcome::None };
        let Some(mode) = Arc::get_mut(&mut self.mode) else {
            tracing::warn!("mode Arc unexpectedly shared, dropping delete");
            return ViewOutcome::None;
        };
        let result = mode.result(AcceptEvent::EntryDelete, &self.input, Some(idx));
        self.apply_mode_result(result)
    }

    /// History promotion on a real accept (§4.7/§8: accepting the same
    /// entry twice leaves it once, at position 0). Only `Ok`/`Exit` count
    /// as a real accept — `Reload` (script prints a new list) does not.
    /// `promoted` is the accepted row's own completion text; it's `None`
    /// only for a genuine custom-input accept, where the typed filter
    /// itself is what should be remembered.
    fn record_history_on_accept(&mut self, result: &ModeResult, promoted: Option<&str>) {
        if !matches!(result, ModeResult::Ok | ModeResult::Exit) {
            return;
        }
        let Some(history) = self.history.as_mut() else { return };
        let text = promoted.unwrap_or(&self.input);
        history.prepend_or_promote(text, &self.config.ignored_prefixes);
        if let Err(e) = history.save() {
            tracing::warn!(error = %e, "failed to save history");
        }
    }

    fn apply_mode_result(&mut self, result: ModeResult) -> ViewOutcome {
        match result {
            ModeResult::Exit | ModeResult::CustomInput => {
                self.quit = true;
                self.retv = MenuReturn::Ok;
                ViewOutcome::None
            }
            ModeResult::Ok => ViewOutcome::None,
            ModeResult::Reload | ModeResult::EntryDelete => {
                self.reload = true;
                self.refilter = true;
                ViewOutcome::None
            }
            ModeResult::Next => ViewOutcome::RequestModeNext,
            ModeResult::Previous => ViewOutcome::RequestModePrevious,
            ModeResult::SwitchTo(mode) => ViewOutcome::SwitchMode(mode),
        }
    }

    /// Runs `finalize` (if any) and clears it; the callback may inspect
    /// `retv` to feed history or an external pipe (§3 Lifecycle).
    pub fn finalize(&mut self) {
        if let Some(mut finalize) = self.finalize.take() {
            finalize(self);
        }
    }

    // --- §4.4 "Filter / sort algorithm" -----------------------------------

    /// `refilter`: re-match and (optionally) re-sort the whole candidate
    /// list against `input`, fanning work out across the worker pool.
    /// Steps follow §4.4's numbered filter/sort algorithm.
    pub fn refilter(&mut self) {
        if self.reload {
            self.num_lines = self.mode.num_entries();
            self.reload = false;
        }
        let n = self.num_lines as usize;

        if self.input.is_empty() {
            self.filtered.line_map = (0..self.num_lines).collect();
            self.filtered.distance.clear();
            self.tokens = None;
            self.finish_refilter();
            self.refilter = false;
            return;
        }

        let matcher_cfg = MatcherConfig {
            method: self.config.method,
            case_sensitive: self.config.case_sensitive,
            tokenize: self.config.tokenize,
            negate_char: self.config.negate_char,
        };
        let preprocessed = match Arc::get_mut(&mut self.mode) {
            Some(mode) => mode.preprocess_input(&self.input),
            None => {
                tracing::warn!("mode Arc unexpectedly shared during refilter, skipping preprocess_input");
                self.input.clone()
            }
        };
        let tokens = core_matcher::tokenize(&preprocessed, matcher_cfg);
        self.tokens = Some(tokens.clone());

        if n == 0 {
            self.filtered.line_map.clear();
            self.filtered.distance.clear();
            self.finish_refilter();
            self.refilter = false;
            return;
        }

        let nt = (n / 500).max(1).min(self.config.threads.max(1));
        let chunk_size = n.div_ceil(nt).max(1);

        let (tx, rx) = crossbeam_channel::bounded::<(usize, Vec<u32>, Vec<(u32, i32)>)>(nt);
        let mut jobs: Vec<Box<dyn FnOnce() + Send>> = Vec::with_capacity(nt);
        let sorting = self.config.sorting;
        let case_sensitive = self.config.case_sensitive;
        for (chunk_idx, start) in (0..n).step_by(chunk_size).enumerate() {
            let end = (start + chunk_size).min(n);
            let mode = Arc::clone(&self.mode);
            let tokens = tokens.clone();
            let preprocessed = preprocessed.clone();
            let tx = tx.clone();
            jobs.push(Box::new(move || {
                let mut matched = Vec::new();
                let mut distances = Vec::new();
                for idx in start..end {
                    let idx = idx as u32;
                    if mode.token_match(&tokens, idx, case_sensitive) {
                        matched.push(idx);
                        if sorting != SortingMethod::None {
                            let completion = mode.completion(idx);
                            let d = match sorting {
                                SortingMethod::Fzf => core_matcher::score(&preprocessed, &completion, case_sensitive),
                                SortingMethod::Normal => {
                                    core_matcher::levenshtein(&preprocessed, &completion, case_sensitive) as i32
                                }
                                SortingMethod::None => 0,
                            };
                            distances.push((idx, d));
                        }
                    }
                }
                let _ = tx.send((chunk_idx, matched, distances));
            }));
        }
        drop(tx);
        let expected = jobs.len();
        self.pool.execute(jobs);

        let mut chunks: Vec<Option<(Vec<u32>, Vec<(u32, i32)>)>> = vec![None; expected];
        for _ in 0..expected {
            if let Ok((idx, matched, distances)) = rx.recv() {
                chunks[idx] = Some((matched, distances));
            }
        }

        let mut line_map = Vec::with_capacity(n);
        let mut distance_pairs = Vec::new();
        for chunk in chunks.into_iter().flatten() {
            line_map.extend(chunk.0);
            distance_pairs.extend(chunk.1);
        }

        if self.config.sorting != SortingMethod::None {
            let mut dist_by_idx = vec![i32::MAX; n];
            for (idx, d) in distance_pairs {
                dist_by_idx[idx as usize] = d;
            }
            line_map.sort_by_key(|&idx| dist_by_idx[idx as usize]);
            self.filtered.distance = line_map.iter().map(|&idx| dist_by_idx[idx as usize]).collect();
        } else {
            self.filtered.distance.clear();
        }
        self.filtered.line_map = line_map;

        self.finish_refilter();
        self.refilter = false;
    }

    fn finish_refilter(&mut self) {
        let len = self.filtered.len();
        if self.selected == u32::MAX {
            if len > 0 && !self.config.ellipsize_start {
                self.selected = 0;
            }
        } else if self.selected as usize >= len {
            self.selected = if len > 0 { len as u32 - 1 } else { u32::MAX };
        }
        if self.config.auto_select && len == 1 && self.num_lines > 1 {
            self.retv = MenuReturn::Ok;
            self.quit = true;
        }
    }
}
