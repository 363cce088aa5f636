//! Translates terminal input into `ViewState` mutations (§4.4/§4.5, §5).
//!
//! The async event task (`async_service`) and its crossterm `EventStream` +
//! bracketed-paste state machine are unchanged from the blocking/async input
//! pipeline this workspace already had; what changed is what happens to an
//! event once it reaches the main thread. `InputLoop` resolves a `KeyToken`
//! into `core_keymap`'s `(ModMask, KeySym)` pair, drives it through
//! `core_actions::ActionDispatcher`, and coalesces the resulting damage into
//! one `core_render::RenderScheduler` decision per idle tick.

mod async_service;
mod key_token;
pub use async_service::AsyncInputShutdown;

use async_service::spawn_async_event_task;

use core_actions::ActionDispatcher;
use core_events::{Event, InputEvent, KeyToken};
use core_keymap::KeySym;
use core_render::{Decision, RenderDelta, RenderScheduler};
use core_state::ViewState;
use std::time::{Duration, Instant};

#[inline]
pub(crate) fn log_paste_chunk_flush(chunk: &str) {
    tracing::trace!(target: "input.paste", chunk_len = chunk.len(), "chunk_flush");
}

/// Spawn the async input service backed by `crossterm::EventStream`.
pub fn spawn_async_input(
    sender: tokio::sync::mpsc::Sender<Event>,
) -> (tokio::task::JoinHandle<()>, AsyncInputShutdown) {
    spawn_async_event_task(sender)
}

/// How often the loop wakes up with no input pending, to drive the reload
/// debounce (`ViewState::tick`) even while the user is idle.
const IDLE_TICK: Duration = Duration::from_millis(25);

/// Resolve a `KeyToken` into the `(ModMask, KeySym)` pair `ActionDispatcher`
/// expects. `Chord` unwraps its base token and folds in the chord's mask;
/// plain tokens carry no modifiers of their own.
fn token_to_keysym(token: &KeyToken) -> (core_events::ModMask, KeySym) {
    match token {
        KeyToken::Char(c) => (core_events::ModMask::empty(), KeySym::Char(*c)),
        KeyToken::Named(n) => (core_events::ModMask::empty(), KeySym::Named(*n)),
        KeyToken::Chord { base, mods } => {
            let (_, key) = token_to_keysym(base);
            (*mods, key)
        }
    }
}

/// Coarse render-damage classification for a resolved `Action`. `ViewState`
/// doesn't track per-mutation diffs itself (§ design note on `core-render`),
/// so the loop infers damage from which family of action ran.
fn classify_action(action: core_keymap::Action) -> RenderDelta {
    use core_keymap::Action;
    match action {
        Action::MoveCursorLeft
        | Action::MoveCursorRight
        | Action::MoveCursorStart
        | Action::MoveCursorEnd => RenderDelta::CursorOnly,
        Action::RowUp
        | Action::RowDown
        | Action::RowLeft
        | Action::RowRight
        | Action::RowTab
        | Action::RowFirst
        | Action::RowLast
        | Action::PageNext
        | Action::PagePrev => RenderDelta::Rows(0..usize::MAX),
        _ => RenderDelta::Full,
    }
}

/// Drives one `ViewState` to completion from terminal input.
///
/// Owns the key-binding/mode-cycling dispatcher and the redraw scheduler;
/// does not own the `ViewState` itself (the caller keeps it, so it can read
/// `retv()`/`filtered()` after the loop returns) or the terminal backend
/// (entering/leaving raw mode is `core-terminal`'s job, bracketing the call
/// to `run`).
pub struct InputLoop {
    dispatcher: ActionDispatcher,
    scheduler: RenderScheduler,
}

impl InputLoop {
    pub fn new(dispatcher: ActionDispatcher) -> Self {
        Self {
            dispatcher,
            scheduler: RenderScheduler::new(),
        }
    }

    /// Run until `view.quit()` or the input channel closes, calling
    /// `on_redraw` once per tick that produced at least one damage delta.
    /// Returns the process exit code (`ViewState::retv().exit_code()`).
    pub async fn run(
        mut self,
        view: &mut ViewState,
        mut on_redraw: impl FnMut(&ViewState, Decision),
    ) -> anyhow::Result<i32> {
        let (tx, mut rx) = tokio::sync::mpsc::channel(core_events::EVENT_CHANNEL_CAP);
        let (_handle, shutdown) = spawn_async_input(tx);

        self.scheduler.mark(RenderDelta::Full);
        let mut ticker = tokio::time::interval(IDLE_TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if view.quit() {
                break;
            }
            tokio::select! {
                biased;
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => self.handle_event(view, event),
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    if view.tick(Instant::now()) {
                        self.scheduler.mark(RenderDelta::Full);
                    }
                }
            }
            if let Some(decision) = self.scheduler.consume() {
                on_redraw(view, decision);
            }
            if view.quit() {
                break;
            }
        }

        shutdown.signal();
        view.finalize();
        Ok(view.retv().exit_code())
    }

    fn handle_event(&mut self, view: &mut ViewState, event: Event) {
        match event {
            Event::Input(InputEvent::KeyPress(ext)) => {
                let (mods, key) = token_to_keysym(&ext.token);
                if let Some(action) = self.dispatcher.bindings.resolve(mods, key, false) {
                    self.dispatcher.dispatch(view, action);
                    self.scheduler.mark(classify_action(action));
                }
            }
            Event::Input(InputEvent::CtrlC) => {
                self.dispatcher.dispatch(view, core_keymap::Action::Cancel);
                self.scheduler.mark(RenderDelta::Full);
            }
            Event::Input(InputEvent::Resize(_, _)) => {
                self.scheduler.mark(RenderDelta::Full);
            }
            Event::Input(InputEvent::PasteStart) => {}
            Event::Input(InputEvent::PasteChunk(text)) => {
                view.handle_text(&text);
                self.scheduler.mark(RenderDelta::Full);
            }
            Event::Input(InputEvent::PasteEnd) => {
                if view.tick(Instant::now()) {
                    self.scheduler.mark(RenderDelta::Full);
                }
            }
            Event::Input(InputEvent::Mouse(m)) => {
                view.handle_mouse_motion(m.column, m.row);
            }
            Event::Tick => {
                if view.tick(Instant::now()) {
                    self.scheduler.mark(RenderDelta::Full);
                }
            }
            Event::Shutdown => {
                self.dispatcher.dispatch(view, core_keymap::Action::Cancel);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_actions::ModeCycle;
    use core_events::ModMask;
    use core_keymap::{Action, KeyBindings};
    use core_mode::{AcceptEvent, Mode, ModeResult, StateFlags};
    use core_state::{ViewConfig, ViewFlags};

    struct Fixed {
        rows: Vec<&'static str>,
    }

    impl Mode for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn init(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
        fn num_entries(&self) -> u32 {
            self.rows.len() as u32
        }
        fn display(&self, idx: u32, want_text: bool) -> (Option<String>, StateFlags) {
            (
                want_text.then(|| self.rows[idx as usize].to_string()),
                StateFlags::empty(),
            )
        }
        fn completion(&self, idx: u32) -> String {
            self.rows[idx as usize].to_string()
        }
        fn result(&mut self, _event: AcceptEvent, _input: &str, _idx: Option<u32>) -> ModeResult {
            ModeResult::Exit
        }
    }

    fn with_env<T>(f: impl FnOnce() -> T) -> T {
        let dir = tempfile::tempdir().unwrap();
        unsafe { std::env::set_var("XDG_CACHE_HOME", dir.path()) };
        f()
    }

    fn dispatcher() -> ActionDispatcher {
        ActionDispatcher::new(KeyBindings::defaults(), ModeCycle::new(Vec::new()))
    }

    #[test]
    fn char_token_has_no_modifiers() {
        let (mods, key) = token_to_keysym(&KeyToken::Char('a'));
        assert!(mods.is_empty());
        assert!(matches!(key, KeySym::Char('a')));
    }

    #[test]
    fn chord_token_carries_its_mask() {
        let token = KeyToken::Chord {
            base: Box::new(KeyToken::Char('p')),
            mods: ModMask::CTRL,
        };
        let (mods, key) = token_to_keysym(&token);
        assert_eq!(mods, ModMask::CTRL);
        assert!(matches!(key, KeySym::Char('p')));
    }

    #[test]
    fn cursor_actions_classify_as_cursor_only() {
        assert_eq!(classify_action(Action::MoveCursorLeft), RenderDelta::CursorOnly);
        assert_eq!(classify_action(Action::Cancel), RenderDelta::Full);
    }

    #[tokio::test]
    async fn escape_key_press_quits_with_cancel() {
        with_env(|| {
            let mut view = ViewState::create(
                Box::new(Fixed { rows: vec!["a", "b"] }),
                "",
                ViewFlags::NORMAL,
                ViewConfig::default(),
                None,
            )
            .unwrap();
            let mut input = InputLoop::new(dispatcher());
            let ext = core_events::KeyEventExt::new(KeyToken::Named(core_events::NamedKey::Esc));
            input.handle_event(&mut view, Event::Input(InputEvent::KeyPress(ext)));
            assert!(view.quit());
            assert_eq!(view.retv(), core_state::MenuReturn::Cancel);
        });
    }

    #[tokio::test]
    async fn ctrl_c_cancels_like_escape() {
        with_env(|| {
            let mut view = ViewState::create(
                Box::new(Fixed { rows: vec!["a"] }),
                "",
                ViewFlags::NORMAL,
                ViewConfig::default(),
                None,
            )
            .unwrap();
            let mut input = InputLoop::new(dispatcher());
            input.handle_event(&mut view, Event::Input(InputEvent::CtrlC));
            assert!(view.quit());
        });
    }

    #[tokio::test]
    async fn paste_chunk_inserts_text_and_refilters() {
        with_env(|| {
            let mut view = ViewState::create(
                Box::new(Fixed { rows: vec!["firefox", "emacs"] }),
                "",
                ViewFlags::NORMAL,
                ViewConfig::default(),
                None,
            )
            .unwrap();
            let mut input = InputLoop::new(dispatcher());
            input.handle_event(&mut view, Event::Input(InputEvent::PasteChunk("fi".to_string())));
            view.refilter();
            assert_eq!(view.input(), "fi");
            assert_eq!(view.filtered().len(), 1);
        });
    }
}
