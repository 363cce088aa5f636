//! Dispatch layer between bound actions and `ViewState` mutation (§4.5).
//!
//! `core-keymap::KeyBindings::resolve` turns a raw key into an `Action`;
//! `ActionDispatcher::dispatch` drives `ViewState::trigger_action` and reacts
//! to the `ViewOutcome` it returns. Cycling through the full `-modi` list is
//! the one thing `ViewState` can't do on its own — it only knows about the
//! mode it currently holds, not the whole list the binary was invoked with.

use core_mode::Mode;
use core_state::{ViewOutcome, ViewState};

/// One entry in the `-modi` list: a name plus a factory that (re)builds a
/// fresh `Mode` instance. Modes aren't `Clone`, so cycling back to a
/// previously visited mode re-runs its factory (re-scanning `$PATH`,
/// re-reading desktop files, ...) rather than reusing stale state.
pub struct ModeSlot {
    pub name: String,
    pub factory: Box<dyn Fn() -> anyhow::Result<Box<dyn Mode>>>,
}

impl ModeSlot {
    pub fn new(name: impl Into<String>, factory: impl Fn() -> anyhow::Result<Box<dyn Mode>> + 'static) -> Self {
        Self { name: name.into(), factory: Box::new(factory) }
    }
}

/// The `-modi` list plus the index of the mode currently shown.
pub struct ModeCycle {
    slots: Vec<ModeSlot>,
    current: usize,
}

impl ModeCycle {
    pub fn new(slots: Vec<ModeSlot>) -> Self {
        Self { slots, current: 0 }
    }

    pub fn current_name(&self) -> Option<&str> {
        self.slots.get(self.current).map(|s| s.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn build(&self, index: usize) -> anyhow::Result<Box<dyn Mode>> {
        (self.slots[index].factory)()
    }

    /// Advance to the next mode (wrapping) and build it. `None` if the list
    /// is empty (nothing to cycle to).
    pub fn next(&mut self) -> Option<anyhow::Result<Box<dyn Mode>>> {
        if self.slots.is_empty() {
            return None;
        }
        self.current = (self.current + 1) % self.slots.len();
        Some(self.build(self.current))
    }

    pub fn previous(&mut self) -> Option<anyhow::Result<Box<dyn Mode>>> {
        if self.slots.is_empty() {
            return None;
        }
        self.current = (self.current + self.slots.len() - 1) % self.slots.len();
        Some(self.build(self.current))
    }
}

/// Resolves raw key input to an `Action` and applies it to a `ViewState`,
/// handling the mode-cycling follow-up a `ViewOutcome` can ask for.
pub struct ActionDispatcher {
    pub bindings: core_keymap::KeyBindings,
    pub modes: ModeCycle,
}

impl ActionDispatcher {
    pub fn new(bindings: core_keymap::KeyBindings, modes: ModeCycle) -> Self {
        Self { bindings, modes }
    }

    pub fn handle_key(
        &mut self,
        view: &mut ViewState,
        mods: core_events::ModMask,
        key: core_keymap::KeySym,
        on_release: bool,
    ) {
        let Some(action) = self.bindings.resolve(mods, key, on_release) else {
            return;
        };
        self.dispatch(view, action);
    }

    pub fn dispatch(&mut self, view: &mut ViewState, action: core_keymap::Action) {
        let outcome = view.trigger_action(action);
        self.apply(view, outcome);
    }

    fn apply(&mut self, view: &mut ViewState, outcome: ViewOutcome) {
        match outcome {
            ViewOutcome::None => {}
            ViewOutcome::RequestModeNext => self.cycle(view, true),
            ViewOutcome::RequestModePrevious => self.cycle(view, false),
            ViewOutcome::SwitchMode(mode) => {
                if let Err(e) = view.switch_mode(mode) {
                    tracing::warn!(error = %e, "failed to switch to mode requested by Mode::result");
                }
            }
        }
    }

    fn cycle(&mut self, view: &mut ViewState, forward: bool) {
        let built = if forward { self.modes.next() } else { self.modes.previous() };
        let Some(built) = built else {
            tracing::warn!("mode cycling requested with an empty -modi list");
            return;
        };
        match built {
            Ok(mode) => {
                if let Err(e) = view.switch_mode(mode) {
                    tracing::warn!(error = %e, "failed to switch to the next/previous mode");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to build the next/previous mode"),
        }
    }
}
