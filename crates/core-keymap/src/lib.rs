//! Key-binding parsing and lookup (§4.5).
//!
//! Bindings are flat: `"mod+mod+key" -> Action`. There is no multi-key
//! composition here (no chords, no leader sequences): a single canonicalised
//! `(ModMask, KeySym)` pair is looked up in a table at runtime and the first
//! match wins.

use core_events::{ModMask, NamedKey};
use thiserror::Error;

/// The symbolic verbs a key combination can be bound to. `core-actions`
/// consumes these and mutates a `ViewState` accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    RowUp,
    RowDown,
    RowLeft,
    RowRight,
    RowTab,
    RowFirst,
    RowLast,
    PageNext,
    PagePrev,
    AcceptEntry,
    AcceptCustom,
    DeleteEntry,
    ModeNext,
    ModePrevious,
    Cancel,
    MoveCursorLeft,
    MoveCursorRight,
    MoveCursorStart,
    MoveCursorEnd,
    DeleteCharBefore,
    DeleteCharAfter,
    ClearInput,
    ToggleCaseSensitivity,
}

/// A resolved, bindable key: either a printable character or a named key.
/// Stands in for the "keysym" the trailing token of a binding string
/// resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySym {
    Char(char),
    Named(NamedKey),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty key binding string")]
    Empty,
    #[error("unknown modifier or key token: {0}")]
    UnknownToken(String),
    #[error("binding has more than one non-modifier token: {0}")]
    MultipleKeyTokens(String),
    #[error("binding has no non-modifier token: {0}")]
    NoKeyToken(String),
}

/// Parsed form of a binding string, prior to being associated with an `Action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedBinding {
    pub mods: ModMask,
    pub key: KeySym,
    /// `true` when the string had a leading `!`, meaning "trigger on release".
    pub on_release: bool,
}

/// `parse("Ctrl+Shift+p") -> ParsedBinding { mods: CTRL|SHIFT, key: Char('p'), .. }`.
///
/// Splits on `+` or `-`; modifier words (case-insensitive) `Shift`, `Control`
/// (`Ctrl`), `Alt`, `Meta`, `Super`/`Hyper` set mask bits. A leading `!` means
/// "on release". Exactly one non-modifier token must remain, resolved via the
/// named-key table below, falling back to a single Unicode code point.
pub fn parse(spec: &str) -> Result<ParsedBinding, ParseError> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    let (on_release, rest) = match trimmed.strip_prefix('!') {
        Some(r) => (true, r),
        None => (false, trimmed),
    };
    let mut mods = ModMask::empty();
    let mut key: Option<KeySym> = None;
    for token in rest.split(['+', '-']).map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(m) = modifier_bit(token) {
            mods |= m;
            continue;
        }
        if key.is_some() {
            return Err(ParseError::MultipleKeyTokens(spec.to_string()));
        }
        key = Some(resolve_keysym(token).ok_or_else(|| ParseError::UnknownToken(token.to_string()))?);
    }
    let key = key.ok_or_else(|| ParseError::NoKeyToken(spec.to_string()))?;
    Ok(ParsedBinding {
        mods,
        key,
        on_release,
    })
}

fn modifier_bit(token: &str) -> Option<ModMask> {
    Some(match token.to_ascii_lowercase().as_str() {
        "shift" => ModMask::SHIFT,
        "control" | "ctrl" => ModMask::CTRL,
        "alt" => ModMask::ALT,
        "meta" => ModMask::META,
        "super" | "hyper" => ModMask::SUPER,
        _ => return None,
    })
}

fn resolve_keysym(token: &str) -> Option<KeySym> {
    let named = match token.to_ascii_lowercase().as_str() {
        "return" | "enter" => NamedKey::Enter,
        "escape" | "esc" => NamedKey::Esc,
        "backspace" => NamedKey::Backspace,
        "tab" => NamedKey::Tab,
        "up" => NamedKey::Up,
        "down" => NamedKey::Down,
        "left" => NamedKey::Left,
        "right" => NamedKey::Right,
        "home" => NamedKey::Home,
        "end" => NamedKey::End,
        "page_up" | "pageup" | "prior" => NamedKey::PageUp,
        "page_down" | "pagedown" | "next" => NamedKey::PageDown,
        "insert" => NamedKey::Insert,
        "delete" => NamedKey::Delete,
        _ => {
            if let Some(n) = token
                .to_ascii_lowercase()
                .strip_prefix('f')
                .and_then(|d| d.parse::<u8>().ok())
            {
                NamedKey::F(n)
            } else if token.chars().count() == 1 {
                return token.chars().next().map(KeySym::Char);
            } else {
                return None;
            }
        }
    };
    Some(KeySym::Named(named))
}

/// A flat table mapping `(ModMask, KeySym, on_release)` to `Action`.
///
/// Lookup is linear and first-hit-wins; later `bind` calls for an already
/// bound key shadow earlier ones rather than erroring, mirroring config
/// files applied in sequence.
#[derive(Debug, Default, Clone)]
pub struct KeyBindings {
    table: Vec<(ModMask, KeySym, bool, Action)>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `spec` and bind it to `action`. Parse errors are returned to the
    /// caller to surface as a user-input error (§7 kind 1) rather than
    /// panicking; the binding is simply not installed.
    pub fn bind(&mut self, spec: &str, action: Action) -> Result<(), ParseError> {
        let parsed = parse(spec)?;
        self.table
            .push((parsed.mods, parsed.key, parsed.on_release, action));
        Ok(())
    }

    /// Look up the action bound to a canonicalised `(mods, key)` pair for the
    /// given release-state. First hit wins.
    pub fn resolve(&self, mods: ModMask, key: KeySym, on_release: bool) -> Option<Action> {
        self.table
            .iter()
            .find(|(m, k, rel, _)| *m == mods && *k == key && *rel == on_release)
            .map(|(_, _, _, a)| *a)
    }

    /// A reasonable set of defaults, grounded in Rofi's conventional
    /// bindings: arrow/emacs-style navigation, Tab to cycle, Enter to
    /// accept, Escape to cancel.
    pub fn defaults() -> Self {
        let mut kb = Self::new();
        let binds: &[(&str, Action)] = &[
            ("Up", Action::RowUp),
            ("Down", Action::RowDown),
            ("Control+p", Action::RowUp),
            ("Control+n", Action::RowDown),
            ("Page_Up", Action::PagePrev),
            ("Page_Down", Action::PageNext),
            ("Home", Action::RowFirst),
            ("End", Action::RowLast),
            ("Tab", Action::RowTab),
            ("Return", Action::AcceptEntry),
            ("Control+Return", Action::AcceptCustom),
            ("Shift+Delete", Action::DeleteEntry),
            ("Escape", Action::Cancel),
            ("Left", Action::MoveCursorLeft),
            ("Right", Action::MoveCursorRight),
            ("Control+a", Action::MoveCursorStart),
            ("Control+e", Action::MoveCursorEnd),
            ("BackSpace", Action::DeleteCharBefore),
            ("Delete", Action::DeleteCharAfter),
            ("Control+u", Action::ClearInput),
            ("Control+Tab", Action::ModeNext),
            ("Control+Shift+Tab", Action::ModePrevious),
            ("Control+i", Action::ToggleCaseSensitivity),
        ];
        for (spec, action) in binds {
            kb.bind(spec, *action)
                .expect("built-in default bindings must parse");
        }
        kb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modifiers_and_key() {
        let p = parse("Ctrl+Shift+p").unwrap();
        assert_eq!(p.mods, ModMask::CTRL | ModMask::SHIFT);
        assert_eq!(p.key, KeySym::Char('p'));
        assert!(!p.on_release);
    }

    #[test]
    fn parse_dash_separator_and_named_key() {
        let p = parse("Control-Return").unwrap();
        assert_eq!(p.mods, ModMask::CTRL);
        assert_eq!(p.key, KeySym::Named(NamedKey::Enter));
    }

    #[test]
    fn parse_on_release_prefix() {
        let p = parse("!Control+p").unwrap();
        assert!(p.on_release);
        assert_eq!(p.mods, ModMask::CTRL);
    }

    #[test]
    fn parse_function_key() {
        let p = parse("F5").unwrap();
        assert_eq!(p.key, KeySym::Named(NamedKey::F(5)));
    }

    #[test]
    fn parse_rejects_multiple_key_tokens() {
        assert_eq!(
            parse("a+b"),
            Err(ParseError::MultipleKeyTokens("a+b".to_string()))
        );
    }

    #[test]
    fn parse_rejects_unknown_token() {
        assert!(matches!(parse("Ctrl+Xyzzy"), Err(ParseError::UnknownToken(_))));
    }

    #[test]
    fn parse_rejects_modifiers_only() {
        assert!(matches!(parse("Ctrl+Shift"), Err(ParseError::NoKeyToken(_))));
    }

    #[test]
    fn first_hit_wins_on_duplicate_bind() {
        let mut kb = KeyBindings::new();
        kb.bind("Ctrl+p", Action::RowUp).unwrap();
        kb.bind("Ctrl+p", Action::RowDown).unwrap();
        let resolved = kb.resolve(ModMask::CTRL, KeySym::Char('p'), false);
        assert_eq!(resolved, Some(Action::RowUp));
    }

    #[test]
    fn resolve_missing_binding_is_none() {
        let kb = KeyBindings::new();
        assert_eq!(kb.resolve(ModMask::empty(), KeySym::Char('z'), false), None);
    }

    #[test]
    fn defaults_resolve_enter_to_accept() {
        let kb = KeyBindings::defaults();
        let resolved = kb.resolve(ModMask::empty(), KeySym::Named(NamedKey::Enter), false);
        assert_eq!(resolved, Some(Action::AcceptEntry));
    }
}
