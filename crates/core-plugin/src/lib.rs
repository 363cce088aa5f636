//! Script mode's external-process protocol (§6, §11.2, §11.3).
//!
//! A script mode entry names a shell command. Rofi runs it through `sh -c`
//! (so `$PATH` search and shell metacharacters work the way a user typing the
//! command at a prompt would expect, per §11.2) once with no arguments to get
//! the initial listing, then again with the selected row's text as `argv[1]`
//! each time an entry is accepted. Lines of stdout become rows; lines that
//! start with `\0<tag>\x1f<value>` are control lines instead and update the
//! running [`ScriptControl`]. A spawn failure is recoverable (§7 kind 2): the
//! mode just shows no rows, it does not abort the picker.
//!
//! Grounded on `examples/original_source/source/dialogs/script.c`'s row vs.
//! control-line split and its `\0field\x1fvalue` marker, re-expressed with
//! `std::process::Command` instead of the original's `g_spawn_*` plumbing.

use std::io::Read;
use std::process::{Command, Stdio};

const CONTROL_PREFIX: char = '\0';
const CONTROL_SEP: char = '\u{1f}';

/// Accumulated state from control lines seen across one script invocation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScriptControl {
    pub prompt: Option<String>,
    pub message: Option<String>,
    pub markup_rows: bool,
    pub urgent: Vec<usize>,
    pub active: Vec<usize>,
    pub delim: Option<char>,
    pub no_custom: bool,
    pub use_hot_keys: bool,
}

/// Parse one control line's tag/value pair into `ctrl`. Returns `false` for
/// unrecognised tags (logged and otherwise ignored, §7 kind 2) so the caller
/// can still count how many lines were actually understood.
fn apply_control(tag: &str, value: &str, ctrl: &mut ScriptControl) -> bool {
    match tag {
        "prompt" => ctrl.prompt = Some(value.to_string()),
        "message" => ctrl.message = Some(value.to_string()),
        "markup-rows" => ctrl.markup_rows = value == "true",
        "urgent" => ctrl.urgent = parse_index_list(value),
        "active" => ctrl.active = parse_index_list(value),
        "delim" => ctrl.delim = value.chars().next(),
        "no-custom" => ctrl.no_custom = value == "true",
        "use-hot-keys" => ctrl.use_hot_keys = value == "true",
        _ => {
            tracing::debug!(tag, value, "unrecognised script control tag");
            return false;
        }
    }
    true
}

fn parse_index_list(value: &str) -> Vec<usize> {
    value
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .collect()
}

/// Split one line of script output into either a display row or a control
/// update applied in place. Returns `None` for a recognised control line
/// (nothing to display), `Some(line)` otherwise.
pub fn parse_line(line: &str, ctrl: &mut ScriptControl) -> Option<String> {
    let mut chars = line.chars();
    if chars.next() != Some(CONTROL_PREFIX) {
        return Some(line.to_string());
    }
    let rest = chars.as_str();
    match rest.split_once(CONTROL_SEP) {
        Some((tag, value)) if apply_control(tag, value, ctrl) => None,
        _ => Some(line.to_string()),
    }
}

/// Parse a full buffer of script stdout into rows plus the merged control
/// state, splitting on `ctrl.delim` once known (default `\n`, §11.3).
pub fn parse_output(output: &str) -> (Vec<String>, ScriptControl) {
    let mut ctrl = ScriptControl::default();
    let mut rows = Vec::new();
    for line in output.split(ctrl.delim.unwrap_or('\n')) {
        if line.is_empty() {
            continue;
        }
        if let Some(row) = parse_line(line, &mut ctrl) {
            rows.push(row);
        }
    }
    (rows, ctrl)
}

/// Single-quote `s` for safe interpolation into a `sh -c` command line:
/// wraps in `'...'`, escaping embedded single quotes as `'\''`.
pub fn shell_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

/// Run `command` with no argument (the initial listing) or with `selected`
/// shell-quoted and appended (an accept re-invocation, §11.2/§11.3). stdout
/// is decoded lossily (`\u{fffd}` for invalid UTF-8); the child's exit code
/// is not inspected, matching the original implementation which only cares
/// about stdout.
pub fn run_script(command: &str, selected: Option<&str>) -> anyhow::Result<(Vec<String>, ScriptControl)> {
    let cmdline = match selected {
        Some(arg) => format!("{command} {}", shell_quote(arg)),
        None => command.to_string(),
    };
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&cmdline)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    let mut buf = Vec::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_end(&mut buf)?;
    }
    let _ = child.wait();
    let output = String::from_utf8_lossy(&buf);
    Ok(parse_output(&output))
}

/// One entry from the older two-field script protocol (§11.3): a file where
/// every line is `name:command`, the part before the first `:` is the
/// display row and everything after is run verbatim (no further parsing,
/// no control lines) when that row is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoFieldEntry {
    pub name: String,
    pub command: String,
}

/// Parse a two-field script config's full text into entries. Lines with no
/// `:` separator are skipped (malformed input degrades, not fatal, §7 kind 3).
pub fn parse_two_field(spec: &str) -> Vec<TwoFieldEntry> {
    spec.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            line.split_once(':').map(|(name, command)| TwoFieldEntry {
                name: name.to_string(),
                command: command.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_passes_through_plain_rows() {
        let mut ctrl = ScriptControl::default();
        assert_eq!(parse_line("hello world", &mut ctrl), Some("hello world".to_string()));
    }

    #[test]
    fn parse_line_applies_prompt_control() {
        let mut ctrl = ScriptControl::default();
        let line = format!("{CONTROL_PREFIX}prompt{CONTROL_SEP}pick one");
        assert_eq!(parse_line(&line, &mut ctrl), None);
        assert_eq!(ctrl.prompt.as_deref(), Some("pick one"));
    }

    #[test]
    fn parse_line_unknown_tag_is_passed_through_as_row() {
        let mut ctrl = ScriptControl::default();
        let line = format!("{CONTROL_PREFIX}bogus{CONTROL_SEP}value");
        assert_eq!(parse_line(&line, &mut ctrl), Some(line));
    }

    #[test]
    fn parse_output_collects_rows_and_control() {
        let buf = format!("one\n{CONTROL_PREFIX}urgent{CONTROL_SEP}0,2\ntwo\nthree\n");
        let (rows, ctrl) = parse_output(&buf);
        assert_eq!(rows, vec!["one".to_string(), "two".to_string(), "three".to_string()]);
        assert_eq!(ctrl.urgent, vec![0, 2]);
    }

    #[test]
    fn shell_quote_escapes_embedded_quotes() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("plain"), "'plain'");
    }

    #[test]
    fn run_script_initial_listing() {
        let (rows, ctrl) = run_script("printf 'a\\nb\\n'", None).unwrap();
        assert_eq!(rows, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ctrl, ScriptControl::default());
    }

    #[test]
    fn run_script_passes_selected_as_quoted_arg() {
        let (rows, _) = run_script("echo selected:", Some("needs quoting")).unwrap();
        assert_eq!(rows, vec!["selected: needs quoting".to_string()]);
    }

    #[test]
    fn parse_two_field_splits_on_first_colon() {
        let entries = parse_two_field("Firefox:firefox\nTerminal:xterm -e bash\nmalformed-line\n");
        assert_eq!(
            entries,
            vec![
                TwoFieldEntry { name: "Firefox".to_string(), command: "firefox".to_string() },
                TwoFieldEntry { name: "Terminal".to_string(), command: "xterm -e bash".to_string() },
            ]
        );
    }
}
