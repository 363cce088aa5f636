//! rofi entrypoint: CLI parsing, config/mode wiring and the terminal view.
use anyhow::{Context, Result};
use clap::Parser;
use core_actions::{ActionDispatcher, ModeCycle, ModeSlot};
use core_config::Config;
use core_matcher::MatchingMethod;
use core_mode::{CombiMode, DrunMode, Mode, RunMode, ScriptMode, SshMode, WindowMode};
use core_render::Decision;
use core_state::{MenuReturn, SortingMethod, ViewConfig, ViewFlags, ViewState};
use core_terminal::{CrosstermBackend, PidFile, TerminalBackend};
use crossterm::{cursor::MoveTo, queue, style, terminal};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

/// CLI surface (subset §6 names).
#[derive(Parser, Debug)]
#[command(name = "rofi", version, about = "A window switcher, application launcher and dmenu replacement")]
struct Args {
    /// Open this mode first; reorders -modi so it's the one shown at startup.
    #[arg(long = "show")]
    show: Option<String>,
    /// Comma-separated mode list. A `name:command` entry wraps a script mode.
    #[arg(long = "modi")]
    modi: Option<String>,
    /// Pre-filled input.
    #[arg(long = "filter")]
    filter: Option<String>,
    /// Pre-select the row whose display text matches exactly.
    #[arg(long = "select")]
    select: Option<String>,
    #[arg(long = "case-sensitive")]
    case_sensitive: bool,
    #[arg(long = "sort")]
    sort: bool,
    #[arg(long = "sorting-method")]
    sorting_method: Option<String>,
    #[arg(long = "matching")]
    matching: Option<String>,
    /// Output formatter applied to the accepted entry: s|i|d|q|f|F.
    #[arg(long = "format")]
    format: Option<String>,
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

struct AppStartup {
    backend: CrosstermBackend,
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self {
            backend: CrosstermBackend::new(),
            log_guard: None,
        }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("rofi.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "rofi.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => self.log_guard = Some(guard),
            Err(_err) => {
                // Global subscriber already installed (e.g. a test harness); drop our guard.
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// Build a single mode instance by name. `name:command` wraps `ScriptMode`'s
/// control-line protocol; anything else must be one of the built-ins.
fn build_single_mode(spec: &str) -> Option<Box<dyn Mode>> {
    if let Some((name, command)) = spec.split_once(':') {
        return Some(Box::new(ScriptMode::new_protocol(name.to_string(), command.to_string())));
    }
    match spec {
        "run" => Some(Box::new(RunMode::new())),
        "drun" => Some(Box::new(DrunMode::new())),
        "ssh" => Some(Box::new(SshMode::new())),
        "window" => Some(Box::new(WindowMode::new())),
        _ => None,
    }
}

/// Build a `ModeSlot` (a re-runnable factory, since modes aren't `Clone`) for
/// one `-modi` entry. `combi` pulls its member list from `config.combi_modes`.
fn build_mode_slot(spec: &str, config: &Config) -> Option<ModeSlot> {
    if let Some((name, command)) = spec.split_once(':') {
        let name = name.to_string();
        let command = command.to_string();
        return Some(ModeSlot::new(name.clone(), move || {
            Ok(Box::new(ScriptMode::new_protocol(name.clone(), command.clone())) as Box<dyn Mode>)
        }));
    }
    match spec {
        "run" => Some(ModeSlot::new("run", || Ok(Box::new(RunMode::new()) as Box<dyn Mode>))),
        "drun" => Some(ModeSlot::new("drun", || Ok(Box::new(DrunMode::new()) as Box<dyn Mode>))),
        "ssh" => Some(ModeSlot::new("ssh", || Ok(Box::new(SshMode::new()) as Box<dyn Mode>))),
        "window" => Some(ModeSlot::new("window", || Ok(Box::new(WindowMode::new()) as Box<dyn Mode>))),
        "combi" => {
            let members = config.combi_modes.clone();
            let hide_prefix = config.combi_hide_mode_prefix;
            Some(ModeSlot::new("combi", move || {
                let candidates = members.iter().filter_map(|m| build_single_mode(m)).collect::<Vec<_>>();
                Ok(Box::new(CombiMode::new("combi", candidates, hide_prefix)) as Box<dyn Mode>)
            }))
        }
        _ => None,
    }
}

fn matching_method(m: core_config::MatchingMethod) -> MatchingMethod {
    match m {
        core_config::MatchingMethod::Normal => MatchingMethod::Normal,
        core_config::MatchingMethod::Glob => MatchingMethod::Glob,
        core_config::MatchingMethod::Fuzzy => MatchingMethod::Fuzzy,
        core_config::MatchingMethod::Prefix => MatchingMethod::Prefix,
        core_config::MatchingMethod::Regex => MatchingMethod::Regex,
    }
}

fn sorting_method(m: core_config::SortingMethod) -> SortingMethod {
    match m {
        core_config::SortingMethod::None => SortingMethod::None,
        core_config::SortingMethod::Normal => SortingMethod::Normal,
        core_config::SortingMethod::Fzf => SortingMethod::Fzf,
    }
}

/// CLI flags override the loaded config field-by-field (§10.5: CLI wins).
fn apply_cli_overrides(config: &mut Config, args: &Args) {
    if args.case_sensitive {
        config.case_sensitive = true;
    }
    if args.sort && config.sorting_method == core_config::SortingMethod::None {
        config.sorting_method = core_config::SortingMethod::Normal;
    }
    if let Some(m) = args.sorting_method.as_deref() {
        match m {
            "normal" => config.sorting_method = core_config::SortingMethod::Normal,
            "fzf" => config.sorting_method = core_config::SortingMethod::Fzf,
            other => tracing::warn!(value = other, "unknown -sorting-method, ignoring"),
        }
    }
    if let Some(m) = args.matching.as_deref() {
        match m {
            "normal" => config.matching_method = core_config::MatchingMethod::Normal,
            "regex" => config.matching_method = core_config::MatchingMethod::Regex,
            "glob" => config.matching_method = core_config::MatchingMethod::Glob,
            "fuzzy" => config.matching_method = core_config::MatchingMethod::Fuzzy,
            "prefix" => config.matching_method = core_config::MatchingMethod::Prefix,
            other => tracing::warn!(value = other, "unknown -matching method, ignoring"),
        }
    }
}

fn view_config(config: &Config) -> ViewConfig {
    ViewConfig {
        method: matching_method(config.matching_method),
        case_sensitive: config.case_sensitive,
        tokenize: config.tokenize,
        negate_char: config.negate_char,
        threads: config.threads,
        sorting: sorting_method(config.sorting_method),
        auto_select: config.auto_select,
        cycle: config.cycle,
        ellipsize_start: config.ellipsize_start,
        history_max: config.history_max,
        ignored_prefixes: config.ignored_prefixes.clone(),
    }
}

/// `-select <s>`: select the row whose display text matches `s` exactly, if
/// one exists in the freshly filtered list.
fn apply_select(view: &mut ViewState, select: &str) {
    let rows: Vec<u32> = view.filtered().line_map.clone();
    for (pos, idx) in rows.iter().enumerate() {
        if let (Some(text), _) = view.mode().display(*idx, true) {
            if text == select {
                view.set_selected(pos as u32);
                return;
            }
        }
    }
}

/// Render `s` per one `-format` letter (§6). Unknown letters pass the
/// character straight through, matching the upstream formatter's behaviour
/// of leaving unrecognised `%x` sequences alone.
fn format_accepted(fmt: &str, selected_text: &str, mode_index: Option<u32>, row_index: Option<usize>, filter: &str) -> String {
    let mut out = String::new();
    for c in fmt.chars() {
        match c {
            's' => out.push_str(selected_text),
            'i' => out.push_str(&mode_index.map(|i| i as i64).unwrap_or(-1).to_string()),
            'd' => out.push_str(&row_index.map(|i| i as i64).unwrap_or(-1).to_string()),
            'q' => out.push_str(&core_plugin::shell_quote(selected_text)),
            'f' => out.push_str(filter),
            'F' => out.push_str(&core_plugin::shell_quote(filter)),
            other => out.push(other),
        }
    }
    out
}

fn pid_path() -> PathBuf {
    core_history::cache_dir().join("rofi.pid")
}

/// Minimal direct terminal paint: a prompt line plus as many filtered rows
/// as fit. The widget-tree/theme machinery a real compositor would bring is
/// out of scope (§1); this is the concrete `ViewProxy` the picker needs to
/// actually show something in a terminal.
fn draw(view: &ViewState, out: &mut impl std::io::Write) -> Result<()> {
    let (cols, rows) = terminal::size()?;
    queue!(out, terminal::Clear(terminal::ClearType::All), MoveTo(0, 0))?;

    let prompt = format!("{}> {}", view.mode().name(), view.input());
    queue!(out, style::Print(truncate(&prompt, cols as usize)))?;

    let list_rows = rows.saturating_sub(1);
    let filtered = view.filtered();
    for row in 0..list_rows {
        let Some(&idx) = filtered.line_map.get(row as usize) else { break };
        let (text, _flags) = view.mode().display(idx, true);
        let text = text.unwrap_or_default();
        queue!(out, MoveTo(0, row + 1))?;
        if Some(row) == selected_row(view) {
            queue!(out, style::SetAttribute(style::Attribute::Reverse))?;
            queue!(out, style::Print(truncate(&text, cols as usize)))?;
            queue!(out, style::SetAttribute(style::Attribute::Reset))?;
        } else {
            queue!(out, style::Print(truncate(&text, cols as usize)))?;
        }
    }
    out.flush()?;
    Ok(())
}

fn selected_row(view: &ViewState) -> Option<u16> {
    let selected = view.selected();
    (selected != u32::MAX).then_some(selected as u16)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let mut config = core_config::load_from(args.config.clone())?;
    apply_cli_overrides(&mut config, &args);

    let _pid_guard = match PidFile::acquire(pid_path()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            tracing::warn!(error = %e, "failed to acquire pid file, continuing without it");
            None
        }
    };

    let mut modi_names: Vec<String> = args
        .modi
        .as_deref()
        .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_else(|| vec!["window".to_string(), "run".to_string(), "ssh".to_string()]);

    if let Some(show) = args.show.as_ref() {
        match modi_names.iter().position(|n| n == show) {
            Some(pos) => modi_names.swap(0, pos),
            None => modi_names.insert(0, show.clone()),
        }
    }

    let mut slots = Vec::new();
    for name in &modi_names {
        match build_mode_slot(name, &config) {
            Some(slot) => slots.push(slot),
            None => tracing::warn!(mode = %name, "unknown mode in -modi, skipping"),
        }
    }
    anyhow::ensure!(!slots.is_empty(), "no usable modes configured (check -modi)");

    let initial_mode = build_single_mode(&modi_names[0]).context("failed to build the initially shown mode")?;
    let cycle = ModeCycle::new(slots);
    let dispatcher = ActionDispatcher::new(core_keymap::KeyBindings::defaults(), cycle);

    let initial_input = args.filter.clone().unwrap_or_default();
    let mut view = ViewState::create(initial_mode, &initial_input, ViewFlags::NORMAL, view_config(&config), None)?;
    if let Some(select) = args.select.as_ref() {
        apply_select(&mut view, select);
    }

    let mut backend = CrosstermBackend::new();
    backend.set_title("rofi")?;
    let mut stdout = std::io::stdout();
    let exit_code = {
        let _guard = backend.enter_guard()?;
        draw(&view, &mut stdout)?;
        let input_loop = core_input::InputLoop::new(dispatcher);
        input_loop
            .run(&mut view, |view, _decision: Decision| {
                if let Err(e) = draw(view, &mut stdout) {
                    tracing::warn!(error = %e, "failed to paint a frame");
                }
            })
            .await?
    };

    if view.retv() == MenuReturn::Ok {
        let selected_index = view.selected_index();
        let row_index = (view.selected() != u32::MAX).then_some(view.selected() as usize);
        let selected_text = match selected_index {
            Some(idx) => view.mode().display(idx, true).0.unwrap_or_default(),
            None => view.input().to_string(),
        };
        let text = match args.format.as_deref() {
            Some(fmt) => format_accepted(fmt, &selected_text, selected_index, row_index, view.input()),
            None => selected_text,
        };
        println!("{text}");
    }

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_accepted_substitutes_known_letters() {
        let out = format_accepted("s/i/d/q/f/F", "fi re fox", Some(3), Some(1), "fi re");
        assert_eq!(out, "fi re fox/3/1/'fi re fox'/fi re/'fi re'");
    }

    #[test]
    fn format_accepted_passes_through_unknown_letters() {
        assert_eq!(format_accepted("s%", "x", None, None, ""), "x%");
    }

    #[test]
    fn build_single_mode_recognises_builtins_and_script_shorthand() {
        assert_eq!(build_single_mode("run").unwrap().name(), "run");
        assert_eq!(build_single_mode("drun").unwrap().name(), "drun");
        assert_eq!(build_single_mode("ssh").unwrap().name(), "ssh");
        assert_eq!(build_single_mode("window").unwrap().name(), "window");
        assert_eq!(build_single_mode("bookmarks:printf foo").unwrap().name(), "bookmarks");
        assert!(build_single_mode("no-such-mode").is_none());
    }

    #[test]
    fn matching_and_sorting_methods_round_trip() {
        assert_eq!(matching_method(core_config::MatchingMethod::Fuzzy), MatchingMethod::Fuzzy);
        assert_eq!(sorting_method(core_config::SortingMethod::Fzf), SortingMethod::Fzf);
    }

    #[test]
    fn apply_cli_overrides_lets_case_sensitive_flag_win() {
        let mut config = Config::default();
        let args = Args {
            show: None,
            modi: None,
            filter: None,
            select: None,
            case_sensitive: true,
            sort: false,
            sorting_method: Some("fzf".to_string()),
            matching: Some("fuzzy".to_string()),
            format: None,
            config: None,
        };
        apply_cli_overrides(&mut config, &args);
        assert!(config.case_sensitive);
        assert_eq!(config.sorting_method, core_config::SortingMethod::Fzf);
        assert_eq!(config.matching_method, core_config::MatchingMethod::Fuzzy);
    }

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
        fn display(&self, idx: u32, want_text: bool) -> (Option<String>, core_mode::StateFlags) {
            (want_text.then(|| self.rows[idx as usize].to_string()), core_mode::StateFlags::empty())
        }
        fn completion(&self, idx: u32) -> String {
            self.rows[idx as usize].to_string()
        }
        fn result(&mut self, _event: core_mode::AcceptEvent, _input: &str, _idx: Option<u32>) -> core_mode::ModeResult {
            core_mode::ModeResult::Exit
        }
    }

    #[test]
    fn apply_select_picks_the_row_with_matching_display_text() {
        let dir = tempfile::tempdir().unwrap();
        unsafe { std::env::set_var("XDG_CACHE_HOME", dir.path()) };
        let mode = Box::new(Fixed { rows: vec!["firefox", "emacs", "vim"] });
        let mut view = ViewState::create(mode, "", ViewFlags::NORMAL, ViewConfig::default(), None).unwrap();
        apply_select(&mut view, "emacs");
        assert_eq!(view.selected(), 1);
    }
}
