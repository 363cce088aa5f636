//! Configuration loading (§10.3).
//!
//! A typed `Config` record (`serde::Deserialize`, `#[serde(default)]`
//! throughout) loaded the way the teacher's `discover`/`load_from` pair
//! always has: check a local override file first, then fall back to
//! `dirs::config_dir()`-relative `rofi/config.toml`. A malformed file
//! degrades to `Config::default()` rather than aborting the picker, logged
//! at `warn` so the degradation isn't silent.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};

/// Mirrors `core_matcher::MatchingMethod` with `Deserialize` attached. Kept
/// as a separate type (rather than deriving `Deserialize` on the matcher's
/// own enum) to avoid a `core-matcher` dependency here — the binary is the
/// one place that converts a loaded `Config` into the crates that act on it.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchingMethod {
    #[default]
    Normal,
    Glob,
    Fuzzy,
    Prefix,
    Regex,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortingMethod {
    #[default]
    None,
    Normal,
    Fzf,
}

fn default_negate_char() -> char {
    '-'
}

fn default_history_max() -> usize {
    25
}

fn default_cycle() -> bool {
    true
}

fn default_tokenize() -> bool {
    true
}

/// Refilter falls back to filter-only-on-accept once the candidate count
/// exceeds this, per §7's "cancellation/timeout" note — an optimisation,
/// not a correctness requirement, so a generous default costs nothing.
fn default_refilter_timeout_limit() -> usize {
    20_000
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub matching_method: MatchingMethod,
    pub sorting_method: SortingMethod,
    pub case_sensitive: bool,
    #[serde(default = "default_tokenize")]
    pub tokenize: bool,
    /// `0` auto-sizes to available parallelism (`core_worker::WorkerPool`).
    pub threads: usize,
    #[serde(default = "default_negate_char")]
    pub negate_char: char,
    pub auto_select: bool,
    #[serde(default = "default_cycle")]
    pub cycle: bool,
    pub ellipsize_start: bool,
    pub ignored_prefixes: Vec<String>,
    pub combi_modes: Vec<String>,
    pub combi_hide_mode_prefix: bool,
    #[serde(default = "default_history_max")]
    pub history_max: usize,
    #[serde(default = "default_refilter_timeout_limit")]
    pub refilter_timeout_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            matching_method: MatchingMethod::default(),
            sorting_method: SortingMethod::default(),
            case_sensitive: false,
            tokenize: default_tokenize(),
            threads: 0,
            negate_char: default_negate_char(),
            auto_select: false,
            cycle: default_cycle(),
            ellipsize_start: false,
            ignored_prefixes: Vec::new(),
            combi_modes: Vec::new(),
            combi_hide_mode_prefix: false,
            history_max: default_history_max(),
            refilter_timeout_limit: default_refilter_timeout_limit(),
        }
    }
}

/// Best-effort config path: a local `rofi.toml` override, else
/// `dirs::config_dir()/rofi/config.toml`.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("rofi.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("rofi").join("config.toml");
    }
    PathBuf::from("rofi.toml")
}

/// Load from `path` (or `discover()` if `None`). A missing file yields
/// defaults silently; a malformed one yields defaults with a `warn` log
/// (§7 kind 2: degrade, don't abort).
pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<Config>(&content) {
        Ok(cfg) => Ok(cfg),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse config file, using defaults");
            Ok(Config::default())
        }
    }
}
