//! Query tokenization, matching and fuzzy scoring (§4.1/§4.2).
//!
//! Grounded in `helper.c`'s `tokenize`/`create_regex`/`glob_to_regex`/
//! `fuzzy_to_regex`/`levenshtein`, re-expressed with Rust's `regex` crate
//! standing in for GLib's `GRegex` and `unicode-normalization` standing in
//! for the NFKC fold GLib does via `g_utf8_normalize`.

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// How a query token is compiled into something that can test a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingMethod {
    Normal,
    Glob,
    Fuzzy,
    Prefix,
    Regex,
}

/// Knobs `tokenize` needs; mirrors the subset of `Config` that affects
/// compilation (kept separate from `core-config::Config` to avoid a
/// dependency cycle — the binary copies these fields across at startup).
#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    pub method: MatchingMethod,
    pub case_sensitive: bool,
    pub tokenize: bool,
    pub negate_char: char,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            method: MatchingMethod::Normal,
            case_sensitive: false,
            tokenize: true,
            negate_char: '-',
        }
    }
}

fn fold(s: &str, case_sensitive: bool) -> String {
    let nfkc: String = s.nfkc().collect();
    if case_sensitive { nfkc } else { nfkc.to_lowercase() }
}

#[derive(Debug, Clone)]
enum Compiled {
    Substring(String),
    Prefix(String),
    Regex(Box<Regex>),
}

/// One compiled query token: a matcher plus an invert flag (leading `-`) and
/// an optional field-prefix restriction (e.g. `title:` / `class:`), left
/// unimplemented at the field level since no Mode in this crate exposes
/// multi-field candidates yet. `Clone` lets `refilter` hand each worker chunk
/// its own copy of the compiled token list instead of sharing borrows across
/// thread boundaries.
#[derive(Debug, Clone)]
pub struct TokenMatcher {
    invert: bool,
    compiled: Compiled,
}

impl TokenMatcher {
    fn compile(raw: &str, cfg: MatcherConfig) -> Self {
        let (invert, text) = match raw.strip_prefix(cfg.negate_char) {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let compiled = match cfg.method {
            MatchingMethod::Normal => Compiled::Substring(fold(text, cfg.case_sensitive)),
            MatchingMethod::Prefix => Compiled::Prefix(fold(text, cfg.case_sensitive)),
            MatchingMethod::Glob => {
                Compiled::Regex(Box::new(compile_regex(&glob_to_regex(text), cfg.case_sensitive)))
            }
            MatchingMethod::Fuzzy => {
                Compiled::Regex(Box::new(compile_regex(&fuzzy_to_regex(text), cfg.case_sensitive)))
            }
            MatchingMethod::Regex => match try_compile_regex(text, cfg.case_sensitive) {
                Some(re) => Compiled::Regex(Box::new(re)),
                None => {
                    tracing::warn!(pattern = %text, "invalid regex token, falling back to substring match");
                    Compiled::Substring(fold(text, cfg.case_sensitive))
                }
            },
        };
        Self { invert, compiled }
    }

    fn test(&self, candidate: &str, case_sensitive: bool) -> bool {
        match &self.compiled {
            Compiled::Substring(needle) => fold(candidate, case_sensitive).contains(needle.as_str()),
            Compiled::Prefix(needle) => fold(candidate, case_sensitive).starts_with(needle.as_str()),
            Compiled::Regex(re) => re.is_match(candidate),
        }
    }
}

fn compile_regex(pattern: &str, case_sensitive: bool) -> Regex {
    try_compile_regex(pattern, case_sensitive)
        .unwrap_or_else(|| Regex::new(&regex::escape(pattern)).expect("escaped literal always compiles"))
}

fn try_compile_regex(pattern: &str, case_sensitive: bool) -> Option<Regex> {
    let built = if case_sensitive {
        pattern.to_string()
    } else {
        format!("(?i){pattern}")
    };
    Regex::new(&built).ok()
}

/// `*` -> `.*`, `?` -> `.`, everything else escaped. Grounded on `glob_to_regex`.
fn glob_to_regex(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            _ => out.push_str(&regex::escape(&ch.to_string())),
        }
    }
    out
}

/// Escape every code point and splice `.*` between them. Grounded on
/// `fuzzy_to_regex`; drops the upstream's capturing groups since nothing here
/// consumes per-character match spans.
fn fuzzy_to_regex(input: &str) -> String {
    let mut out = String::new();
    for (i, ch) in input.chars().enumerate() {
        if i > 0 {
            out.push_str(".*");
        }
        out.push_str(&regex::escape(&ch.to_string()));
    }
    out
}

/// `tokenize(query, config) -> Vec<TokenMatcher>`, per §4.1.
pub fn tokenize(query: &str, cfg: MatcherConfig) -> Vec<TokenMatcher> {
    if query.is_empty() {
        return Vec::new();
    }
    if !cfg.tokenize {
        return vec![TokenMatcher::compile(query, cfg)];
    }
    query
        .split_ascii_whitespace()
        .map(|tok| TokenMatcher::compile(tok, cfg))
        .collect()
}

/// `matches(tokens, candidate) -> bool`, per §4.1. Empty token list matches
/// everything.
pub fn matches(tokens: &[TokenMatcher], candidate: &str, case_sensitive: bool) -> bool {
    tokens
        .iter()
        .all(|t| t.invert ^ t.test(candidate, case_sensitive))
}

// ---------------------------------------------------------------------
// Scorer (§4.2)
// ---------------------------------------------------------------------

const LEADING_GAP: i64 = -4;
const GAP: i64 = -5;
const CONSECUTIVE: i64 = 12;
const NON_WORD: i64 = 12;
const WORD_START: i64 = 9;
const CAMEL: i64 = 7;
const PATTERN_START_MULT: i64 = 2;
const PATTERN_NON_START_MULT: i64 = 1;
const NEG_INF: i64 = i64::MIN / 4;

fn bonus_at(cand: &[char], j: usize) -> i64 {
    if j == 0 {
        return NON_WORD;
    }
    let prev = cand[j - 1];
    let cur = cand[j];
    if !prev.is_alphanumeric() {
        NON_WORD
    } else if (prev.is_lowercase() || prev.is_ascii_digit()) && cur.is_uppercase() {
        CAMEL
    } else if (prev.is_ascii_digit() && cur.is_alphabetic())
        || (prev.is_alphabetic() && cur.is_ascii_digit())
    {
        WORD_START
    } else {
        0
    }
}

/// Score `pattern` against `candidate`, per §4.2's DP. Returns `i32::MAX`
/// when `pattern` is not a subsequence of `candidate` (worst rank). Lower is
/// better: the raw maximized bonus total is negated so ascending sort order
/// matches "best match first", with `i32::MAX` sorting last.
pub fn score(pattern: &str, candidate: &str, case_sensitive: bool) -> i32 {
    if pattern.is_empty() {
        return 0;
    }
    let cand_orig: Vec<char> = candidate.nfkc().collect();
    let pat_fold: Vec<char> = if case_sensitive {
        pattern.nfkc().collect()
    } else {
        fold(pattern, false).chars().collect()
    };
    let cand_fold: Vec<char> = if case_sensitive {
        cand_orig.clone()
    } else {
        cand_orig.iter().collect::<String>().to_lowercase().chars().collect()
    };
    if cand_fold.len() != cand_orig.len() {
        // A lowercase mapping changed code point count (rare but possible):
        // fall back to purely folded text for bonus computation too, so
        // indices stay aligned.
        return score_aligned(&pat_fold, &cand_fold, &cand_fold);
    }
    score_aligned(&pat_fold, &cand_fold, &cand_orig)
}

fn score_aligned(pattern: &[char], cand_fold: &[char], cand_orig_for_bonus: &[char]) -> i32 {
    let plen = pattern.len();
    let clen = cand_fold.len();
    if plen == 0 {
        return 0;
    }
    if clen < plen {
        return i32::MAX;
    }
    let bonus: Vec<i64> = (0..clen).map(|j| bonus_at(cand_orig_for_bonus, j)).collect();

    let mut prev: Vec<i64> = vec![NEG_INF; clen];
    let mut cur: Vec<i64> = vec![NEG_INF; clen];

    for i in 0..plen {
        if i == 0 {
            // First pattern character: there is no prior row to gap from, so
            // the only alignment cost is the flat leading gap (not scaled by
            // how far into the candidate the match starts), per gap_penalty(0, _).
            for j in 0..clen {
                cur[j] = if cand_fold[j] == pattern[i] {
                    LEADING_GAP + PATTERN_START_MULT * bonus[j]
                } else {
                    NEG_INF
                };
            }
            std::mem::swap(&mut prev, &mut cur);
            cur.iter_mut().for_each(|v| *v = NEG_INF);
            continue;
        }
        let mut running_gap_max = NEG_INF;
        for j in 0..clen {
            if cand_fold[j] == pattern[i] {
                let diagonal = if j > 0 && prev[j - 1] > NEG_INF {
                    prev[j - 1] + CONSECUTIVE + bonus[j]
                } else {
                    NEG_INF
                };
                let gap = if running_gap_max > NEG_INF {
                    running_gap_max + GAP * j as i64
                } else {
                    NEG_INF
                };
                let gap_total = if gap > NEG_INF {
                    gap + PATTERN_NON_START_MULT * bonus[j]
                } else {
                    NEG_INF
                };
                cur[j] = diagonal.max(gap_total);
            } else {
                cur[j] = NEG_INF;
            }
            if prev[j] > NEG_INF {
                let candidate_val = prev[j] - GAP * (j as i64 + 1);
                if candidate_val > running_gap_max {
                    running_gap_max = candidate_val;
                }
            }
        }
        std::mem::swap(&mut prev, &mut cur);
        cur.iter_mut().for_each(|v| *v = NEG_INF);
    }

    let best = prev.iter().copied().max().unwrap_or(NEG_INF);
    if best <= NEG_INF {
        i32::MAX
    } else {
        i32::try_from(-best).unwrap_or(i32::MIN)
    }
}

/// Case-folding Levenshtein distance (§11.4), grounded on `helper.c`'s
/// `levenshtein`.
pub fn levenshtein(needle: &str, haystack: &str, case_sensitive: bool) -> u32 {
    let needle: Vec<char> = if case_sensitive {
        needle.chars().collect()
    } else {
        needle.to_lowercase().chars().collect()
    };
    let haystack: Vec<char> = if case_sensitive {
        haystack.chars().collect()
    } else {
        haystack.to_lowercase().chars().collect()
    };
    let mut column: Vec<u32> = (0..=needle.len() as u32).collect();
    for (x, &hc) in haystack.iter().enumerate() {
        let x = x as u32 + 1;
        let mut lastdiag = x - 1;
        column[0] = x;
        for (y, &nc) in needle.iter().enumerate() {
            let y = y + 1;
            let olddiag = column[y];
            let cost = if nc == hc { 0 } else { 1 };
            column[y] = (column[y] + 1).min(column[y - 1] + 1).min(lastdiag + cost);
            lastdiag = olddiag;
        }
    }
    column[needle.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(method: MatchingMethod) -> MatcherConfig {
        MatcherConfig {
            method,
            ..MatcherConfig::default()
        }
    }

    #[test]
    fn tokenize_empty_query_matches_everything() {
        let tokens = tokenize("", cfg(MatchingMethod::Normal));
        assert!(tokens.is_empty());
        assert!(matches(&tokens, "anything", false));
    }

    #[test]
    fn tokenize_splits_on_whitespace() {
        let tokens = tokenize("foo bar", cfg(MatchingMethod::Normal));
        assert_eq!(tokens.len(), 2);
        assert!(matches(&tokens, "foobar.txt", false));
        assert!(!matches(&tokens, "foo.txt", false));
    }

    #[test]
    fn tokenize_disabled_keeps_whole_query_as_one_token() {
        let mut c = cfg(MatchingMethod::Normal);
        c.tokenize = false;
        let tokens = tokenize("foo bar", c);
        assert_eq!(tokens.len(), 1);
        assert!(!matches(&tokens, "foo bXr", false));
    }

    #[test]
    fn negation_inverts_match() {
        let tokens = tokenize("-bar", cfg(MatchingMethod::Normal));
        assert!(matches(&tokens, "foo.txt", false));
        assert!(!matches(&tokens, "foobar.txt", false));
    }

    #[test]
    fn normal_match_is_case_insensitive_by_default() {
        let tokens = tokenize("FOO", cfg(MatchingMethod::Normal));
        assert!(matches(&tokens, "a foo b", false));
    }

    #[test]
    fn case_sensitive_normal_match() {
        let tokens = tokenize("FOO", cfg(MatchingMethod::Normal));
        assert!(!matches(&tokens, "a foo b", true));
    }

    #[test]
    fn glob_star_and_question_mark() {
        let tokens = tokenize("fo?.*", cfg(MatchingMethod::Glob));
        assert!(matches(&tokens, "fox.txt", false));
        assert!(!matches(&tokens, "fo.txt", false));
    }

    #[test]
    fn fuzzy_is_subsequence() {
        let tokens = tokenize("fb", cfg(MatchingMethod::Fuzzy));
        assert!(matches(&tokens, "foobar", false));
        assert!(!matches(&tokens, "bfoo", false));
    }

    #[test]
    fn prefix_match() {
        let tokens = tokenize("fire", cfg(MatchingMethod::Prefix));
        assert!(matches(&tokens, "firefox", false));
        assert!(!matches(&tokens, "xfirefox", false));
    }

    #[test]
    fn regex_method_degrades_on_bad_pattern() {
        let tokens = tokenize("(unterminated", cfg(MatchingMethod::Regex));
        assert!(matches(&tokens, "literal (unterminated here", false));
    }

    #[test]
    fn anchored_regex_matches_every_entry_starting_with_x_and_ending_in_y() {
        let tokens = tokenize("^x.*y$", cfg(MatchingMethod::Regex));
        let entries = ["xay", "xy", "xby", "xayy"];
        let visible: Vec<&str> = entries.into_iter().filter(|e| matches(&tokens, e, false)).collect();
        // `^x.*y$` only constrains the first and last character; "xayy"
        // ends in `y` too, so `.*` just backtracks one further and it
        // matches the same as the other three.
        assert_eq!(visible, vec!["xay", "xy", "xby", "xayy"]);
    }

    #[test]
    fn scorer_returns_max_when_not_subsequence() {
        assert_eq!(score("xyz", "foobar", false), i32::MAX);
    }

    #[test]
    fn scorer_empty_pattern_scores_zero() {
        assert_eq!(score("", "foobar", false), 0);
    }

    #[test]
    fn scorer_prefers_consecutive_match() {
        let consecutive = score("fo", "foobar", false);
        let scattered = score("fo", "f_o_obar", false);
        assert!(consecutive < scattered, "{consecutive} should rank before {scattered}");
    }

    #[test]
    fn scorer_prefers_word_boundary_start() {
        let at_boundary = score("bar", "foo_bar", false);
        let mid_word = score("bar", "foobarish", false);
        assert!(at_boundary <= mid_word);
    }

    #[test]
    fn scorer_is_case_insensitive_by_default() {
        assert_eq!(score("FOO", "foobar", false), score("foo", "foobar", false));
    }

    #[test]
    fn levenshtein_identical_strings_is_zero() {
        assert_eq!(levenshtein("abc", "abc", true), 0);
    }

    #[test]
    fn levenshtein_counts_single_edits() {
        assert_eq!(levenshtein("kitten", "sitting", true), 3);
    }

    #[test]
    fn levenshtein_case_folds_by_default() {
        assert_eq!(levenshtein("ABC", "abc", false), 0);
        assert_eq!(levenshtein("ABC", "abc", true), 3);
    }
}
