//! Spam heuristics behind `#wipe`
//!
//! Each check looks at the plain post text only. Ratios are computed over
//! characters (not bytes) and every check has a minimum text size below
//! which it never fires, so short posts are not flagged by accident.

use super::arg::WipeChecks;
use hashbrown::HashMap;

/// Default number of lines before `samelines` applies
pub const DEFAULT_MIN_LINES: usize = 6;

/// Default number of copies of one line that counts as repetition
pub const DEFAULT_REPEATED_LINES: usize = 5;

/// Default number of words before `samewords` applies
pub const DEFAULT_MIN_WORDS: usize = 10;

/// Default maximum share of distinct words in a repetitive post
pub const DEFAULT_UNIQUE_WORDS_RATIO: f64 = 0.25;

/// Default word length considered abnormal
pub const DEFAULT_LONG_WORD_LEN: usize = 70;

/// Default minimum text length for the ratio checks
pub const DEFAULT_MIN_LENGTH: usize = 30;

/// Default share of symbols, digits or whitespace that counts as noise
pub const DEFAULT_NOISE_RATIO: f64 = 0.4;

/// Default share of upper-case letters that counts as shouting
pub const DEFAULT_CAPS_RATIO: f64 = 0.6;

/// Default number of letters before `capslock` applies
pub const DEFAULT_MIN_LETTERS: usize = 10;

/// Tunable limits of the spam heuristics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WipeThresholds {
    /// Lines needed before `samelines` applies
    pub min_lines: usize,
    /// Copies of one line that count as repetition
    pub repeated_lines: usize,
    /// Words needed before `samewords` applies
    pub min_words: usize,
    /// `samewords` fires when distinct words / words is at most this
    pub unique_words_ratio: f64,
    /// Words at least this long trigger `longwords`
    pub long_word_len: usize,
    /// Characters needed before the ratio checks apply
    pub min_length: usize,
    /// Share of symbols, digits or whitespace that counts as noise
    pub noise_ratio: f64,
    /// Share of upper-case letters that counts as shouting
    pub caps_ratio: f64,
    /// Letters needed before `capslock` applies
    pub min_letters: usize,
}

impl Default for WipeThresholds {
    fn default() -> Self {
        Self {
            min_lines: DEFAULT_MIN_LINES,
            repeated_lines: DEFAULT_REPEATED_LINES,
            min_words: DEFAULT_MIN_WORDS,
            unique_words_ratio: DEFAULT_UNIQUE_WORDS_RATIO,
            long_word_len: DEFAULT_LONG_WORD_LEN,
            min_length: DEFAULT_MIN_LENGTH,
            noise_ratio: DEFAULT_NOISE_RATIO,
            caps_ratio: DEFAULT_CAPS_RATIO,
            min_letters: DEFAULT_MIN_LETTERS,
        }
    }
}

/// First selected check that fires on `text`, in bit order
pub fn detect(text: &str, checks: WipeChecks, limits: &WipeThresholds) -> Option<WipeChecks> {
    WipeChecks::NAMES
        .iter()
        .map(|(_, flag)| *flag)
        .filter(|flag| checks.contains(*flag))
        .find(|flag| fires(*flag, text, limits))
}

fn fires(check: WipeChecks, text: &str, limits: &WipeThresholds) -> bool {
    if check == WipeChecks::SAMELINES {
        same_lines(text, limits)
    } else if check == WipeChecks::SAMEWORDS {
        same_words(text, limits)
    } else if check == WipeChecks::LONGWORDS {
        long_words(text, limits)
    } else if check == WipeChecks::SYMBOLS {
        share(text, limits, |c| !c.is_alphanumeric() && !c.is_whitespace())
    } else if check == WipeChecks::CAPSLOCK {
        caps_lock(text, limits)
    } else if check == WipeChecks::NUMBERS {
        share(text, limits, |c| c.is_numeric())
    } else if check == WipeChecks::WHITESPACE {
        share(text, limits, char::is_whitespace)
    } else {
        false
    }
}

fn same_lines(text: &str, limits: &WipeThresholds) -> bool {
    let lines: Vec<&str> = text.trim_end().lines().map(str::trim).collect();
    if lines.len() < limits.min_lines {
        return false;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for line in lines.iter().filter(|l| !l.is_empty()) {
        *counts.entry(line).or_insert(0) += 1;
    }
    counts
        .values()
        .any(|&n| n >= limits.repeated_lines && n * 4 > lines.len())
}

fn same_words(text: &str, limits: &WipeThresholds) -> bool {
    let words: Vec<String> = text
        .split(|c: char| c.is_whitespace() || ".,!?:;>-".contains(c))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.len() < limits.min_words {
        return false;
    }

    let mut distinct: Vec<&String> = words.iter().collect();
    distinct.sort_unstable();
    distinct.dedup();
    (distinct.len() as f64) <= words.len() as f64 * limits.unique_words_ratio
}

fn long_words(text: &str, limits: &WipeThresholds) -> bool {
    text.split_whitespace()
        .filter(|w| !w.contains("://"))
        .any(|w| w.chars().count() >= limits.long_word_len)
}

fn caps_lock(text: &str, limits: &WipeThresholds) -> bool {
    let (upper, letters) = text
        .chars()
        .filter(|c| c.is_alphabetic() && (c.is_uppercase() || c.is_lowercase()))
        .fold((0usize, 0usize), |(upper, letters), c| {
            (upper + usize::from(c.is_uppercase()), letters + 1)
        });
    letters >= limits.min_letters && upper as f64 > letters as f64 * limits.caps_ratio
}

fn share(text: &str, limits: &WipeThresholds, matches: impl Fn(char) -> bool) -> bool {
    let (hits, total) = text.chars().fold((0usize, 0usize), |(hits, total), c| {
        (hits + usize::from(matches(c)), total + 1)
    });
    total >= limits.min_length && hits as f64 > total as f64 * limits.noise_ratio
}
