//! Thread-local regex cache for spell patterns
//!
//! Spell regexes are written as `/source/flags` literals. The same literal is
//! usually compiled several times (once while parsing, again when the
//! persisted ruleset is loaded, again for every context the optimizer runs
//! under), so compiled patterns are cached per thread.

use hashbrown::HashMap;
use regex::{Regex, RegexBuilder};
use std::cell::RefCell;

/// Flags accepted after the closing `/` of a regex literal
///
/// `g` is accepted for compatibility with user habits and has no effect:
/// spells only ask whether a pattern matches.
pub const SUPPORTED_FLAGS: &str = "gimsux";

/// Patterns kept per thread before the cache starts over
pub const MAX_CACHED_PATTERNS: usize = 512;

thread_local! {
    /// Thread-local cache of compiled regex patterns, keyed by (source, flags)
    static REGEX_CACHE: RefCell<HashMap<(String, String), Regex>> = RefCell::new(HashMap::new());
}

/// Get or compile a regex literal
///
/// # Arguments
/// * `source` - The pattern between the slashes
/// * `flags` - The flag letters after the closing slash
///
/// # Returns
/// * `Ok(Regex)` if the flags are supported and the pattern compiles
/// * `Err(message)` otherwise
pub fn get_or_compile(source: &str, flags: &str) -> Result<Regex, String> {
    if let Some(bad) = flags.chars().find(|c| !SUPPORTED_FLAGS.contains(*c)) {
        return Err(format!("unsupported regex flag '{}'", bad));
    }

    REGEX_CACHE.with(|cache| {
        let key = (source.to_string(), flags.to_string());
        if let Some(regex) = cache.borrow().get(&key) {
            return Ok(regex.clone());
        }

        let regex = build(source, flags)?;
        let mut cache = cache.borrow_mut();
        if cache.len() >= MAX_CACHED_PATTERNS {
            cache.clear();
        }
        cache.insert(key, regex.clone());
        Ok(regex)
    })
}

fn build(source: &str, flags: &str) -> Result<Regex, String> {
    RegexBuilder::new(source)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .unicode(true)
        .build()
        .map_err(|e| first_line(&e.to_string()))
}

fn first_line(message: &str) -> String {
    message
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with("error:"))
        .or_else(|| message.lines().next())
        .unwrap_or("invalid pattern")
        .trim()
        .to_string()
}

/// Clear the regex cache
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Get the number of cached patterns
pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}
