//! Spell arguments
//!
//! Each [`SpellKind`](super::kind::SpellKind) parses its parenthesized argument
//! into one [`SpellArg`] variant. Arguments are totally ordered so the optimizer
//! can sort and deduplicate leaves, and serializable so compiled rulesets can be
//! persisted.

use super::regex_cache;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A parsed spell argument
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpellArg {
    /// Free text (escapes already removed)
    Text(String),
    /// A compiled `/source/flags` literal
    Regex(RegexArg),
    /// Numbers and inclusive ranges
    Ranges(Vec<NumRange>),
    /// Attachment weight/size comparator
    Image(ImageCondition),
    /// Selected spam heuristics
    Wipe(WipeChecks),
    /// Perceptual image hash
    Signature(u64),
}

// ============================================================================
// Regex literals
// ============================================================================

/// Serialized form of a [`RegexArg`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegexSource {
    source: String,
    flags: String,
}

/// A regex literal together with its compiled pattern
///
/// Equality, ordering and hashing only look at the source text and flags.
/// Flags are normalized: sorted, deduplicated, and `g` dropped.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "RegexSource", into = "RegexSource")]
pub struct RegexArg {
    source: String,
    flags: String,
    compiled: Regex,
}

impl RegexArg {
    /// Compile a literal, normalizing its flags
    pub fn new(source: &str, flags: &str) -> Result<Self, String> {
        let mut normalized: Vec<char> = flags.chars().filter(|c| *c != 'g').collect();
        normalized.sort_unstable();
        normalized.dedup();
        let flags: String = normalized.into_iter().collect();

        let compiled = regex_cache::get_or_compile(source, &flags)?;
        Ok(Self {
            source: source.to_string(),
            flags,
            compiled,
        })
    }

    /// Pattern text between the slashes, as written
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Normalized flag letters
    #[inline]
    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// The compiled pattern
    #[inline]
    pub fn regex(&self) -> &Regex {
        &self.compiled
    }

    /// Whether the pattern matches anywhere in `text`
    #[inline]
    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }
}

impl TryFrom<RegexSource> for RegexArg {
    type Error = String;

    fn try_from(value: RegexSource) -> Result<Self, Self::Error> {
        RegexArg::new(&value.source, &value.flags)
    }
}

impl From<RegexArg> for RegexSource {
    fn from(value: RegexArg) -> Self {
        RegexSource {
            source: value.source,
            flags: value.flags,
        }
    }
}

impl fmt::Debug for RegexArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl fmt::Display for RegexArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}

impl PartialEq for RegexArg {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl Eq for RegexArg {}

impl PartialOrd for RegexArg {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RegexArg {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.source, &self.flags).cmp(&(&other.source, &other.flags))
    }
}

impl Hash for RegexArg {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.flags.hash(state);
    }
}

// ============================================================================
// Numeric ranges
// ============================================================================

/// Inclusive numeric range; a single number `n` is `n-n`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NumRange {
    /// Lower bound (inclusive)
    pub min: u64,
    /// Upper bound (inclusive)
    pub max: u64,
}

impl NumRange {
    /// Create a range; callers guarantee `min <= max`
    #[inline]
    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// A range holding one number
    #[inline]
    pub fn single(value: u64) -> Self {
        Self::new(value, value)
    }

    /// Whether `value` lies within the range
    #[inline]
    pub fn contains(&self, value: u64) -> bool {
        self.min <= value && value <= self.max
    }
}

impl fmt::Display for NumRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

// ============================================================================
// Image comparator
// ============================================================================

/// Comparison operator of an `#img` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Comparison {
    /// `<`: strictly smaller
    Less,
    /// `=`: within the (inclusive) range
    Equal,
    /// `>`: strictly larger
    Greater,
}

impl Comparison {
    /// The operator character
    pub fn symbol(self) -> char {
        match self {
            Comparison::Less => '<',
            Comparison::Equal => '=',
            Comparison::Greater => '>',
        }
    }

    /// Parse the operator character
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '<' => Some(Comparison::Less),
            '=' => Some(Comparison::Equal),
            '>' => Some(Comparison::Greater),
            _ => None,
        }
    }

    fn holds(self, value: u64, bound: &NumRange) -> bool {
        match self {
            Comparison::Less => value < bound.min,
            Comparison::Equal => bound.contains(value),
            Comparison::Greater => value > bound.max,
        }
    }
}

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Inclusive range of dimensions; `WxH` alone is `WxH-WxH`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SizeRange {
    /// Lower bound on both axes
    pub min: Dimensions,
    /// Upper bound on both axes
    pub max: Dimensions,
}

impl fmt::Display for SizeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

/// `#img` argument: `(<|=|>) weight? (@ WxH (- WxH)?)?`
///
/// Weights are in kilobytes. At least one of `weight` and `size` is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ImageCondition {
    /// Comparison operator
    pub cmp: Comparison,
    /// Weight bound in kilobytes
    pub weight: Option<NumRange>,
    /// Pixel size bound
    pub size: Option<SizeRange>,
}

impl ImageCondition {
    /// Check one attachment; unknown weight or size never satisfies a bound
    pub fn matches(&self, weight_kb: Option<u64>, size: Option<Dimensions>) -> bool {
        if let Some(bound) = &self.weight {
            match weight_kb {
                Some(weight) if self.cmp.holds(weight, bound) => {}
                _ => return false,
            }
        }
        if let Some(bound) = &self.size {
            let Some(size) = size else {
                return false;
            };
            let width = NumRange::new(bound.min.width as u64, bound.max.width as u64);
            let height = NumRange::new(bound.min.height as u64, bound.max.height as u64);
            if !(self.cmp.holds(size.width as u64, &width)
                && self.cmp.holds(size.height as u64, &height))
            {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for ImageCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cmp.symbol())?;
        if let Some(weight) = &self.weight {
            write!(f, "{}", weight)?;
        }
        if let Some(size) = &self.size {
            write!(f, "@{}", size)?;
        }
        Ok(())
    }
}

// ============================================================================
// Spam heuristics
// ============================================================================

bitflags::bitflags! {
    /// Heuristics selected by a `#wipe` argument
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct WipeChecks: u8 {
        /// Many repeated lines
        const SAMELINES  = 1 << 0;
        /// Many repeated words
        const SAMEWORDS  = 1 << 1;
        /// Abnormally long words
        const LONGWORDS  = 1 << 2;
        /// Mostly punctuation and symbols
        const SYMBOLS    = 1 << 3;
        /// Mostly upper-case letters
        const CAPSLOCK   = 1 << 4;
        /// Mostly digits
        const NUMBERS    = 1 << 5;
        /// Mostly whitespace
        const WHITESPACE = 1 << 6;
    }
}

impl WipeChecks {
    /// Argument names, in bit order
    pub const NAMES: [(&'static str, WipeChecks); 7] = [
        ("samelines", WipeChecks::SAMELINES),
        ("samewords", WipeChecks::SAMEWORDS),
        ("longwords", WipeChecks::LONGWORDS),
        ("symbols", WipeChecks::SYMBOLS),
        ("capslock", WipeChecks::CAPSLOCK),
        ("numbers", WipeChecks::NUMBERS),
        ("whitespace", WipeChecks::WHITESPACE),
    ];

    /// Look a single check up by its argument name
    pub fn from_check_name(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, flag)| *flag)
    }
}

impl fmt::Display for WipeChecks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, flag) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}
