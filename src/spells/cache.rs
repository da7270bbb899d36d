//! Per-post decision memo
//!
//! Verdicts are cached by post number for one compiled ruleset. The cache
//! remembers the fingerprint and context it was filled under and drops every
//! entry as soon as it is used with a ruleset that differs in either.
//!
//! Also hosts the FNV-1a hash used for ruleset fingerprints.

use super::ast::Context;
use super::engine::Verdict;
use super::ruleset::CompiledRuleset;
use hashbrown::HashMap;

/// Default number of cached verdicts before the cache starts over
pub const DEFAULT_MAX_ENTRIES: usize = 16 * 1024;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash
#[inline]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut h = FNV_OFFSET_BASIS;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Verdicts of already evaluated posts
#[derive(Debug, Clone)]
pub struct DecisionCache {
    /// Fingerprint and context the entries belong to
    owner: Option<(u64, Context)>,
    entries: HashMap<u64, Verdict>,
    max_entries: usize,

    /// Statistics
    hits: u64,
    misses: u64,
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl DecisionCache {
    /// Create a cache holding at most `max_entries` verdicts
    pub fn new(max_entries: usize) -> Self {
        Self {
            owner: None,
            entries: HashMap::new(),
            max_entries: max_entries.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Attach the cache to `ruleset`, dropping entries from any other one
    ///
    /// Returns `true` when entries were invalidated.
    pub fn bind(&mut self, ruleset: &CompiledRuleset) -> bool {
        let current = match &self.owner {
            Some((fingerprint, context)) => ruleset.is_current(context, *fingerprint),
            None => false,
        };
        if current {
            return false;
        }

        let invalidated = !self.entries.is_empty();
        if invalidated {
            log_debug!(
                "dropping {} cached verdicts, ruleset {:016x} differs",
                self.entries.len(),
                ruleset.fingerprint
            );
        }
        self.entries.clear();
        self.owner = Some((ruleset.fingerprint, ruleset.context.clone()));
        invalidated
    }

    /// Cached verdict of post `number`
    pub fn get(&mut self, number: u64) -> Option<&Verdict> {
        match self.entries.get(&number) {
            Some(verdict) => {
                self.hits += 1;
                Some(verdict)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Remember the verdict of post `number`
    pub fn insert(&mut self, number: u64, verdict: Verdict) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&number) {
            self.entries.clear();
        }
        self.entries.insert(number, verdict);
    }

    /// Forget one post, e.g. after it was edited
    pub fn invalidate(&mut self, number: u64) -> Option<Verdict> {
        self.entries.remove(&number)
    }

    /// Drop every entry and the statistics
    pub fn clear(&mut self) {
        self.entries.clear();
        self.owner = None;
        self.hits = 0;
        self.misses = 0;
    }

    /// Get cache statistics: (hits, misses, hit rate)
    pub fn stats(&self) -> (u64, u64, f64) {
        let total = self.hits + self.misses;
        let hit_rate = if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        };
        (self.hits, self.misses, hit_rate)
    }

    /// Number of cached verdicts
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
