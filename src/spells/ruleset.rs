//! Compile pipeline and persisted form
//!
//! ```text
//! source ──parse──▶ ParsedRules ──optimize(context)──▶ CompiledRuleset
//!                        │                                   ▲
//!                        └──optimize(None) ─▶ print ─▶ FNV ──┘ fingerprint
//! ```
//!
//! The fingerprint is computed from the context-free canonical form, so it
//! does not depend on clause order or on the board being viewed. Whether a
//! compiled ruleset can be reused therefore depends on both the fingerprint
//! and the context it was compiled for, see [`CompiledRuleset::is_current`].

use super::ast::{apply_rules, Context, Group, ParsedRules, ReplacementRule};
use super::cache::fnv1a;
use super::error::{PersistError, SyntaxError};
use super::optimizer::{filter_rules, optimize};
use super::parser::parse;
use super::printer::Printer;
use serde::{Deserialize, Serialize};

/// Rules ready for evaluation in one context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRuleset {
    /// Stable hash of the rules, independent of context and clause order
    pub fingerprint: u64,
    /// Canonical filter tree; `None` means no post can match
    pub filter: Option<Group>,
    /// `#rep` rules active in `context`
    pub incoming: Vec<ReplacementRule>,
    /// `#outrep` rules active in `context`
    pub outgoing: Vec<ReplacementRule>,
    /// Context the tree was optimized for
    pub context: Context,
}

impl CompiledRuleset {
    /// Assemble a ruleset from already canonical parts
    ///
    /// The fingerprint covers exactly these parts.
    pub fn from_parts(
        filter: Option<Group>,
        incoming: Vec<ReplacementRule>,
        outgoing: Vec<ReplacementRule>,
        context: Context,
    ) -> Self {
        let mut ruleset = Self {
            fingerprint: 0,
            filter,
            incoming,
            outgoing,
            context,
        };
        ruleset.fingerprint = fnv1a(Printer::new().print_ruleset(&ruleset).as_bytes());
        ruleset
    }

    /// Whether this ruleset was compiled from rules with `fingerprint` for `context`
    ///
    /// When `false` the optimizer has to run again, even if only the context
    /// moved.
    #[inline]
    pub fn is_current(&self, context: &Context, fingerprint: u64) -> bool {
        self.fingerprint == fingerprint && self.context == *context
    }

    /// Whether no post can match
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filter.is_none()
    }

    /// Rewrite text of an incoming post
    pub fn apply_incoming(&self, text: &str) -> String {
        apply_rules(&self.incoming, text)
    }

    /// Rewrite text the user is about to send
    pub fn apply_outgoing(&self, text: &str) -> String {
        apply_rules(&self.outgoing, text)
    }

    /// Serialize with the timestamp of the source it came from
    pub fn to_json(&self, source_timestamp: u64) -> Result<String, PersistError> {
        let persisted = PersistedRuleset {
            fingerprint: self.fingerprint,
            source_timestamp,
            filter: self.filter.clone(),
            incoming: self.incoming.clone(),
            outgoing: self.outgoing.clone(),
            context: self.context.clone(),
        };
        Ok(serde_json::to_string(&persisted)?)
    }
}

/// On-disk form of a [`CompiledRuleset`]
///
/// Regular expressions are stored as source and flags and compiled again on
/// load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRuleset {
    /// Fingerprint of the rules the tree was compiled from
    pub fingerprint: u64,
    /// Caller-defined timestamp of the source text
    pub source_timestamp: u64,
    /// Canonical filter tree
    pub filter: Option<Group>,
    /// Active `#rep` rules
    pub incoming: Vec<ReplacementRule>,
    /// Active `#outrep` rules
    pub outgoing: Vec<ReplacementRule>,
    /// Context the tree was optimized for
    pub context: Context,
}

impl PersistedRuleset {
    /// Parse a persisted document
    pub fn from_json(json: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The ruleset this document describes
    pub fn into_ruleset(self) -> CompiledRuleset {
        CompiledRuleset {
            fingerprint: self.fingerprint,
            filter: self.filter,
            incoming: self.incoming,
            outgoing: self.outgoing,
            context: self.context,
        }
    }
}

/// Parse and compile `source` for `context`
pub fn compile(source: &str, context: &Context) -> Result<CompiledRuleset, SyntaxError> {
    let raw = parse(source)?;
    Ok(compile_parsed(&raw, context))
}

/// Compile already parsed rules for `context`
pub fn compile_parsed(raw: &ParsedRules, context: &Context) -> CompiledRuleset {
    let ruleset = CompiledRuleset {
        fingerprint: fingerprint(raw),
        filter: raw
            .filter
            .as_ref()
            .and_then(|root| optimize(root, Some(context))),
        incoming: filter_rules(&raw.incoming, Some(context)),
        outgoing: filter_rules(&raw.outgoing, Some(context)),
        context: context.clone(),
    };
    log_debug!(
        "compiled ruleset {:016x} for {:?}: {} incoming, {} outgoing rules",
        ruleset.fingerprint,
        context,
        ruleset.incoming.len(),
        ruleset.outgoing.len()
    );
    ruleset
}

/// Context-free fingerprint of parsed rules
pub fn fingerprint(raw: &ParsedRules) -> u64 {
    let canonical = ParsedRules {
        filter: raw.filter.as_ref().and_then(|root| optimize(root, None)),
        incoming: raw.incoming.clone(),
        outgoing: raw.outgoing.clone(),
    };
    fnv1a(Printer::new().print_parsed(&canonical).as_bytes())
}

/// The user's rule-set source and its parsed form
///
/// Replacing the source is transactional: text that fails to parse leaves the
/// previous rules in place.
#[derive(Debug, Clone, Default)]
pub struct Spellbook {
    source: String,
    timestamp: u64,
    parsed: ParsedRules,
    fingerprint: u64,
}

impl Spellbook {
    /// Parse `source`, stamped with a caller-defined `timestamp`
    pub fn new(source: impl Into<String>, timestamp: u64) -> Result<Self, SyntaxError> {
        let source = source.into();
        let parsed = parse(&source)?;
        let fingerprint = fingerprint(&parsed);
        Ok(Self {
            source,
            timestamp,
            parsed,
            fingerprint,
        })
    }

    /// Current source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Timestamp of the current source
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Fingerprint of the current rules
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Current raw rules
    pub fn parsed(&self) -> &ParsedRules {
        &self.parsed
    }

    /// Swap in new source text
    ///
    /// Returns whether the rules changed meaning (a different fingerprint).
    /// On a syntax error nothing is modified.
    pub fn replace_source(
        &mut self,
        source: impl Into<String>,
        timestamp: u64,
    ) -> Result<bool, SyntaxError> {
        let next = Self::new(source, timestamp)?;
        let changed = next.fingerprint != self.fingerprint;
        *self = next;
        Ok(changed)
    }

    /// Compile the current rules for `context`
    pub fn compile_for(&self, context: &Context) -> CompiledRuleset {
        compile_parsed(&self.parsed, context)
    }

    /// Persist a ruleset compiled from this spellbook
    pub fn persist(&self, ruleset: &CompiledRuleset) -> Result<String, PersistError> {
        if ruleset.fingerprint != self.fingerprint {
            return Err(PersistError::FingerprintMismatch {
                stored: ruleset.fingerprint,
                computed: self.fingerprint,
            });
        }
        ruleset.to_json(self.timestamp)
    }

    /// Load a persisted ruleset for `context`
    ///
    /// Fails when the document belongs to other rules. A document compiled
    /// for another context is discarded and the rules are compiled again.
    pub fn restore(&self, json: &str, context: &Context) -> Result<CompiledRuleset, PersistError> {
        let persisted = PersistedRuleset::from_json(json)?;
        if persisted.fingerprint != self.fingerprint {
            log_warn!(
                "persisted ruleset {:016x} is stale, current rules are {:016x}",
                persisted.fingerprint,
                self.fingerprint
            );
            return Err(PersistError::FingerprintMismatch {
                stored: persisted.fingerprint,
                computed: self.fingerprint,
            });
        }

        let ruleset = persisted.into_ruleset();
        if ruleset.is_current(context, self.fingerprint) {
            Ok(ruleset)
        } else {
            log_debug!("context moved to {:?}, recompiling", context);
            Ok(self.compile_for(context))
        }
    }
}
