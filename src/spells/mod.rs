//! The spell language
//!
//! # Module Organization
//!
//! ## Language
//! - [`kind`] - The closed set of spell kinds and their argument shapes
//! - [`arg`] - Typed spell arguments
//! - [`ast`] - Raw and canonical rule trees, scopes and replacement rules
//! - [`parser`] - Source text to raw tree
//! - [`printer`] - Tree back to normalized source text
//!
//! ## Compilation
//! - [`optimizer`] - Scope pruning and canonicalization
//! - [`ruleset`] - Compile pipeline, fingerprints and the persisted form
//! - [`autohide`] - Quick-hide rules appended to the source
//!
//! ## Evaluation
//! - [`facts`] - What the caller knows about a post
//! - [`engine`] - Per-post evaluation with traces
//! - [`providers`] - Asynchronous image and video lookups
//! - [`scheduler`] - Bounded, backoff-aware lookup dispatch
//! - [`cache`] - Per-post verdict memo
//! - [`wipe`] - Spam heuristics behind `#wipe`
//!
//! ## Support
//! - [`error`] - Syntax and persistence errors
//! - [`regex_cache`] - Thread-local compiled regex cache
//! - [`source_location`] - Line/column tracking

// ============================================================================
// Module Declarations
// ============================================================================

pub mod arg;
pub mod ast;
pub mod autohide;
pub mod cache;
pub mod engine;
pub mod error;
pub mod facts;
pub mod kind;
pub mod optimizer;
pub mod parser;
pub mod printer;
pub mod providers;
pub mod regex_cache;
pub mod ruleset;
pub mod scheduler;
pub mod source_location;
pub mod wipe;

// ============================================================================
// Re-exports
// ============================================================================

pub use arg::{
    Comparison, Dimensions, ImageCondition, NumRange, RegexArg, SizeRange, SpellArg, WipeChecks,
};
pub use ast::{
    apply_rules, Child, Combinator, Context, Direction, Group, Leaf, Node, ParsedRules,
    normalize_replacement, ReplacementRule, Scope, ThreadScope, TriggeredSpell,
};
pub use autohide::{HideOutcome, PatternRule};
pub use cache::DecisionCache;
pub use engine::{Engine, EngineConfig, Verdict};
pub use error::{PersistError, SyntaxError, SyntaxErrorKind};
pub use facts::{Attachment, PostFacts, VideoMetadata, VideoRef};
pub use kind::SpellKind;
pub use optimizer::{filter_rules, optimize};
pub use parser::{parse, Parser, ParserConfig};
pub use printer::{Printer, PrinterConfig};
pub use providers::{NoProviders, Pause, ProviderError, Providers};
pub use ruleset::{compile, CompiledRuleset, PersistedRuleset, Spellbook};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerStats};
pub use source_location::SourcePosition;
pub use wipe::WipeThresholds;
