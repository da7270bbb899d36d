//! Prelude module for convenient imports
//!
//! ```
//! use postspell::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Compiling
//! - [`compile()`] - Parse and compile a rule set for one context
//! - [`Spellbook`] - Source text with transactional replacement
//! - [`CompiledRuleset`] - Rules ready for evaluation
//! - [`Context`] - Board and thread being viewed
//!
//! ## Evaluating
//! - [`Engine`] - Evaluates posts
//! - [`PostFacts`] - What is known about a post
//! - [`Verdict`] - Match result with trace
//! - [`DecisionCache`] - Per-post verdict memo
//!
//! ## Lookups
//! - [`Providers`] - Image and video lookups
//! - [`Scheduler`] - Shared lookup pool
//!
//! ## Errors
//! - [`SyntaxError`] - Parse failure with position
//! - [`PersistError`] - Invalid persisted ruleset
//! - [`ProviderError`] - Failed lookup

// ============================================================================
// Compiling
// ============================================================================

pub use crate::spells::ruleset::{compile, CompiledRuleset, Spellbook};
pub use crate::spells::autohide::{HideOutcome, PatternRule};
pub use crate::spells::ast::{Context, Scope};
pub use crate::spells::printer::Printer;

// ============================================================================
// Evaluating
// ============================================================================

pub use crate::spells::cache::DecisionCache;
pub use crate::spells::engine::{Engine, Verdict};
pub use crate::spells::facts::{Attachment, PostFacts, VideoMetadata, VideoRef};

// ============================================================================
// Lookups
// ============================================================================

pub use crate::spells::providers::{NoProviders, Pause, Providers};
pub use crate::spells::scheduler::{Scheduler, SchedulerConfig};

// ============================================================================
// Error Handling
// ============================================================================

pub use crate::spells::error::{PersistError, SyntaxError};
pub use crate::spells::providers::ProviderError;
