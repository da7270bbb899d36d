//! Postspell - rule language for hiding forum posts
//!
//! Users write short rule sets ("spells") that decide which posts to hide
//! and which text substitutions to apply. This crate provides:
//! - A parser with line/column diagnostics
//! - Scope pruning and canonicalization for the board or thread being viewed
//! - A stable fingerprint and a JSON persisted form of compiled rules
//! - An async evaluation engine that explains every verdict
//! - A bounded, backoff-aware scheduler for image and video lookups
//! - A canonical printer, the parser's inverse
//!
//! ## Quick Start
//!
//! ```rust
//! use postspell::prelude::*;
//!
//! let ruleset = compile("#sage & #words(spam)", &Context::board("b")).unwrap();
//! let post = PostFacts::new(1).sage(true).text("buy SPAM now");
//!
//! let verdict = futures::executor::block_on(Engine::default().evaluate(&ruleset, &post));
//! assert!(verdict.matched);
//! assert_eq!(verdict.reason().as_deref(), Some("#words(spam) & #sage"));
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

// Prelude module for convenient imports
pub mod prelude;

pub mod spells;

/// Re-export commonly used types for convenience
pub use spells::{
    compile, parse, CompiledRuleset, Context, DecisionCache, Engine, Group, Leaf, PostFacts,
    Printer, Providers, Scheduler, Spellbook, SyntaxError, Verdict,
};
