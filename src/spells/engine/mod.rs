//! Evaluation engine
//!
//! Walks a compiled tree for one post and produces a [`Verdict`]. The walk is
//! a single `async fn` driving an explicit stack of frames, one per open
//! group. When a spell needs a provider lookup the future simply awaits it;
//! the frames stay on the stack, nothing already decided is evaluated again,
//! and dropping the future abandons the evaluation.
//!
//! # Combination
//!
//! Children of a group are folded strictly left to right:
//!
//! ```text
//! acc = v(c0)
//! for (op, ci): AND with acc false skips ci, OR with acc true skips ci,
//!               otherwise acc = v(ci)
//! ```
//!
//! Negation flips a spell or a finished group before it reaches its parent.
//! A spell left undecided by a failed lookup is false either way, so an
//! unreachable provider never hides a post on its own.
//!
//! # Trace
//!
//! Every value carries the spells that decided it. A spell decides itself.
//! AND keeps both traces when both sides are true and the false side
//! otherwise; OR keeps the true side, or both traces when both are false.
//! Skipped children contribute nothing.

mod leaf;

use super::ast::{Child, Combinator, Group, Leaf, Node, TriggeredSpell};
use super::cache::DecisionCache;
use super::facts::PostFacts;
use super::printer::Printer;
use super::providers::{NoProviders, Providers};
use super::ruleset::CompiledRuleset;
use super::scheduler::Scheduler;
use super::wipe::WipeThresholds;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default Hamming distance under which perceptual hashes match
pub const IHASH_MAX_DISTANCE: u32 = 6;

/// Engine settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// `#ihash` matches when at most this many bits differ
    pub ihash_max_distance: u32,
    /// Limits of the `#wipe` heuristics
    pub wipe: WipeThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ihash_max_distance: IHASH_MAX_DISTANCE,
            wipe: WipeThresholds::default(),
        }
    }
}

/// Outcome of evaluating one post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the post should be hidden
    pub matched: bool,
    /// Spells that decided the outcome, in evaluation order
    pub triggered: Vec<TriggeredSpell>,
}

impl Verdict {
    /// User-facing explanation of a match, e.g. `#sage & #words(spam)`
    pub fn reason(&self) -> Option<String> {
        if !self.matched || self.triggered.is_empty() {
            return None;
        }
        let printer = Printer::new();
        let parts: Vec<String> = self
            .triggered
            .iter()
            .map(|spell| printer.print_leaf(spell))
            .collect();
        Some(parts.join(" & "))
    }
}

/// A value with the spells that decided it
#[derive(Debug)]
struct Outcome {
    value: bool,
    trace: Vec<Leaf>,
}

impl Outcome {
    fn combine(self, op: Combinator, next: Outcome) -> Outcome {
        match (op, self.value, next.value) {
            (Combinator::And, true, true) | (Combinator::Or, false, false) => {
                let mut trace = self.trace;
                trace.extend(next.trace);
                Outcome {
                    value: self.value,
                    trace,
                }
            }
            (Combinator::And, false, _) | (Combinator::Or, true, _) => self,
            (Combinator::And, true, false) | (Combinator::Or, false, true) => next,
        }
    }
}

/// One open group
struct Frame<'t> {
    children: &'t [Child],
    index: usize,
    negated: bool,
    acc: Option<Outcome>,
    /// Operator joining the last visited child to the next one
    link: Combinator,
    /// Operator the next outcome is combined with
    pending: Combinator,
}

impl<'t> Frame<'t> {
    fn new(group: &'t Group) -> Self {
        Self {
            children: &group.children,
            index: 0,
            negated: group.negated,
            acc: None,
            link: Combinator::Or,
            pending: Combinator::Or,
        }
    }

    /// Next child that needs a value, skipping short-circuited ones
    fn next_child(&mut self) -> Option<&'t Child> {
        let children = self.children;
        while let Some(child) = children.get(self.index) {
            self.index += 1;
            let skip = match &self.acc {
                None => false,
                Some(acc) => {
                    self.pending = self.link;
                    match self.link {
                        Combinator::And => !acc.value,
                        Combinator::Or => acc.value,
                    }
                }
            };
            self.link = child.op;
            if !skip {
                return Some(child);
            }
        }
        None
    }

    fn accept(&mut self, outcome: Outcome) {
        self.acc = Some(match self.acc.take() {
            None => outcome,
            Some(acc) => acc.combine(self.pending, outcome),
        });
    }

    fn finish(self) -> Outcome {
        let mut outcome = self.acc.unwrap_or(Outcome {
            value: false,
            trace: Vec::new(),
        });
        outcome.value ^= self.negated;
        outcome
    }
}

/// Evaluates compiled rulesets against posts
///
/// Cheap to share: clone it or wrap it in an `Arc` and evaluate many posts
/// concurrently. All provider lookups go through one [`Scheduler`].
#[derive(Clone)]
pub struct Engine {
    providers: Arc<dyn Providers>,
    scheduler: Arc<Scheduler>,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Arc::new(NoProviders), Arc::new(Scheduler::new()))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("scheduler", &self.scheduler)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine with the default settings
    pub fn new(providers: Arc<dyn Providers>, scheduler: Arc<Scheduler>) -> Self {
        Self::with_config(providers, scheduler, EngineConfig::default())
    }

    /// Create an engine with custom settings
    pub fn with_config(
        providers: Arc<dyn Providers>,
        scheduler: Arc<Scheduler>,
        config: EngineConfig,
    ) -> Self {
        Self {
            providers,
            scheduler,
            config,
        }
    }

    /// The shared scheduler
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Current settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate one post
    ///
    /// Never fails: a spell left undecided by failed lookups is false,
    /// negated or not.
    pub async fn evaluate(&self, ruleset: &CompiledRuleset, facts: &PostFacts) -> Verdict {
        self.walk(ruleset, facts).await.0
    }

    /// Evaluate many posts concurrently, preserving input order
    pub async fn evaluate_batch(
        &self,
        ruleset: &CompiledRuleset,
        posts: &[PostFacts],
    ) -> Vec<Verdict> {
        join_all(posts.iter().map(|facts| self.evaluate(ruleset, facts))).await
    }

    /// Evaluate one post, reusing a cached verdict when possible
    ///
    /// Verdicts reached while a lookup failed are not cached.
    pub async fn evaluate_cached(
        &self,
        ruleset: &CompiledRuleset,
        facts: &PostFacts,
        cache: &mut DecisionCache,
    ) -> Verdict {
        cache.bind(ruleset);
        if let Some(verdict) = cache.get(facts.number) {
            return verdict.clone();
        }

        let (verdict, degraded) = self.walk(ruleset, facts).await;
        if !degraded {
            cache.insert(facts.number, verdict.clone());
        }
        verdict
    }

    /// Returns the verdict and whether any lookup failed
    async fn walk(&self, ruleset: &CompiledRuleset, facts: &PostFacts) -> (Verdict, bool) {
        let Some(root) = &ruleset.filter else {
            return (Verdict::default(), false);
        };

        let mut degraded = false;
        let mut stack = vec![Frame::new(root)];
        let mut finished: Option<Outcome> = None;

        loop {
            let Some(frame) = stack.last_mut() else {
                return (Verdict::default(), degraded);
            };
            if let Some(outcome) = finished.take() {
                frame.accept(outcome);
            }

            match frame.next_child() {
                None => {
                    let Some(frame) = stack.pop() else {
                        return (Verdict::default(), degraded);
                    };
                    let outcome = frame.finish();
                    if stack.is_empty() {
                        log_debug!("post {} matched: {}", facts.number, outcome.value);
                        let verdict = Verdict {
                            matched: outcome.value,
                            triggered: outcome.trace,
                        };
                        return (verdict, degraded);
                    }
                    finished = Some(outcome);
                }
                Some(child) => match &child.node {
                    Node::Leaf(spell) => {
                        let result = if spell.kind.is_async() {
                            leaf::matches_async(
                                spell,
                                facts,
                                self.providers.as_ref(),
                                &self.scheduler,
                                &self.config,
                            )
                            .await
                        } else {
                            leaf::LeafValue::known(leaf::matches_sync(spell, facts, &self.config))
                        };
                        degraded |= result.lookup_failed;
                        finished = Some(Outcome {
                            value: result.value(spell.negated),
                            trace: vec![spell.clone()],
                        });
                    }
                    Node::Group(group) => stack.push(Frame::new(group)),
                },
            }
        }
    }
}
