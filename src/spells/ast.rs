//! Spell expression tree
//!
//! A rule set is a tree of [`Group`]s whose children are either spells
//! ([`Leaf`]) or nested groups. Each child carries the [`Combinator`] joining
//! it to its next sibling; there is no operator precedence, so
//! `#a & #b | #c` is evaluated strictly left to right as `(#a & #b) | #c`.
//!
//! The same types describe raw parser output and canonical optimizer output.
//! All types derive a total order, used by the optimizer to sort chains.

use super::arg::{RegexArg, SpellArg};
use super::kind::SpellKind;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

// ============================================================================
// Scopes
// ============================================================================

/// Thread part of a [`Scope`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadScope {
    /// `[board]`: anywhere on the board
    Any,
    /// `[board,-]`: only on board pages, outside any thread
    BoardOnly,
    /// `[board,123]`: only inside thread 123
    Thread(u64),
}

/// Board/thread restriction on a spell or replacement rule
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Board identifier
    pub board: String,
    /// Thread restriction
    pub thread: ThreadScope,
}

impl Scope {
    /// Scope covering a whole board
    pub fn board(board: impl Into<String>) -> Self {
        Self {
            board: board.into(),
            thread: ThreadScope::Any,
        }
    }

    /// Scope covering one thread
    pub fn thread(board: impl Into<String>, thread: u64) -> Self {
        Self {
            board: board.into(),
            thread: ThreadScope::Thread(thread),
        }
    }

    /// Scope covering board pages only
    pub fn board_only(board: impl Into<String>) -> Self {
        Self {
            board: board.into(),
            thread: ThreadScope::BoardOnly,
        }
    }

    /// Whether the scope is active under `context`
    pub fn matches(&self, context: &Context) -> bool {
        if context.board.as_deref() != Some(self.board.as_str()) {
            return false;
        }
        match self.thread {
            ThreadScope::Any => true,
            ThreadScope::BoardOnly => context.thread.is_none(),
            ThreadScope::Thread(n) => context.thread == Some(n),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.thread {
            ThreadScope::Any => write!(f, "[{}]", self.board),
            ThreadScope::BoardOnly => write!(f, "[{},-]", self.board),
            ThreadScope::Thread(n) => write!(f, "[{},{}]", self.board, n),
        }
    }
}

/// Where rules are being compiled for
///
/// Passed explicitly to the optimizer; no process-wide state is involved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    /// Current board, if any
    pub board: Option<String>,
    /// Current thread, if any
    pub thread: Option<u64>,
}

impl Context {
    /// Context outside any board
    pub fn global() -> Self {
        Self::default()
    }

    /// Context for a board page
    pub fn board(board: impl Into<String>) -> Self {
        Self {
            board: Some(board.into()),
            thread: None,
        }
    }

    /// Context for a thread page
    pub fn thread(board: impl Into<String>, thread: u64) -> Self {
        Self {
            board: Some(board.into()),
            thread: Some(thread),
        }
    }

    /// Whether an optional scope is active; unscoped items always are
    #[inline]
    pub fn admits(&self, scope: Option<&Scope>) -> bool {
        scope.map_or(true, |s| s.matches(self))
    }
}

// ============================================================================
// Expression tree
// ============================================================================

/// Boolean operator joining a child to its next sibling
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// `&`
    And,
    /// `|`
    Or,
}

impl Combinator {
    /// The operator character
    pub fn symbol(self) -> char {
        match self {
            Combinator::And => '&',
            Combinator::Or => '|',
        }
    }
}

/// A single spell
///
/// Field order defines the canonical sort: kind, then argument, then scope,
/// then negation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Leaf {
    /// Which predicate
    pub kind: SpellKind,
    /// Parsed argument, if any
    pub arg: Option<SpellArg>,
    /// Board/thread restriction
    pub scope: Option<Scope>,
    /// Whether the spell was written with `!`
    pub negated: bool,
}

impl Leaf {
    /// Create an unscoped, un-negated spell without argument
    pub fn new(kind: SpellKind) -> Self {
        Self {
            kind,
            arg: None,
            scope: None,
            negated: false,
        }
    }

    /// Set the argument
    pub fn with_arg(mut self, arg: SpellArg) -> Self {
        self.arg = Some(arg);
        self
    }

    /// Set the scope
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Flip negation
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Whether this leaf is `#all` (true) or `!#all` (false) without scope
    pub fn as_constant(&self) -> Option<bool> {
        (self.kind == SpellKind::All && self.scope.is_none()).then_some(!self.negated)
    }
}

/// A spell that decided a verdict
pub type TriggeredSpell = Leaf;

/// Either a spell or a nested group
///
/// Leaves sort before groups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    /// A spell
    Leaf(Leaf),
    /// A parenthesized expression
    Group(Group),
}

impl Node {
    /// Whether the node is negated
    pub fn negated(&self) -> bool {
        match self {
            Node::Leaf(leaf) => leaf.negated,
            Node::Group(group) => group.negated,
        }
    }

    /// Flip negation
    pub fn negate(self) -> Self {
        match self {
            Node::Leaf(leaf) => Node::Leaf(leaf.negate()),
            Node::Group(mut group) => {
                group.negated = !group.negated;
                Node::Group(group)
            }
        }
    }
}

impl From<Leaf> for Node {
    fn from(leaf: Leaf) -> Self {
        Node::Leaf(leaf)
    }
}

impl From<Group> for Node {
    fn from(group: Group) -> Self {
        Node::Group(group)
    }
}

/// A group child and the operator joining it to the next sibling
///
/// The operator of the last child is meaningless and kept as `Or`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Child {
    /// The child expression
    pub node: Node,
    /// Operator towards the next sibling
    pub op: Combinator,
}

/// A parenthesized expression, or the root of a rule set
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Group {
    /// Whether the group was written with `!`
    pub negated: bool,
    /// Ordered children; non-empty in any finished tree
    pub children: Vec<Child>,
}

impl Group {
    /// Create an empty group
    pub fn new() -> Self {
        Self::default()
    }

    /// A group holding a single node
    pub fn single(node: impl Into<Node>) -> Self {
        let mut group = Self::new();
        group.push(Combinator::Or, node);
        group
    }

    /// A group joining every node with the same operator
    pub fn chain(op: Combinator, nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut group = Self::new();
        for node in nodes {
            group.push(op, node);
        }
        group
    }

    /// Append a node, joined to the current last child by `op`
    ///
    /// `op` is ignored when the group is empty.
    pub fn push(&mut self, op: Combinator, node: impl Into<Node>) {
        if let Some(last) = self.children.last_mut() {
            last.op = op;
        }
        self.children.push(Child {
            node: node.into(),
            op: Combinator::Or,
        });
    }

    /// Append a spell, joined to the current last child by `op`
    pub fn push_leaf(&mut self, op: Combinator, leaf: Leaf) {
        self.push(op, leaf);
    }

    /// Number of direct children
    #[inline]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether the group has no children
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Every spell in the tree, depth first
    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut out = Vec::new();
        let mut stack = vec![self.children.iter()];
        while !stack.is_empty() {
            let next = stack.last_mut().and_then(|iter| iter.next());
            match next.map(|child| &child.node) {
                Some(Node::Leaf(leaf)) => out.push(leaf),
                Some(Node::Group(inner)) => stack.push(inner.children.iter()),
                None => {
                    stack.pop();
                }
            }
        }
        out
    }
}

// ============================================================================
// Replacement rules
// ============================================================================

/// Which content a replacement rule rewrites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// `#rep`: rendered post content
    Incoming,
    /// `#outrep`: text about to be submitted
    Outgoing,
}

impl Direction {
    /// The declaration keyword without `#`
    pub fn keyword(self) -> &'static str {
        match self {
            Direction::Incoming => "rep",
            Direction::Outgoing => "outrep",
        }
    }
}

/// A `#rep` / `#outrep` declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplacementRule {
    /// Board/thread restriction
    pub scope: Option<Scope>,
    /// Pattern to search for
    pub pattern: RegexArg,
    /// Substitution text; `$1` and `${name}` refer to capture groups
    pub replacement: String,
}

impl ReplacementRule {
    /// Create a rule, rewriting `$` references in `replacement`
    ///
    /// See [`normalize_replacement`].
    pub fn new(scope: Option<Scope>, pattern: RegexArg, replacement: &str) -> Self {
        let replacement = normalize_replacement(&pattern, replacement);
        Self {
            scope,
            pattern,
            replacement,
        }
    }

    /// Replace every match of the pattern in `text`
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern
            .regex()
            .replace_all(text, self.replacement.as_str())
    }
}

/// Rewrite the `$` references of a substitution into `regex` syntax
///
/// `$N` and `$NN` name a capture group only when the pattern has it, the
/// longer number winning, and become `${N}`. `$&` is the whole match and
/// `$<name>` a named group. `${..}` naming an existing group is kept. Every
/// other `$` is literal. The result maps to itself.
pub fn normalize_replacement(pattern: &RegexArg, text: &str) -> String {
    let regex = pattern.regex();
    let groups = regex.captures_len() - 1;
    let has_name = |name: &str| regex.capture_names().flatten().any(|n| n == name);

    let mut output = String::with_capacity(text.len() + 4);
    let mut rest = text;
    while let Some(at) = memchr::memchr(b'$', rest.as_bytes()) {
        output.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        let consumed = match group_reference(tail, groups, &has_name) {
            Some((group, consumed)) => {
                output.push_str("${");
                output.push_str(group);
                output.push('}');
                consumed
            }
            None => {
                output.push_str("$$");
                usize::from(tail.starts_with('$'))
            }
        };
        rest = &tail[consumed..];
    }
    output.push_str(rest);
    output
}

/// Group named right after a `$`, with the number of bytes it spans
fn group_reference<'t>(
    tail: &'t str,
    groups: usize,
    has_name: &dyn Fn(&str) -> bool,
) -> Option<(&'t str, usize)> {
    let bytes = tail.as_bytes();
    match bytes.first()? {
        b'&' => Some(("0", 1)),
        b'{' | b'<' => {
            let close = if bytes[0] == b'{' { b'}' } else { b'>' };
            let end = memchr::memchr(close, bytes)?;
            let name = &tail[1..end];
            let valid = match name.parse::<usize>() {
                Ok(index) => bytes[0] == b'{' && index <= groups,
                Err(_) => !name.is_empty() && has_name(name),
            };
            valid.then_some((name, end + 1))
        }
        b'0'..=b'9' => {
            let digits = bytes.iter().take(2).take_while(|b| b.is_ascii_digit()).count();
            (1..=digits).rev().find_map(|len| {
                let index: usize = tail[..len].parse().ok()?;
                (1..=groups).contains(&index).then_some((&tail[..len], len))
            })
        }
        _ => None,
    }
}

/// Apply rules in order, each to the previous rule's output
pub fn apply_rules(rules: &[ReplacementRule], text: &str) -> String {
    let mut current = text.to_string();
    for rule in rules {
        let replaced = match rule.apply(&current) {
            Cow::Owned(next) => Some(next),
            Cow::Borrowed(_) => None,
        };
        if let Some(next) = replaced {
            current = next;
        }
    }
    current
}

/// Parser output: the raw tree plus both replacement lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRules {
    /// Root group; `None` when the source declares no spells
    pub filter: Option<Group>,
    /// `#rep` rules in declaration order
    pub incoming: Vec<ReplacementRule>,
    /// `#outrep` rules in declaration order
    pub outgoing: Vec<ReplacementRule>,
}
