//! Quick-hide rules
//!
//! Rules a user adds from a post's menu ("hide this name", "hide posts
//! matching this pattern") are written as ordinary spells and appended to the
//! [`Spellbook`] source, so they share parsing, scoping, persistence and the
//! verdict reason with hand-written rules.

use super::arg::{RegexArg, SpellArg};
use super::ast::{Combinator, Group, Leaf, Node, Scope};
use super::error::SyntaxError;
use super::kind::SpellKind;
use super::printer::Printer;
use super::ruleset::Spellbook;

/// Flags of quick-hide patterns: case-insensitive, `.` matches newlines
pub const PATTERN_FLAGS: &str = "is";

/// Result of adding a quick-hide rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideOutcome {
    /// The rule was appended to the source
    Added,
    /// An identical rule is already a top-level statement
    Exists,
    /// Nothing to hide by, e.g. an empty name
    Rejected,
}

/// A pattern rule with board, thread, original-post and sage conditions
///
/// Renders as `#op & #sage & (#subj(/re/is) | #exp(/re/is))`, each part
/// present only when enabled and every spell carrying the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRule {
    /// Where the rule applies
    pub scope: Option<Scope>,
    /// Only original posts
    pub original_post: bool,
    /// Only posts with the sage flag
    pub sage: bool,
    /// Search the subject line
    pub subject: bool,
    /// Search the post text
    pub comment: bool,
    /// The pattern to search for
    pub pattern: RegexArg,
}

impl PatternRule {
    /// A rule searching the post text for `source`
    pub fn new(source: &str) -> Result<Self, String> {
        Ok(Self {
            scope: None,
            original_post: false,
            sage: false,
            subject: false,
            comment: true,
            pattern: RegexArg::new(&escape_slashes(source), PATTERN_FLAGS)?,
        })
    }

    /// Restrict the rule to `scope`
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Also search the subject line
    pub fn with_subject(mut self, subject: bool) -> Self {
        self.subject = subject;
        self
    }

    /// Search the post text
    pub fn with_comment(mut self, comment: bool) -> Self {
        self.comment = comment;
        self
    }

    /// Only match original posts
    pub fn original_post_only(mut self) -> Self {
        self.original_post = true;
        self
    }

    /// Only match posts with the sage flag
    pub fn sage_only(mut self) -> Self {
        self.sage = true;
        self
    }

    /// The rule as a spell tree; `None` when no target is searched
    pub fn to_node(&self) -> Option<Node> {
        let mut targets = Vec::new();
        if self.subject {
            targets.push(Node::Leaf(self.leaf(SpellKind::Subj)));
        }
        if self.comment {
            targets.push(Node::Leaf(self.leaf(SpellKind::Exp)));
        }
        let target = match targets.len() {
            0 => return None,
            1 => targets.remove(0),
            _ => Node::Group(Group::chain(Combinator::Or, targets)),
        };

        let mut conditions = Vec::new();
        if self.original_post {
            conditions.push(Node::Leaf(self.bare(SpellKind::Op)));
        }
        if self.sage {
            conditions.push(Node::Leaf(self.bare(SpellKind::Sage)));
        }
        if conditions.is_empty() {
            return Some(target);
        }
        conditions.push(target);
        Some(Node::Group(Group::chain(Combinator::And, conditions)))
    }

    fn bare(&self, kind: SpellKind) -> Leaf {
        let leaf = Leaf::new(kind);
        match &self.scope {
            Some(scope) => leaf.with_scope(scope.clone()),
            None => leaf,
        }
    }

    fn leaf(&self, kind: SpellKind) -> Leaf {
        self.bare(kind).with_arg(SpellArg::Regex(self.pattern.clone()))
    }
}

/// Escape `/` so the pattern prints as a single regex literal
fn escape_slashes(source: &str) -> String {
    let mut output = String::with_capacity(source.len());
    let mut escaped = false;
    let mut in_class = false;
    for c in source.chars() {
        match c {
            '/' if !escaped && !in_class => output.push_str("\\/"),
            _ => output.push(c),
        }
        match c {
            '[' if !escaped => in_class = true,
            ']' if !escaped => in_class = false,
            _ => {}
        }
        escaped = c == '\\' && !escaped;
    }
    output
}

impl Spellbook {
    /// Append `node` as a new top-level statement
    ///
    /// Transactional like [`Spellbook::replace_source`].
    pub fn append_rule(
        &mut self,
        node: &Node,
        timestamp: u64,
    ) -> Result<HideOutcome, SyntaxError> {
        let printer = Printer::new();
        let printed = printer.print_node(node);
        let exists = self.parsed().filter.as_ref().is_some_and(|root| {
            root.children
                .iter()
                .any(|child| printer.print_node(&child.node) == printed)
        });
        if exists {
            return Ok(HideOutcome::Exists);
        }

        let statement = match node {
            Node::Group(group) => printer.print(group),
            Node::Leaf(leaf) => printer.print_leaf(leaf),
        };
        let current = self.source().trim_end();
        let source = if current.is_empty() {
            statement
        } else {
            format!("{}\n{}", current, statement)
        };
        self.replace_source(source, timestamp)?;
        log_debug!("appended quick-hide rule {}", printed);
        Ok(HideOutcome::Added)
    }

    /// Hide every post whose author name contains `name`
    pub fn hide_name(
        &mut self,
        name: &str,
        scope: Option<Scope>,
        timestamp: u64,
    ) -> Result<HideOutcome, SyntaxError> {
        let name = name.trim();
        if name.is_empty() || name.contains('\n') {
            return Ok(HideOutcome::Rejected);
        }
        let leaf = Leaf::new(SpellKind::Name).with_arg(SpellArg::Text(name.to_string()));
        let leaf = match scope {
            Some(scope) => leaf.with_scope(scope),
            None => leaf,
        };
        self.append_rule(&Node::Leaf(leaf), timestamp)
    }

    /// Append a pattern rule
    pub fn hide_pattern(
        &mut self,
        rule: &PatternRule,
        timestamp: u64,
    ) -> Result<HideOutcome, SyntaxError> {
        match rule.to_node() {
            Some(node) => self.append_rule(&node, timestamp),
            None => Ok(HideOutcome::Rejected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spells::ast::Context;
    use crate::spells::engine::Engine;
    use crate::spells::facts::PostFacts;

    fn print(rule: &PatternRule) -> String {
        Printer::new().print_node(&rule.to_node().unwrap())
    }

    #[test]
    fn test_pattern_rule_shapes() {
        let rule = PatternRule::new("buy now").unwrap();
        assert_eq!(print(&rule), "#exp(/buy now/is)");

        let rule = rule.with_subject(true).sage_only().with_scope(Scope::board("b"));
        assert_eq!(
            print(&rule),
            "(#sage[b] & (#subj[b](/buy now/is) | #exp[b](/buy now/is)))"
        );

        let rule = PatternRule::new("x").unwrap().original_post_only();
        assert_eq!(print(&rule), "(#op & #exp(/x/is))");

        assert!(PatternRule::new("x").unwrap().with_comment(false).to_node().is_none());
    }

    #[test]
    fn test_pattern_slashes_are_escaped() {
        let rule = PatternRule::new(r"a/b [/] c\/d").unwrap();
        assert_eq!(rule.pattern.source(), r"a\/b [/] c\/d");
        assert!(rule.pattern.is_match("A/B / C/D"));

        let mut book = Spellbook::new("", 1).unwrap();
        assert_eq!(book.hide_pattern(&rule, 2).unwrap(), HideOutcome::Added);
        assert_eq!(book.hide_pattern(&rule, 3).unwrap(), HideOutcome::Exists);
    }

    #[test]
    fn test_hide_name_appends_once() {
        let mut book = Spellbook::new("#sage", 1).unwrap();
        assert_eq!(book.hide_name(" Bob (admin) ", None, 2).unwrap(), HideOutcome::Added);
        assert_eq!(book.source(), "#sage\n#name(Bob \\(admin\\))");
        assert_eq!(book.timestamp(), 2);

        assert_eq!(book.hide_name("Bob (admin)", None, 3).unwrap(), HideOutcome::Exists);
        assert_eq!(book.timestamp(), 2);
        assert_eq!(book.hide_name("  ", None, 4).unwrap(), HideOutcome::Rejected);
    }

    #[test]
    fn test_hide_pattern_is_evaluated() {
        let mut book = Spellbook::new("", 1).unwrap();
        let rule = PatternRule::new("spam+")
            .unwrap()
            .sage_only()
            .with_scope(Scope::board("b"));
        assert_eq!(book.hide_pattern(&rule, 2).unwrap(), HideOutcome::Added);
        assert_eq!(book.hide_pattern(&rule, 3).unwrap(), HideOutcome::Exists);

        let engine = Engine::default();
        let post = PostFacts::new(1).sage(true).text("SPAMMM");
        let here = book.compile_for(&Context::board("b"));
        let verdict = futures::executor::block_on(engine.evaluate(&here, &post));
        assert!(verdict.matched);
        assert_eq!(verdict.reason().as_deref(), Some("#exp[b](/spam+/is) & #sage[b]"));

        let elsewhere = book.compile_for(&Context::board("c"));
        assert!(!futures::executor::block_on(engine.evaluate(&elsewhere, &post)).matched);
    }
}
