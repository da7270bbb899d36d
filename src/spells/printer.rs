//! Canonical printer
//!
//! The parser's inverse: renders a tree (raw or optimized) and replacement
//! rules back to spell source. Printing never changes meaning; long root-level
//! disjunctions are wrapped one operand per line for readability only.
//!
//! # Example
//!
//! ```text
//! #words(free money) |
//!     #exp(/buy\s+now/i) |
//!     (#img(>500) & !#op)
//! #rep(/colour/,color)
//! ```

use super::arg::SpellArg;
use super::ast::{Combinator, Direction, Group, Leaf, Node, ParsedRules, ReplacementRule};
use super::ruleset::CompiledRuleset;
use std::fmt;

/// Default line width before a root disjunction is wrapped
pub const DEFAULT_WRAP_WIDTH: usize = 80;

/// Default indentation of wrapped continuation lines
pub const DEFAULT_INDENT: usize = 4;

/// Printer layout settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterConfig {
    /// Root `|` chains longer than this are printed one operand per line
    pub wrap_width: usize,
    /// Spaces before each continuation line
    pub indent: usize,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            wrap_width: DEFAULT_WRAP_WIDTH,
            indent: DEFAULT_INDENT,
        }
    }
}

/// Renders spell trees as source text
#[derive(Debug, Clone, Default)]
pub struct Printer {
    config: PrinterConfig,
}

impl Printer {
    /// Create a printer with the default layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a printer with a custom layout
    pub fn with_config(config: PrinterConfig) -> Self {
        Self { config }
    }

    /// Set the wrap width
    pub fn wrap_width(mut self, width: usize) -> Self {
        self.config.wrap_width = width;
        self
    }

    /// Set the continuation indent
    pub fn indent(mut self, indent: usize) -> Self {
        self.config.indent = indent;
        self
    }

    /// Print a root group
    ///
    /// A root `|` chain that does not fit in the wrap width is written one
    /// operand per line, each line but the last ending in ` |`.
    pub fn print(&self, root: &Group) -> String {
        if root.negated {
            return self.print_group(root);
        }

        let line = self.print_chain(root);
        let all_or = root.children.iter().all(|c| c.op == Combinator::Or);
        if !all_or || root.len() < 2 || line.chars().count() <= self.config.wrap_width {
            return line;
        }

        let indent = " ".repeat(self.config.indent);
        let mut output = String::new();
        for (i, child) in root.children.iter().enumerate() {
            if i > 0 {
                output.push_str(" |\n");
                output.push_str(&indent);
            }
            output.push_str(&self.print_node(&child.node));
        }
        output
    }

    /// Print any node; groups are parenthesized
    pub fn print_node(&self, node: &Node) -> String {
        match node {
            Node::Leaf(leaf) => self.print_leaf(leaf),
            Node::Group(group) => self.print_group(group),
        }
    }

    /// Print a single spell
    pub fn print_leaf(&self, leaf: &Leaf) -> String {
        let mut output = String::new();
        if leaf.negated {
            output.push('!');
        }
        output.push_str(&leaf.kind.to_string());
        if let Some(scope) = &leaf.scope {
            output.push_str(&scope.to_string());
        }
        if let Some(arg) = &leaf.arg {
            output.push('(');
            output.push_str(&print_arg(arg));
            output.push(')');
        }
        output
    }

    /// Print a replacement declaration
    pub fn print_replacement(&self, direction: Direction, rule: &ReplacementRule) -> String {
        let mut output = format!("#{}", direction.keyword());
        if let Some(scope) = &rule.scope {
            output.push_str(&scope.to_string());
        }
        output.push('(');
        output.push_str(&rule.pattern.to_string());
        output.push(',');
        output.push_str(&escape_text(&rule.replacement));
        output.push(')');
        output
    }

    /// Print raw parser output: the filter, then replacements one per line
    pub fn print_parsed(&self, rules: &ParsedRules) -> String {
        self.print_document(rules.filter.as_ref(), &rules.incoming, &rules.outgoing)
    }

    /// Print a compiled ruleset in canonical form
    pub fn print_ruleset(&self, ruleset: &CompiledRuleset) -> String {
        self.print_document(
            ruleset.filter.as_ref(),
            &ruleset.incoming,
            &ruleset.outgoing,
        )
    }

    fn print_document(
        &self,
        filter: Option<&Group>,
        incoming: &[ReplacementRule],
        outgoing: &[ReplacementRule],
    ) -> String {
        let mut lines = Vec::with_capacity(1 + incoming.len() + outgoing.len());
        if let Some(root) = filter {
            lines.push(self.print(root));
        }
        for rule in incoming {
            lines.push(self.print_replacement(Direction::Incoming, rule));
        }
        for rule in outgoing {
            lines.push(self.print_replacement(Direction::Outgoing, rule));
        }
        lines.join("\n")
    }

    fn print_group(&self, group: &Group) -> String {
        let mut output = String::new();
        if group.negated {
            output.push('!');
        }
        output.push('(');
        output.push_str(&self.print_chain(group));
        output.push(')');
        output
    }

    fn print_chain(&self, group: &Group) -> String {
        let mut output = String::new();
        let last = group.children.len().saturating_sub(1);
        for (i, child) in group.children.iter().enumerate() {
            output.push_str(&self.print_node(&child.node));
            if i < last {
                output.push(' ');
                output.push(child.op.symbol());
                output.push(' ');
            }
        }
        output
    }
}

/// Render an argument the way the parser reads it
pub fn print_arg(arg: &SpellArg) -> String {
    match arg {
        SpellArg::Text(text) => escape_text(text),
        SpellArg::Regex(regex) => regex.to_string(),
        SpellArg::Ranges(ranges) => ranges
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(","),
        SpellArg::Image(condition) => condition.to_string(),
        SpellArg::Wipe(checks) => checks.to_string(),
        SpellArg::Signature(hash) => format!("0x{:016x}", hash),
    }
}

/// Escape `\`, `(` and `)` in free text
pub fn escape_text(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '(' | ')') {
            output.push('\\');
        }
        output.push(c);
    }
    output
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::new().print_leaf(self))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::new().print_node(self))
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Printer::new().print(self))
    }
}
