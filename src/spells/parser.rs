//! Spell source parser
//!
//! Turns rule-set text into a raw [`Group`] tree plus the incoming and
//! outgoing replacement lists.
//!
//! # Syntax
//!
//! ```text
//! document    := statement (NEWLINE+ statement)*
//! statement   := replacement | expr
//! expr        := operand (("&" | "|") operand)*
//! operand     := "!"? (spell | "(" expr ")")
//! spell       := "#" name scope? args?
//! scope       := "[" board ("," (digits | "-"))? "]"
//! replacement := ("#rep" | "#outrep") scope? "(" regex ("," text)? ")"
//! ```
//!
//! Statements are separated by newlines and combined with `|`. A statement
//! continues on the next line when a line ends with an operator or the next
//! line starts with one. Inside parentheses newlines are plain whitespace.
//!
//! The parser is a hand-written recursive descent over byte offsets; errors
//! are converted to 1-based line/column only when reported.

use super::arg::{
    Comparison, Dimensions, ImageCondition, NumRange, RegexArg, SizeRange, SpellArg, WipeChecks,
};
use super::ast::{
    Combinator, Direction, Group, Leaf, Node, ParsedRules, ReplacementRule, Scope, ThreadScope,
};
use super::error::{SyntaxError, SyntaxErrorKind};
use super::kind::{ArgRequirement, ArgShape, SpellKind};

/// Default maximum source size in bytes
pub const DEFAULT_MAX_INPUT_SIZE: usize = 1024 * 1024;

/// Default maximum parenthesis nesting depth
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

/// Parser limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Maximum allowed source size in bytes
    pub max_input_size: usize,

    /// Maximum allowed parenthesis nesting depth
    pub max_nesting_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl ParserConfig {
    /// Set the maximum source size
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// Set the maximum nesting depth
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}

/// Parse rule-set text with the default limits
pub fn parse(source: &str) -> Result<ParsedRules, SyntaxError> {
    Parser::new(source).parse()
}

/// Recursive-descent parser over one rule-set source
pub struct Parser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    config: ParserConfig,
}

impl<'a> Parser<'a> {
    /// Create a parser with the default limits
    pub fn new(source: &'a str) -> Self {
        Self::with_config(source, ParserConfig::default())
    }

    /// Create a parser with custom limits
    pub fn with_config(source: &'a str, config: ParserConfig) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            config,
        }
    }

    /// Parse the whole document
    pub fn parse(mut self) -> Result<ParsedRules, SyntaxError> {
        if self.source.len() > self.config.max_input_size {
            return Err(self.error(
                SyntaxErrorKind::LimitExceeded,
                format!(
                    "source is {} bytes, the limit is {}",
                    self.source.len(),
                    self.config.max_input_size
                ),
                0,
            ));
        }

        let mut rules = ParsedRules::default();
        let mut root = Group::new();

        loop {
            self.skip_whitespace();
            if self.at_end() {
                break;
            }

            if let Some(direction) = self.peek_replacement() {
                let rule = self.parse_replacement(direction)?;
                self.expect_line_end_after_replacement()?;
                match direction {
                    Direction::Incoming => rules.incoming.push(rule),
                    Direction::Outgoing => rules.outgoing.push(rule),
                }
                continue;
            }

            let mut statement = self.parse_chain(0)?;
            if self.peek() == Some(b')') {
                return Err(self.error(
                    SyntaxErrorKind::UnbalancedParenthesis,
                    "unmatched ')'",
                    self.pos,
                ));
            }

            let node = if statement.len() == 1 {
                statement.children.remove(0).node
            } else {
                Node::Group(statement)
            };
            root.push(Combinator::Or, node);
        }

        log_debug!(
            "parsed {} statements, {} incoming and {} outgoing replacements",
            root.len(),
            rules.incoming.len(),
            rules.outgoing.len()
        );

        rules.filter = (!root.is_empty()).then_some(root);
        Ok(rules)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Parse `operand (op operand)*`, stopping before a statement end or `)`
    fn parse_chain(&mut self, depth: usize) -> Result<Group, SyntaxError> {
        let mut group = Group::new();
        let mut op = Combinator::Or;
        loop {
            let node = self.parse_operand(depth)?;
            group.push(op, node);
            match self.parse_operator(depth)? {
                Some(next) => op = next,
                None => return Ok(group),
            }
        }
    }

    fn parse_operand(&mut self, depth: usize) -> Result<Node, SyntaxError> {
        self.skip_for_depth(depth);

        let negated = self.peek() == Some(b'!');
        if negated {
            self.pos += 1;
            self.skip_for_depth(depth);
        }

        let start = self.pos;
        let node = match self.peek() {
            None => {
                return Err(self.error(
                    SyntaxErrorKind::UnexpectedEnd,
                    "expected a spell or '('",
                    start,
                ))
            }
            Some(b'(') => Node::Group(self.parse_group(depth)?),
            Some(b'#') => {
                if self.peek_replacement().is_some() {
                    let (kind, message) = if depth > 0 {
                        (
                            SyntaxErrorKind::ReplacementInGroup,
                            "replacements are not allowed inside parentheses",
                        )
                    } else {
                        (
                            SyntaxErrorKind::ReplacementInExpression,
                            "replacements cannot be combined with spells",
                        )
                    };
                    return Err(self.error(kind, message, start));
                }
                Node::Leaf(self.parse_spell()?)
            }
            Some(b')') if depth == 0 => {
                return Err(self.error(
                    SyntaxErrorKind::UnbalancedParenthesis,
                    "unmatched ')'",
                    start,
                ))
            }
            Some(_) => {
                return Err(self.error(
                    SyntaxErrorKind::UnexpectedToken,
                    format!("expected a spell or '(', found {}", self.describe(start)),
                    start,
                ))
            }
        };

        Ok(if negated { node.negate() } else { node })
    }

    fn parse_group(&mut self, depth: usize) -> Result<Group, SyntaxError> {
        let open = self.pos;
        if depth + 1 > self.config.max_nesting_depth {
            return Err(self.error(
                SyntaxErrorKind::LimitExceeded,
                format!(
                    "groups are nested deeper than {}",
                    self.config.max_nesting_depth
                ),
                open,
            ));
        }

        self.pos += 1;
        self.skip_whitespace();
        if self.peek() == Some(b')') {
            return Err(self.error(SyntaxErrorKind::UnexpectedToken, "empty group", open));
        }

        let group = self.parse_chain(depth + 1)?;
        if self.peek() != Some(b')') {
            return Err(self.error(
                SyntaxErrorKind::UnbalancedParenthesis,
                "'(' is never closed",
                open,
            ));
        }
        self.pos += 1;
        Ok(group)
    }

    /// Look for `&` / `|` after an operand
    ///
    /// Returns `None` at a statement end (depth 0), before `)` or at the end
    /// of input.
    fn parse_operator(&mut self, depth: usize) -> Result<Option<Combinator>, SyntaxError> {
        self.skip_for_depth(depth);

        let at = self.pos;
        match self.peek() {
            None | Some(b')') => Ok(None),
            Some(b'&') | Some(b'|') => Ok(Some(self.take_operator(at))),
            Some(b'\n') => {
                let next = self.skip_whitespace_from(at);
                match self.bytes.get(next) {
                    Some(b'&') | Some(b'|') => Ok(Some(self.take_operator(next))),
                    _ => Ok(None),
                }
            }
            Some(b'#') if self.peek_replacement().is_some() => Err(self.error(
                SyntaxErrorKind::ReplacementWhereOperatorExpected,
                "expected '&' or '|' before replacement; replacements need a line of their own",
                at,
            )),
            Some(b'#') | Some(b'(') | Some(b'!') => Err(self.error(
                SyntaxErrorKind::MissingOperator,
                "expected '&' or '|' between operands",
                at,
            )),
            Some(_) => Err(self.error(
                SyntaxErrorKind::UnexpectedToken,
                format!("expected '&' or '|', found {}", self.describe(at)),
                at,
            )),
        }
    }

    fn take_operator(&mut self, at: usize) -> Combinator {
        let op = if self.bytes[at] == b'&' {
            Combinator::And
        } else {
            Combinator::Or
        };
        self.pos = at + 1;
        self.skip_whitespace();
        op
    }

    // ========================================================================
    // Spells
    // ========================================================================

    fn parse_spell(&mut self) -> Result<Leaf, SyntaxError> {
        let start = self.pos;
        let name_start = start + 1;
        let name_end = self.scan_name(name_start);
        let name = &self.source[name_start..name_end];
        if name.is_empty() {
            return Err(self.error(
                SyntaxErrorKind::UnexpectedToken,
                "expected a spell name after '#'",
                start,
            ));
        }

        let kind = SpellKind::from_name(name).ok_or_else(|| {
            self.error(
                SyntaxErrorKind::UnknownSpell,
                format!("unknown spell '#{}'", name),
                start,
            )
        })?;
        self.pos = name_end;

        let scope = if self.peek() == Some(b'[') {
            Some(self.parse_scope()?)
        } else {
            None
        };

        let arg = if self.peek() == Some(b'(') {
            if kind.requirement() == ArgRequirement::Forbidden {
                return Err(self.error(
                    SyntaxErrorKind::UnexpectedArgument,
                    format!("{} takes no argument", kind),
                    self.pos,
                ));
            }
            Some(self.parse_argument(kind)?)
        } else {
            None
        };

        if arg.is_none() && kind.requirement() == ArgRequirement::Required {
            return Err(self.error(
                SyntaxErrorKind::MissingArgument,
                format!("{} requires an argument", kind),
                start,
            ));
        }

        Ok(Leaf {
            kind,
            arg,
            scope,
            negated: false,
        })
    }

    fn parse_scope(&mut self) -> Result<Scope, SyntaxError> {
        let source = self.source;
        let open = self.pos;
        let close = memchr::memchr(b']', &self.bytes[open..])
            .map(|n| open + n)
            .ok_or_else(|| {
                self.error(SyntaxErrorKind::InvalidScope, "scope is never closed", open)
            })?;

        let body = &source[open + 1..close];
        let (board, thread) = match body.split_once(',') {
            Some((board, thread)) => (board.trim(), Some(thread.trim())),
            None => (body.trim(), None),
        };

        if board.is_empty() || !board.chars().all(is_board_char) {
            return Err(self.error(
                SyntaxErrorKind::InvalidScope,
                format!("invalid board name '{}'", board),
                open,
            ));
        }

        let thread = match thread {
            None => ThreadScope::Any,
            Some("-") => ThreadScope::BoardOnly,
            Some(text) => parse_number(text).map(ThreadScope::Thread).map_err(|_| {
                self.error(
                    SyntaxErrorKind::InvalidScope,
                    format!("invalid thread '{}', expected a number or '-'", text),
                    open,
                )
            })?,
        };

        self.pos = close + 1;
        Ok(Scope {
            board: board.to_string(),
            thread,
        })
    }

    /// Parse `( ... )` for `kind`; the cursor is on `(`
    fn parse_argument(&mut self, kind: SpellKind) -> Result<SpellArg, SyntaxError> {
        let open = self.pos;
        self.pos += 1;

        match kind.shape() {
            ArgShape::Regex => {
                self.skip_blanks();
                let regex = self.parse_regex_literal()?;
                self.skip_blanks();
                self.expect_close(open)?;
                Ok(SpellArg::Regex(regex))
            }
            ArgShape::Text => {
                let text = self.scan_text(open)?;
                let text = text.trim();
                if text.is_empty() {
                    return Err(self.missing_argument(kind, open));
                }
                Ok(SpellArg::Text(text.to_string()))
            }
            shape => {
                let body = self.pos;
                let close = memchr::memchr(b')', &self.bytes[body..])
                    .map(|n| body + n)
                    .ok_or_else(|| {
                        self.error(
                            SyntaxErrorKind::UnbalancedParenthesis,
                            "argument is never closed",
                            open,
                        )
                    })?;
                let raw = self.source[body..close].trim();
                if raw.is_empty() {
                    return Err(self.missing_argument(kind, open));
                }

                let parsed = match shape {
                    ArgShape::Ranges => parse_ranges(raw).map(SpellArg::Ranges),
                    ArgShape::Image => parse_image(raw).map(SpellArg::Image),
                    ArgShape::Wipe => parse_wipe(raw).map(SpellArg::Wipe),
                    ArgShape::Signature => parse_signature(raw).map(SpellArg::Signature),
                    ArgShape::None | ArgShape::Text | ArgShape::Regex => {
                        Err(format!("{} takes no argument", kind))
                    }
                };
                let arg = parsed.map_err(|message| {
                    self.error(
                        SyntaxErrorKind::InvalidArgument,
                        format!("invalid argument for {}: {}", kind, message),
                        body,
                    )
                })?;

                self.pos = close + 1;
                Ok(arg)
            }
        }
    }

    /// Parse `/source/flags`; the cursor is on the opening `/`
    fn parse_regex_literal(&mut self) -> Result<RegexArg, SyntaxError> {
        let start = self.pos;
        if self.peek() != Some(b'/') {
            return Err(self.error(
                SyntaxErrorKind::InvalidRegex,
                "expected a /regex/ literal",
                start,
            ));
        }

        // A '/' inside a character class does not end the literal
        let body = start + 1;
        let mut end = body;
        let mut in_class = false;
        loop {
            match self.bytes.get(end) {
                None => {
                    return Err(self.error(
                        SyntaxErrorKind::InvalidRegex,
                        "regex literal is never closed",
                        start,
                    ))
                }
                Some(b'\\') => end += 2,
                Some(b'[') => {
                    in_class = true;
                    end += 1;
                }
                Some(b']') => {
                    in_class = false;
                    end += 1;
                }
                Some(b'/') if !in_class => break,
                Some(_) => end += 1,
            }
        }

        let flags_start = end + 1;
        let mut flags_end = flags_start;
        while self
            .bytes
            .get(flags_end)
            .is_some_and(|b| b.is_ascii_alphabetic())
        {
            flags_end += 1;
        }

        let source = &self.source[body..end];
        let flags = &self.source[flags_start..flags_end];
        if source.is_empty() {
            return Err(self.error(
                SyntaxErrorKind::InvalidRegex,
                "empty regex literal",
                start,
            ));
        }

        let regex = RegexArg::new(source, flags).map_err(|message| {
            self.error(
                SyntaxErrorKind::InvalidRegex,
                format!("invalid regex /{}/{}: {}", source, flags, message),
                start,
            )
        })?;
        self.pos = flags_end;
        Ok(regex)
    }

    // ========================================================================
    // Replacements
    // ========================================================================

    fn parse_replacement(&mut self, direction: Direction) -> Result<ReplacementRule, SyntaxError> {
        let start = self.pos;
        self.pos += 1 + direction.keyword().len();

        let scope = if self.peek() == Some(b'[') {
            Some(self.parse_scope()?)
        } else {
            None
        };

        if self.peek() != Some(b'(') {
            return Err(self.error(
                SyntaxErrorKind::MissingArgument,
                format!("#{} requires (/regex/,text)", direction.keyword()),
                start,
            ));
        }
        let open = self.pos;
        self.pos += 1;

        self.skip_blanks();
        let pattern = self.parse_regex_literal()?;
        self.skip_blanks();

        let replacement = match self.peek() {
            Some(b',') => {
                self.pos += 1;
                self.scan_text(open)?
            }
            _ => {
                self.expect_close(open)?;
                String::new()
            }
        };

        Ok(ReplacementRule::new(scope, pattern, &replacement))
    }

    fn expect_line_end_after_replacement(&mut self) -> Result<(), SyntaxError> {
        self.skip_blanks();
        let at = self.pos;
        match self.peek() {
            None | Some(b'\n') => {
                let next = self.skip_whitespace_from(at);
                match self.bytes.get(next) {
                    Some(b'&') | Some(b'|') => Err(self.operator_after_replacement(next)),
                    _ => Ok(()),
                }
            }
            Some(b'&') | Some(b'|') => Err(self.operator_after_replacement(at)),
            Some(_) => Err(self.error(
                SyntaxErrorKind::UnexpectedToken,
                format!("expected end of line after replacement, found {}", self.describe(at)),
                at,
            )),
        }
    }

    fn operator_after_replacement(&self, at: usize) -> SyntaxError {
        self.error(
            SyntaxErrorKind::OperatorAfterReplacement,
            "replacements cannot be combined with '&' or '|'",
            at,
        )
    }

    // ========================================================================
    // Scanning helpers
    // ========================================================================

    /// Read escaped free text up to the closing `)`, consuming it
    fn scan_text(&mut self, open: usize) -> Result<String, SyntaxError> {
        let mut text = String::new();
        let mut chars = self.source[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                ')' => {
                    self.pos += i + 1;
                    return Ok(text);
                }
                '\\' => match chars.clone().next() {
                    Some((_, escaped @ ('(' | ')' | '\\'))) => {
                        text.push(escaped);
                        chars.next();
                    }
                    _ => text.push('\\'),
                },
                c => text.push(c),
            }
        }
        Err(self.error(
            SyntaxErrorKind::UnbalancedParenthesis,
            "argument is never closed",
            open,
        ))
    }

    fn expect_close(&mut self, open: usize) -> Result<(), SyntaxError> {
        match self.peek() {
            Some(b')') => {
                self.pos += 1;
                Ok(())
            }
            None => Err(self.error(
                SyntaxErrorKind::UnbalancedParenthesis,
                "argument is never closed",
                open,
            )),
            Some(_) => Err(self.error(
                SyntaxErrorKind::InvalidArgument,
                format!("expected ')', found {}", self.describe(self.pos)),
                self.pos,
            )),
        }
    }

    /// If the cursor is on `#rep` or `#outrep`, which one
    fn peek_replacement(&self) -> Option<Direction> {
        if self.peek() != Some(b'#') {
            return None;
        }
        let name_start = self.pos + 1;
        match &self.source[name_start..self.scan_name(name_start)] {
            "rep" => Some(Direction::Incoming),
            "outrep" => Some(Direction::Outgoing),
            _ => None,
        }
    }

    fn scan_name(&self, from: usize) -> usize {
        let mut end = from;
        while self
            .bytes
            .get(end)
            .is_some_and(|b| b.is_ascii_alphanumeric())
        {
            end += 1;
        }
        end
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Skip spaces, tabs and carriage returns
    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Skip blanks and newlines
    fn skip_whitespace(&mut self) {
        self.pos = self.skip_whitespace_from(self.pos);
    }

    fn skip_whitespace_from(&self, from: usize) -> usize {
        let mut pos = from;
        while matches!(self.bytes.get(pos), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            pos += 1;
        }
        pos
    }

    /// Newlines only count as whitespace inside parentheses
    fn skip_for_depth(&mut self, depth: usize) {
        if depth > 0 {
            self.skip_whitespace();
        } else {
            self.skip_blanks();
        }
    }

    fn describe(&self, at: usize) -> String {
        match self.source[at..].chars().next() {
            None => "end of input".to_string(),
            Some('\n') => "end of line".to_string(),
            Some(c) => format!("'{}'", c),
        }
    }

    fn missing_argument(&self, kind: SpellKind, at: usize) -> SyntaxError {
        self.error(
            SyntaxErrorKind::MissingArgument,
            format!("{} requires a non-empty argument", kind),
            at,
        )
    }

    fn error(&self, kind: SyntaxErrorKind, message: impl Into<String>, at: usize) -> SyntaxError {
        SyntaxError::at(kind, message, self.source, at)
    }
}

// ============================================================================
// Argument parsers
// ============================================================================

fn is_board_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn parse_number(text: &str) -> Result<u64, String> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("expected a number, found '{}'", text));
    }
    text.parse()
        .map_err(|_| format!("number '{}' is too large", text))
}

fn parse_range(text: &str) -> Result<NumRange, String> {
    match text.split_once('-') {
        Some((min, max)) => {
            let min = parse_number(min.trim())?;
            let max = parse_number(max.trim())?;
            if min > max {
                return Err(format!("range {}-{} is reversed", min, max));
            }
            Ok(NumRange::new(min, max))
        }
        None => parse_number(text).map(NumRange::single),
    }
}

/// `n` or `a-b`, comma separated
pub(crate) fn parse_ranges(text: &str) -> Result<Vec<NumRange>, String> {
    text.split(',').map(|part| parse_range(part.trim())).collect()
}

fn parse_dimensions(text: &str) -> Result<Dimensions, String> {
    let (width, height) = text
        .split_once('x')
        .ok_or_else(|| format!("expected WxH, found '{}'", text))?;
    let to_u32 = |n: &str| -> Result<u32, String> {
        let value = parse_number(n.trim())?;
        u32::try_from(value).map_err(|_| format!("dimension {} is too large", value))
    };
    Ok(Dimensions {
        width: to_u32(width)?,
        height: to_u32(height)?,
    })
}

fn parse_size(text: &str) -> Result<SizeRange, String> {
    match text.split_once('-') {
        Some((min, max)) => {
            let min = parse_dimensions(min.trim())?;
            let max = parse_dimensions(max.trim())?;
            if min.width > max.width || min.height > max.height {
                return Err(format!("size range {}-{} is reversed", min, max));
            }
            Ok(SizeRange { min, max })
        }
        None => {
            let size = parse_dimensions(text)?;
            Ok(SizeRange {
                min: size,
                max: size,
            })
        }
    }
}

/// `(<|=|>) weight? (@WxH(-WxH)?)?`
pub(crate) fn parse_image(text: &str) -> Result<ImageCondition, String> {
    let mut chars = text.chars();
    let cmp = chars
        .next()
        .and_then(Comparison::from_symbol)
        .ok_or_else(|| "expected '<', '=' or '>'".to_string())?;

    let rest = chars.as_str().trim();
    let (weight, size) = match rest.split_once('@') {
        Some((weight, size)) => (weight.trim(), Some(size.trim())),
        None => (rest, None),
    };

    let weight = if weight.is_empty() {
        None
    } else {
        Some(parse_range(weight)?)
    };
    let size = size.map(parse_size).transpose()?;

    if weight.is_none() && size.is_none() {
        return Err("expected a weight or '@WxH'".to_string());
    }

    let has_range = weight.is_some_and(|w| w.min != w.max) || size.is_some_and(|s| s.min != s.max);
    if has_range && cmp != Comparison::Equal {
        return Err("ranges are only allowed with '='".to_string());
    }

    Ok(ImageCondition { cmp, weight, size })
}

pub(crate) fn parse_wipe(text: &str) -> Result<WipeChecks, String> {
    let mut checks = WipeChecks::empty();
    for name in text.split(',').map(str::trim) {
        let check = WipeChecks::from_check_name(name)
            .ok_or_else(|| format!("unknown check '{}'", name))?;
        checks |= check;
    }
    Ok(checks)
}

/// Decimal or `0x` hexadecimal 64-bit hash
pub(crate) fn parse_signature(text: &str) -> Result<u64, String> {
    match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            u64::from_str_radix(hex, 16).map_err(|_| format!("hash '{}' is too large", text))
        }
        Some(_) => Err(format!("invalid hexadecimal hash '{}'", text)),
        None => parse_number(text),
    }
}
