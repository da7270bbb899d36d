//! Spell kinds
//!
//! The set of spells is closed: the grammar, the optimizer's sort order and the
//! persisted format all enumerate [`SpellKind`]. Adding a spell means adding a
//! variant here and teaching the parser, printer and engine about it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named predicate of the spell language
///
/// Declaration order is the canonical sort order. The kinds that may need an
/// asynchronous provider lookup are declared last so that canonical chains
/// try cheap predicates first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpellKind {
    /// `#words(text)`: lowercase post text contains the text
    Words,
    /// `#exp(/re/)`: regex over the plain post text
    Exp,
    /// `#exph(/re/)`: regex over the rendered markup
    Exph,
    /// `#imgn(/re/)`: regex over attachment file names
    Imgn,
    /// `#subj` / `#subj(/re/)`: subject present / matches
    Subj,
    /// `#name` / `#name(text)`: author name present / contains text
    Name,
    /// `#trip` / `#trip(text)`: author signature present / equals text
    Trip,
    /// `#img` / `#img(cmp)`: has attachments / an attachment satisfies the comparator
    Img,
    /// `#sage`: the post carries the sage flag
    Sage,
    /// `#op`: the post is the original post of its thread
    Op,
    /// `#tlen` / `#tlen(ranges)`: text non-empty / text length within ranges
    Tlen,
    /// `#all`: always true
    All,
    /// `#wipe` / `#wipe(checks)`: spam heuristics fire
    Wipe,
    /// `#num(ranges)`: position within the thread is within ranges
    Num,
    /// `#ihash(signature)`: an attachment's perceptual hash is close to the signature
    Ihash,
    /// `#video` / `#video(/re/)`: has video references / a video title matches
    Video,
    /// `#vauthor(text)`: a video's author equals the text
    Vauthor,
}

/// Shape of a spell's argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgShape {
    /// The spell takes no argument
    None,
    /// Free text with `\(`, `\)`, `\\` escapes
    Text,
    /// A `/source/flags` literal
    Regex,
    /// Comma-separated numbers and `a-b` ranges
    Ranges,
    /// Size/weight comparator such as `>100@640x480`
    Image,
    /// Comma-separated heuristic names
    Wipe,
    /// A 64-bit perceptual hash
    Signature,
}

/// Whether a spell's argument must, may or must not be present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgRequirement {
    /// `#sage(...)` is an error
    Forbidden,
    /// Both `#subj` and `#subj(/re/)` are valid
    Optional,
    /// `#words` without an argument is an error
    Required,
}

impl SpellKind {
    /// Every kind, in canonical order
    pub const ALL: [SpellKind; 17] = [
        SpellKind::Words,
        SpellKind::Exp,
        SpellKind::Exph,
        SpellKind::Imgn,
        SpellKind::Subj,
        SpellKind::Name,
        SpellKind::Trip,
        SpellKind::Img,
        SpellKind::Sage,
        SpellKind::Op,
        SpellKind::Tlen,
        SpellKind::All,
        SpellKind::Wipe,
        SpellKind::Num,
        SpellKind::Ihash,
        SpellKind::Video,
        SpellKind::Vauthor,
    ];

    /// The name written after `#`
    pub fn name(self) -> &'static str {
        match self {
            SpellKind::Words => "words",
            SpellKind::Exp => "exp",
            SpellKind::Exph => "exph",
            SpellKind::Imgn => "imgn",
            SpellKind::Subj => "subj",
            SpellKind::Name => "name",
            SpellKind::Trip => "trip",
            SpellKind::Img => "img",
            SpellKind::Sage => "sage",
            SpellKind::Op => "op",
            SpellKind::Tlen => "tlen",
            SpellKind::All => "all",
            SpellKind::Wipe => "wipe",
            SpellKind::Num => "num",
            SpellKind::Ihash => "ihash",
            SpellKind::Video => "video",
            SpellKind::Vauthor => "vauthor",
        }
    }

    /// Look a kind up by its name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// The argument shape this kind parses
    pub fn shape(self) -> ArgShape {
        match self {
            SpellKind::Words | SpellKind::Name | SpellKind::Trip | SpellKind::Vauthor => {
                ArgShape::Text
            }
            SpellKind::Exp
            | SpellKind::Exph
            | SpellKind::Imgn
            | SpellKind::Subj
            | SpellKind::Video => ArgShape::Regex,
            SpellKind::Tlen | SpellKind::Num => ArgShape::Ranges,
            SpellKind::Img => ArgShape::Image,
            SpellKind::Wipe => ArgShape::Wipe,
            SpellKind::Ihash => ArgShape::Signature,
            SpellKind::Sage | SpellKind::Op | SpellKind::All => ArgShape::None,
        }
    }

    /// Whether this kind needs an argument
    pub fn requirement(self) -> ArgRequirement {
        match self {
            SpellKind::Sage | SpellKind::Op | SpellKind::All => ArgRequirement::Forbidden,
            SpellKind::Words
            | SpellKind::Exp
            | SpellKind::Exph
            | SpellKind::Imgn
            | SpellKind::Num
            | SpellKind::Ihash
            | SpellKind::Vauthor => ArgRequirement::Required,
            SpellKind::Subj
            | SpellKind::Name
            | SpellKind::Trip
            | SpellKind::Img
            | SpellKind::Tlen
            | SpellKind::Wipe
            | SpellKind::Video => ArgRequirement::Optional,
        }
    }

    /// Whether resolving this kind may need an asynchronous provider
    #[inline]
    pub fn is_async(self) -> bool {
        matches!(self, SpellKind::Ihash | SpellKind::Video | SpellKind::Vauthor)
    }
}

impl fmt::Display for SpellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.name())
    }
}
