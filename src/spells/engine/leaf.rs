//! Per-kind spell predicates
//!
//! Exactly one arm per [`SpellKind`]. Arguments that do not fit the kind
//! cannot come out of the parser; such leaves (built by hand) never match.

use super::EngineConfig;
use crate::spells::arg::{SpellArg, WipeChecks};
use crate::spells::ast::Leaf;
use crate::spells::facts::{Attachment, PostFacts, VideoMetadata, VideoRef};
use crate::spells::kind::SpellKind;
use crate::spells::providers::Providers;
use crate::spells::scheduler::Scheduler;
use crate::spells::wipe;

/// Value of one spell before negation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct LeafValue {
    pub matched: bool,
    /// A provider lookup failed while computing the value
    pub lookup_failed: bool,
}

impl LeafValue {
    pub fn known(matched: bool) -> Self {
        Self {
            matched,
            lookup_failed: false,
        }
    }

    /// Value after the spell's own negation
    ///
    /// A failed lookup that found no match leaves the spell undecided, which
    /// never counts towards hiding.
    pub fn value(self, negated: bool) -> bool {
        if self.lookup_failed && !self.matched {
            return false;
        }
        self.matched != negated
    }
}

/// Spells answered from the post facts alone
pub(super) fn matches_sync(leaf: &Leaf, facts: &PostFacts, config: &EngineConfig) -> bool {
    let text = facts.plain_text();
    match (leaf.kind, leaf.arg.as_ref()) {
        (SpellKind::Words, Some(SpellArg::Text(words))) => {
            facts.text_lower().contains(&words.to_lowercase())
        }
        (SpellKind::Exp, Some(SpellArg::Regex(re))) => re.is_match(text),
        (SpellKind::Exph, Some(SpellArg::Regex(re))) => re.is_match(&facts.html),
        (SpellKind::Imgn, Some(SpellArg::Regex(re))) => {
            facts.attachments.iter().any(|a| re.is_match(&a.name))
        }
        (SpellKind::Subj, None) => !facts.subject.is_empty(),
        (SpellKind::Subj, Some(SpellArg::Regex(re))) => re.is_match(&facts.subject),
        (SpellKind::Name, None) => !facts.name.is_empty(),
        (SpellKind::Name, Some(SpellArg::Text(name))) => facts.name.contains(name.as_str()),
        (SpellKind::Trip, None) => facts.signature.is_some(),
        (SpellKind::Trip, Some(SpellArg::Text(trip))) => {
            facts.signature.as_deref() == Some(trip.as_str())
        }
        (SpellKind::Img, None) => facts.has_attachments(),
        (SpellKind::Img, Some(SpellArg::Image(condition))) => facts
            .attachments
            .iter()
            .any(|a| condition.matches(a.weight_kb, a.dimensions())),
        (SpellKind::Sage, _) => facts.sage,
        (SpellKind::Op, _) => facts.original_post,
        (SpellKind::Tlen, None) => !text.is_empty(),
        (SpellKind::Tlen, Some(SpellArg::Ranges(ranges))) => {
            let len = text.chars().count() as u64;
            ranges.iter().any(|r| r.contains(len))
        }
        (SpellKind::All, _) => true,
        (SpellKind::Wipe, None) => wipe::detect(text, WipeChecks::all(), &config.wipe).is_some(),
        (SpellKind::Wipe, Some(SpellArg::Wipe(checks))) => {
            wipe::detect(text, *checks, &config.wipe).is_some()
        }
        (SpellKind::Num, Some(SpellArg::Ranges(ranges))) => {
            ranges.iter().any(|r| r.contains(facts.position))
        }
        _ => false,
    }
}

/// Spells that may need a provider lookup
///
/// Facts the caller already resolved are used first. A failed lookup only
/// removes that attachment or video from consideration.
pub(super) async fn matches_async(
    leaf: &Leaf,
    facts: &PostFacts,
    providers: &dyn Providers,
    scheduler: &Scheduler,
    config: &EngineConfig,
) -> LeafValue {
    let mut value = LeafValue::known(false);

    match (leaf.kind, leaf.arg.as_ref()) {
        (SpellKind::Ihash, Some(SpellArg::Signature(target))) => {
            for attachment in &facts.attachments {
                let Some(signature) = image_signature(attachment, providers, scheduler).await
                else {
                    value.lookup_failed = true;
                    continue;
                };
                if (signature ^ target).count_ones() <= config.ihash_max_distance {
                    value.matched = true;
                    break;
                }
            }
        }
        (SpellKind::Video, None) => value.matched = !facts.videos.is_empty(),
        (SpellKind::Video, Some(SpellArg::Regex(re))) => {
            for video in &facts.videos {
                let title = match &video.title {
                    Some(title) => Some(title.clone()),
                    None => video_field(video, providers, scheduler, |m| m.title).await,
                };
                match title {
                    Some(title) if re.is_match(&title) => {
                        value.matched = true;
                        break;
                    }
                    Some(_) => {}
                    None => value.lookup_failed = true,
                }
            }
        }
        (SpellKind::Vauthor, Some(SpellArg::Text(author))) => {
            let wanted = author.to_lowercase();
            for video in &facts.videos {
                let found = match &video.author {
                    Some(author) => Some(author.clone()),
                    None => video_field(video, providers, scheduler, |m| m.author).await,
                };
                match found {
                    Some(found) if found.to_lowercase() == wanted => {
                        value.matched = true;
                        break;
                    }
                    Some(_) => {}
                    None => value.lookup_failed = true,
                }
            }
        }
        _ => {}
    }

    value
}

async fn image_signature(
    attachment: &Attachment,
    providers: &dyn Providers,
    scheduler: &Scheduler,
) -> Option<u64> {
    if let Some(signature) = attachment.signature {
        return Some(signature);
    }
    match scheduler
        .run(move || providers.image_signature(attachment))
        .await
    {
        Ok(signature) => Some(signature),
        Err(error) => {
            log_debug!("image signature of {} unavailable: {}", attachment.id, error);
            None
        }
    }
}

async fn video_field(
    video: &VideoRef,
    providers: &dyn Providers,
    scheduler: &Scheduler,
    field: impl FnOnce(VideoMetadata) -> String,
) -> Option<String> {
    match scheduler.run(move || providers.video_metadata(video)).await {
        Ok(metadata) => Some(field(metadata)),
        Err(error) => {
            log_debug!("metadata of {} video {} unavailable: {}", video.host, video.id, error);
            None
        }
    }
}
