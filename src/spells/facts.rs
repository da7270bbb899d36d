//! Facts about one post
//!
//! Supplied by the caller; the engine never fetches anything besides what
//! the [`Providers`](super::providers::Providers) resolve for the three
//! asynchronous spells.

use super::arg::Dimensions;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// An attached file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name
    pub name: String,
    /// Size in kilobytes, if known
    pub weight_kb: Option<u64>,
    /// Width in pixels, if known
    pub width: Option<u32>,
    /// Height in pixels, if known
    pub height: Option<u32>,
    /// Identifier the image provider understands
    pub id: String,
    /// Perceptual hash, if already computed
    pub signature: Option<u64>,
}

impl Attachment {
    /// Create an attachment with only a name and identifier
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            ..Self::default()
        }
    }

    /// Set the size in kilobytes
    pub fn weight_kb(mut self, weight: u64) -> Self {
        self.weight_kb = Some(weight);
        self
    }

    /// Set the pixel size
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Set an already computed perceptual hash
    pub fn signature(mut self, signature: u64) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Pixel size when both axes are known
    pub fn dimensions(&self) -> Option<Dimensions> {
        Some(Dimensions {
            width: self.width?,
            height: self.height?,
        })
    }
}

/// An embedded video link
///
/// Title, author and view count are filled in lazily by the video provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    /// Hosting service, e.g. `youtube`
    pub host: String,
    /// Video identifier on the host
    pub id: String,
    /// Title, if resolved
    pub title: Option<String>,
    /// Uploader, if resolved
    pub author: Option<String>,
    /// View count, if resolved
    pub views: Option<u64>,
}

impl VideoRef {
    /// Create an unresolved reference
    pub fn new(host: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            id: id.into(),
            ..Self::default()
        }
    }

    /// Attach already known metadata
    pub fn resolved(mut self, metadata: VideoMetadata) -> Self {
        self.title = Some(metadata.title);
        self.author = Some(metadata.author);
        self.views = metadata.views;
        self
    }

    /// Metadata, when both title and author are known
    pub fn metadata(&self) -> Option<VideoMetadata> {
        Some(VideoMetadata {
            title: self.title.clone()?,
            author: self.author.clone()?,
            views: self.views,
        })
    }
}

/// Resolved video details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Video title
    pub title: String,
    /// Uploader name
    pub author: String,
    /// View count, if the host reports one
    pub views: Option<u64>,
}

/// Everything spells may ask about a post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFacts {
    /// Post number on the board
    pub number: u64,
    /// 1-based position within the thread; the original post is 1
    pub position: u64,
    /// Whether this is the thread's original post
    pub original_post: bool,
    /// Whether the post carries the sage flag
    pub sage: bool,
    text: String,
    #[serde(skip)]
    text_lower: String,
    /// Rendered markup
    pub html: String,
    /// Subject line, empty when absent
    pub subject: String,
    /// Author display name, empty when absent
    pub name: String,
    /// Author signature (tripcode)
    pub signature: Option<String>,
    /// Attached files
    pub attachments: Vec<Attachment>,
    /// Embedded videos
    pub videos: Vec<VideoRef>,
}

impl PostFacts {
    /// Create facts for post `number` with everything else empty
    pub fn new(number: u64) -> Self {
        Self {
            number,
            ..Self::default()
        }
    }

    /// Set the position within the thread
    pub fn position(mut self, position: u64) -> Self {
        self.position = position;
        self
    }

    /// Mark as the thread's original post
    pub fn original_post(mut self, original: bool) -> Self {
        self.original_post = original;
        self
    }

    /// Set the sage flag
    pub fn sage(mut self, sage: bool) -> Self {
        self.sage = sage;
        self
    }

    /// Set the plain text
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Set the rendered markup
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    /// Set the subject
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the author name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the author signature
    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Add an attachment
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Add a video reference
    pub fn video(mut self, video: VideoRef) -> Self {
        self.videos.push(video);
        self
    }

    /// Replace the plain text, refreshing its lowercase form
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.text_lower = self.text.to_lowercase();
    }

    /// Plain text, case preserved
    #[inline]
    pub fn plain_text(&self) -> &str {
        &self.text
    }

    /// Plain text, lowercased once
    ///
    /// Facts built through deserialization compute it on first use.
    pub fn text_lower(&self) -> Cow<'_, str> {
        if self.text_lower.is_empty() && !self.text.is_empty() {
            Cow::Owned(self.text.to_lowercase())
        } else {
            Cow::Borrowed(&self.text_lower)
        }
    }

    /// Whether the post has any attachment
    #[inline]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}
