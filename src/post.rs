//! The unit of content every other module works on.
//!
//! A [`Post`] is created by a posting plugin, rewritten in place by zero or
//! more processing plugins, and is read-only once it reaches a publisher.
//!
//! ## Ownership of attachments
//!
//! A post exclusively owns its [`Attachment`]s. Callers only ever see a copy
//! ([`Post::attachments`], [`Post::images`]) and the only way to grow the list
//! is [`Post::attach`]. Nothing removes an attachment. Processing plugins may
//! rewrite the *content* of processable attachments through
//! [`Post::processable_attachments_mut`], which cannot add or remove entries.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Attachment kind for images. Images are never run through text processing.
pub const IMAGE: &str = "image";

/// A piece of media or text hanging off a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Semantic tag, e.g. `"image"` or `"link"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Where the attachment came from, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Raw or renderable payload.
    #[serde(default)]
    pub content: String,
    /// Whether processing plugins may treat `content` as transformable text.
    pub should_process: bool,
}

impl Attachment {
    /// Build an attachment. Everything except images is processable.
    pub fn new(kind: impl Into<String>, url: Option<String>, content: impl Into<String>) -> Self {
        let kind = kind.into();
        let should_process = kind != IMAGE;
        Self {
            kind,
            url,
            content: content.into(),
            should_process,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == IMAGE
    }
}

/// A single feed entry.
///
/// Serializes with an extra derived `images` field so templates can iterate
/// `post.images` directly. That field is ignored when reading a post back.
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    id: Uuid,
    created: DateTime<Utc>,
    /// Post body. Processing plugins rewrite this in place.
    pub content: String,
    /// Set once every processing plugin has run.
    pub processed: bool,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

impl Post {
    /// A new, unprocessed post with a fresh id, stamped with the current time.
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_created(content, Utc::now())
    }

    /// A new post with an explicit creation time (used when importing).
    pub fn with_created(content: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created,
            content: content.into(),
            processed: false,
            attachments: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// Snapshot of every attachment in attach order.
    ///
    /// The returned vector is a copy; later calls to [`Post::attach`] do not
    /// affect it.
    pub fn attachments(&self) -> Vec<Attachment> {
        self.attachments.clone()
    }

    /// Snapshot of the image attachments, in attach order.
    pub fn images(&self) -> Vec<Attachment> {
        self.attachments
            .iter()
            .filter(|a| a.is_image())
            .cloned()
            .collect()
    }

    /// Append an attachment.
    pub fn attach(&mut self, kind: impl Into<String>, url: Option<String>, content: impl Into<String>) {
        self.attachments.push(Attachment::new(kind, url, content));
    }

    /// Mutable access to the content of attachments flagged `should_process`.
    pub fn processable_attachments_mut(&mut self) -> impl Iterator<Item = &mut String> + '_ {
        self.attachments
            .iter_mut()
            .filter(|a| a.should_process)
            .map(|a| &mut a.content)
    }
}

impl Serialize for Post {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Post", 6)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("created", &self.created)?;
        s.serialize_field("content", &self.content)?;
        s.serialize_field("processed", &self.processed)?;
        s.serialize_field("attachments", &self.attachments)?;
        s.serialize_field("images", &self.images())?;
        s.end()
    }
}
