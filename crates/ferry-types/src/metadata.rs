use serde::{Deserialize, Serialize};

use crate::digest::DeclaredDigest;

/// Content type used when a store reports none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// What a store reports about one object.
///
/// Lookups return `Option<ObjectMetadata>`: `None` means the object does not
/// exist. Metadata is never persisted by ferry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub digest: Option<DeclaredDigest>,
}

impl ObjectMetadata {
    pub fn new(content_length: u64) -> Self {
        Self {
            content_length,
            content_type: None,
            digest: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_digest(mut self, digest: DeclaredDigest) -> Self {
        self.digest = Some(digest);
        self
    }

    /// The declared content type, or [`DEFAULT_CONTENT_TYPE`].
    pub fn content_type_or_default(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}
