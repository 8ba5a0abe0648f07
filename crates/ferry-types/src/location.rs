use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identifies one object in one store.
///
/// Locations are immutable once built. [`ObjectLocation::validate`] rejects
/// inputs no store could address, so callers can fail fast before any I/O.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    /// Logical name of the store holding the object (used for logging).
    pub store: String,
    /// Bucket or container name.
    pub bucket: String,
    /// Object key (path within the bucket).
    pub key: String,
}

impl ObjectLocation {
    pub fn new(
        store: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            store: store.into(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Check that bucket and key are addressable.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.bucket.is_empty() {
            return Err(TypeError::InvalidLocation("bucket is empty".into()));
        }
        validate_key(&self.key)
    }
}

/// Validate an object key.
///
/// Keys must be non-empty, relative, free of NUL bytes, and must not contain
/// `.` or `..` segments.
pub fn validate_key(key: &str) -> Result<(), TypeError> {
    if key.is_empty() {
        return Err(TypeError::InvalidLocation("key is empty".into()));
    }
    if key.starts_with('/') {
        return Err(TypeError::InvalidLocation(format!("key must be relative: {key}")));
    }
    if key.contains('\0') {
        return Err(TypeError::InvalidLocation("key contains a NUL byte".into()));
    }
    if key.split('/').any(|seg| seg == ".." || seg == ".") {
        return Err(TypeError::InvalidLocation(format!("key contains a dot segment: {key}")));
    }
    Ok(())
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.store, self.bucket, self.key)
    }
}
