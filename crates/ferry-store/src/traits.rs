use async_trait::async_trait;
use ferry_types::ObjectMetadata;
use tokio::io::{AsyncRead, AsyncSeek};

use crate::error::StoreResult;

/// Forward-only byte stream of an object's content.
pub type ObjectStream = Box<dyn AsyncRead + Send + Unpin>;

/// A seekable, re-readable upload payload.
///
/// Implemented for every `AsyncRead + AsyncSeek` type, so in-memory cursors,
/// files, and spooled buffers all qualify.
pub trait UploadBody: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> UploadBody for T {}

/// Read-only access to the store objects are copied from.
///
/// Implementations must distinguish absence from transient failure: a
/// missing object is `Ok(None)` from [`head_object`](Self::head_object) and
/// `StoreError::NotFound` from [`get_object_stream`](Self::get_object_stream),
/// while connectivity problems map to errors for which
/// `StoreError::is_transient` returns `true`.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Logical store name used in logs and locations.
    fn name(&self) -> &str;

    /// Look up object metadata. Returns `Ok(None)` if the object does not exist.
    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<Option<ObjectMetadata>>;

    /// Open a read stream over the object's content.
    async fn get_object_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> StoreResult<(ObjectStream, ObjectMetadata)>;
}

/// Read/write access to the single bucket objects are copied into.
///
/// Digests reported through [`stat_object`](Self::stat_object) must already
/// be normalized to raw bytes, whatever encoding the service uses natively.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Logical name of the destination (store and bucket) used in logs.
    fn name(&self) -> &str;

    /// Look up object metadata. Returns `Ok(None)` if the object does not exist.
    async fn stat_object(&self, key: &str) -> StoreResult<Option<ObjectMetadata>>;

    /// Write an object, replacing any existing object at `key`.
    ///
    /// The body is positioned at its start and holds exactly
    /// `content_length` bytes.
    async fn put_object(
        &self,
        key: &str,
        body: &mut dyn UploadBody,
        content_length: u64,
        content_type: &str,
    ) -> StoreResult<()>;

    /// Delete an object. Returns `true` if the object existed.
    async fn delete_object(&self, key: &str) -> StoreResult<bool>;
}
