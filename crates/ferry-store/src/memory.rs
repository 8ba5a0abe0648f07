use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use ferry_digest::md5_of;
use ferry_types::{DeclaredDigest, ObjectMetadata};
use tokio::io::AsyncReadExt;

use crate::error::{StoreError, StoreResult};
use crate::traits::{DestinationStore, ObjectStream, SourceStore, UploadBody};

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    digest: DeclaredDigest,
}

impl StoredObject {
    fn metadata(&self) -> ObjectMetadata {
        ObjectMetadata {
            content_length: self.data.len() as u64,
            content_type: self.content_type.clone(),
            digest: Some(self.digest.clone()),
        }
    }
}

type ObjectMap = HashMap<(String, String), StoredObject>;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Objects are keyed by `(bucket, key)` and
/// held behind a `RwLock`. Cloning the store shares the underlying map, so a
/// destination view and the store it came from see the same objects.
#[derive(Clone)]
pub struct InMemoryObjectStore {
    name: String,
    objects: Arc<RwLock<ObjectMap>>,
}

impl InMemoryObjectStore {
    /// Create a new empty store with the given logical name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert an object, declaring its plain MD5 digest.
    pub fn insert(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
    ) {
        let data = data.into();
        let digest = DeclaredDigest::Plain(md5_of(&data));
        self.insert_with_digest(bucket, key, data, content_type, digest);
    }

    /// Insert an object with an explicit declared digest.
    ///
    /// Lets tests model multipart uploads (composite digests) or stores whose
    /// declared digest disagrees with the bytes they serve.
    pub fn insert_with_digest(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
        content_type: Option<&str>,
        digest: DeclaredDigest,
    ) {
        let object = StoredObject {
            data: data.into(),
            content_type: content_type.map(str::to_string),
            digest,
        };
        self.objects
            .write()
            .expect("lock poisoned")
            .insert((bucket.to_string(), key.to_string()), object);
    }

    /// Content of an object, if present.
    pub fn get_bytes(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.lookup(bucket, key).map(|obj| obj.data)
    }

    /// Metadata of an object, if present.
    pub fn metadata(&self, bucket: &str, key: &str) -> Option<ObjectMetadata> {
        self.lookup(bucket, key).map(|obj| obj.metadata())
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.lookup(bucket, key).is_some()
    }

    /// Number of objects across all buckets.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A [`DestinationStore`] view bound to one bucket of this store.
    pub fn destination(&self, bucket: impl Into<String>) -> InMemoryDestination {
        let bucket = bucket.into();
        InMemoryDestination {
            display: format!("{}/{}", self.name, bucket),
            store: self.clone(),
            bucket,
        }
    }

    fn lookup(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(&(bucket.to_string(), key.to_string())).cloned()
    }

    fn remove(&self, bucket: &str, key: &str) -> bool {
        let mut map = self.objects.write().expect("lock poisoned");
        map.remove(&(bucket.to_string(), key.to_string())).is_some()
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("name", &self.name)
            .field("object_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl SourceStore for InMemoryObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        Ok(self.metadata(bucket, key))
    }

    async fn get_object_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> StoreResult<(ObjectStream, ObjectMetadata)> {
        let object = self
            .lookup(bucket, key)
            .ok_or_else(|| StoreError::not_found(bucket, key))?;
        let metadata = object.metadata();
        Ok((Box::new(Cursor::new(object.data)), metadata))
    }
}

/// One bucket of an [`InMemoryObjectStore`], usable as a replication target.
#[derive(Clone, Debug)]
pub struct InMemoryDestination {
    display: String,
    store: InMemoryObjectStore,
    bucket: String,
}

impl InMemoryDestination {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn store(&self) -> &InMemoryObjectStore {
        &self.store
    }
}

#[async_trait]
impl DestinationStore for InMemoryDestination {
    fn name(&self) -> &str {
        &self.display
    }

    async fn stat_object(&self, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        Ok(self.store.metadata(&self.bucket, key))
    }

    async fn put_object(
        &self,
        key: &str,
        body: &mut dyn UploadBody,
        content_length: u64,
        content_type: &str,
    ) -> StoreResult<()> {
        let mut data = Vec::with_capacity(content_length as usize);
        body.read_to_end(&mut data).await?;
        if data.len() as u64 != content_length {
            return Err(StoreError::Rejected(format!(
                "body length {} does not match declared length {content_length}",
                data.len()
            )));
        }
        self.store.insert(&self.bucket, key, data, Some(content_type));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<bool> {
        Ok(self.store.remove(&self.bucket, key))
    }
}
