//! Fault-injecting store wrappers shared by the integration tests.
#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ferry_store::{
    DestinationStore, InMemoryDestination, InMemoryObjectStore, ObjectStream, SourceStore,
    StoreError, StoreResult, TransientKind, UploadBody,
};
use ferry_types::ObjectMetadata;
use tokio::io::AsyncReadExt;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicU32>);

impl Counter {
    pub fn bump(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Source that fails `head_object` transiently a set number of times and
/// counts every call.
#[derive(Clone)]
pub struct FlakySource {
    pub inner: InMemoryObjectStore,
    failures: Arc<AtomicU32>,
    pub heads: Counter,
    pub streams: Counter,
}

impl FlakySource {
    pub fn new(inner: InMemoryObjectStore, failures: u32) -> Self {
        Self {
            inner,
            failures: Arc::new(AtomicU32::new(failures)),
            heads: Counter::default(),
            streams: Counter::default(),
        }
    }

    /// Never fails; only counts.
    pub fn reliable(inner: InMemoryObjectStore) -> Self {
        Self::new(inner, 0)
    }

    pub fn always_failing(inner: InMemoryObjectStore) -> Self {
        Self::new(inner, u32::MAX)
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SourceStore for FlakySource {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        self.heads.bump();
        if self.take_failure() {
            return Err(StoreError::transient(
                TransientKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        self.inner.head_object(bucket, key).await
    }

    async fn get_object_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> StoreResult<(ObjectStream, ObjectMetadata)> {
        self.streams.bump();
        self.inner.get_object_stream(bucket, key).await
    }
}

/// Source whose download never produces data.
#[derive(Clone)]
pub struct StalledSource {
    pub inner: InMemoryObjectStore,
}

#[async_trait]
impl SourceStore for StalledSource {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        self.inner.head_object(bucket, key).await
    }

    async fn get_object_stream(
        &self,
        _bucket: &str,
        _key: &str,
    ) -> StoreResult<(ObjectStream, ObjectMetadata)> {
        std::future::pending().await
    }
}

/// Destination that flips the first byte of every upload before storing it,
/// modelling corruption between hashing and persistence.
#[derive(Clone)]
pub struct CorruptingDestination {
    pub inner: InMemoryDestination,
    pub puts: Counter,
    pub deletes: Counter,
    refuse_delete: bool,
}

impl CorruptingDestination {
    pub fn new(inner: InMemoryDestination) -> Self {
        Self {
            inner,
            puts: Counter::default(),
            deletes: Counter::default(),
            refuse_delete: false,
        }
    }

    /// Also refuses every delete.
    pub fn undeletable(inner: InMemoryDestination) -> Self {
        Self {
            refuse_delete: true,
            ..Self::new(inner)
        }
    }
}

#[async_trait]
impl DestinationStore for CorruptingDestination {
    fn name(&self) -> &str {
        "corrupting"
    }

    async fn stat_object(&self, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        self.inner.stat_object(key).await
    }

    async fn put_object(
        &self,
        key: &str,
        body: &mut dyn UploadBody,
        _content_length: u64,
        content_type: &str,
    ) -> StoreResult<()> {
        self.puts.bump();
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        if let Some(first) = data.first_mut() {
            *first ^= 0xff;
        }
        self.inner
            .store()
            .insert(self.inner.bucket(), key, data, Some(content_type));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<bool> {
        self.deletes.bump();
        if self.refuse_delete {
            return Err(StoreError::Rejected("delete not permitted".to_string()));
        }
        self.inner.delete_object(key).await
    }
}

/// Destination that accepts uploads but never reports the object back.
pub struct VanishingDestination {
    pub puts: Counter,
}

impl VanishingDestination {
    pub fn new() -> Self {
        Self { puts: Counter::default() }
    }
}

#[async_trait]
impl DestinationStore for VanishingDestination {
    fn name(&self) -> &str {
        "vanishing"
    }

    async fn stat_object(&self, _key: &str) -> StoreResult<Option<ObjectMetadata>> {
        Ok(None)
    }

    async fn put_object(
        &self,
        _key: &str,
        body: &mut dyn UploadBody,
        _content_length: u64,
        _content_type: &str,
    ) -> StoreResult<()> {
        self.puts.bump();
        let mut sink = Vec::new();
        body.read_to_end(&mut sink).await?;
        Ok(())
    }

    async fn delete_object(&self, _key: &str) -> StoreResult<bool> {
        Ok(false)
    }
}

/// Destination whose metadata lookups are refused.
pub struct ForbiddenStatDestination {
    pub inner: InMemoryDestination,
}

#[async_trait]
impl DestinationStore for ForbiddenStatDestination {
    fn name(&self) -> &str {
        "forbidden-stat"
    }

    async fn stat_object(&self, _key: &str) -> StoreResult<Option<ObjectMetadata>> {
        Err(StoreError::Rejected("access denied".to_string()))
    }

    async fn put_object(
        &self,
        key: &str,
        body: &mut dyn UploadBody,
        content_length: u64,
        content_type: &str,
    ) -> StoreResult<()> {
        self.inner
            .put_object(key, body, content_length, content_type)
            .await
    }

    async fn delete_object(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete_object(key).await
    }
}

/// Destination whose uploads fail with the given error factory.
pub struct FailingPutDestination {
    pub inner: InMemoryDestination,
    pub puts: Counter,
    error: fn() -> StoreError,
}

impl FailingPutDestination {
    pub fn throttled(inner: InMemoryDestination) -> Self {
        Self {
            inner,
            puts: Counter::default(),
            error: || StoreError::transient(TransientKind::Throttled, "slow down"),
        }
    }

    pub fn forbidden(inner: InMemoryDestination) -> Self {
        Self {
            inner,
            puts: Counter::default(),
            error: || StoreError::Rejected("access denied".to_string()),
        }
    }
}

#[async_trait]
impl DestinationStore for FailingPutDestination {
    fn name(&self) -> &str {
        "failing-put"
    }

    async fn stat_object(&self, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        self.inner.stat_object(key).await
    }

    async fn put_object(
        &self,
        _key: &str,
        _body: &mut dyn UploadBody,
        _content_length: u64,
        _content_type: &str,
    ) -> StoreResult<()> {
        self.puts.bump();
        Err((self.error)())
    }

    async fn delete_object(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete_object(key).await
    }
}

/// Deterministic pseudo-random content.
pub fn content(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(2_654_435_761).wrapping_add(seed as u32) as u8)
        .collect()
}

/// In-memory sink for formatted log output.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route this thread's tracing output here until the guard drops.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("lock poisoned")).into_owned()
    }

    /// Lines logged at the given level, e.g. `"ERROR"`.
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.split_whitespace().any(|word| word == level))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("lock poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
