use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use ferry_digest::{decode_base64_md5, parse_etag, DigestAccumulator};
use ferry_types::{validate_key, ContentDigest, DeclaredDigest, ObjectMetadata};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{DestinationStore, ObjectStream, SourceStore, UploadBody};

/// Directory under the store root holding per-object metadata sidecars.
const META_DIR: &str = ".ferry-meta";

const READ_BUF_SIZE: usize = 64 * 1024;

/// Modification time of an object file, to the nanosecond.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct FileStamp {
    secs: u64,
    nanos: u32,
}

impl FileStamp {
    fn of(meta: &Metadata) -> Option<Self> {
        let since_epoch = meta.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
        Some(Self {
            secs: since_epoch.as_secs(),
            nanos: since_epoch.subsec_nanos(),
        })
    }
}

/// Metadata persisted next to each object written through the store.
///
/// Only trusted while the object file still has the recorded length and
/// modification time.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    content_type: Option<String>,
    content_length: u64,
    modified: Option<FileStamp>,
    /// Digest in S3 ETag form: 32 hex digits, or `<hex>-<parts>` for multipart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    /// Digest in GCS form: base64 of the raw MD5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    md5_base64: Option<String>,
}

impl Sidecar {
    fn describes(&self, meta: &Metadata) -> bool {
        self.content_length == meta.len()
            && self.modified.is_some()
            && self.modified == FileStamp::of(meta)
    }
}

/// A digest as another storage service publishes it.
///
/// Used when importing objects so their native digest travels with them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativeDigest {
    /// S3-style ETag, possibly composite (`<hex>-<parts>`).
    Etag(String),
    /// GCS-style base64-encoded MD5.
    Base64Md5(String),
}

impl NativeDigest {
    fn parse(&self) -> StoreResult<DeclaredDigest> {
        Ok(match self {
            Self::Etag(etag) => parse_etag(etag)?,
            Self::Base64Md5(encoded) => DeclaredDigest::Plain(decode_base64_md5(encoded)?),
        })
    }
}

/// Local directory-backed object store.
///
/// Objects live at `<root>/<bucket>/<key>`. Content type and MD5 are kept in
/// JSON sidecars under `<root>/.ferry-meta/<bucket>/<key>.json`; objects
/// placed on disk by other means are hashed on demand.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    name: String,
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A [`DestinationStore`] view bound to one bucket of this store.
    pub fn destination(&self, bucket: impl Into<String>) -> FsDestination {
        let bucket = bucket.into();
        FsDestination {
            display: format!("{}/{}", self.name, bucket),
            store: self.clone(),
            bucket,
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        validate_bucket(bucket)?;
        validate_key(key).map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        Ok(self.root.join(bucket).join(key))
    }

    fn sidecar_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(META_DIR).join(bucket).join(format!("{key}.json"))
    }

    async fn read_sidecar(&self, bucket: &str, key: &str) -> Option<Sidecar> {
        let raw = fs::read(self.sidecar_path(bucket, key)).await.ok()?;
        match serde_json::from_slice(&raw) {
            Ok(sidecar) => Some(sidecar),
            Err(e) => {
                warn!(bucket, key, error = %e, "ignoring unreadable metadata sidecar");
                None
            }
        }
    }

    async fn stat(&self, bucket: &str, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        let path = self.object_path(bucket, key)?;
        let file_meta = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let sidecar = self
            .read_sidecar(bucket, key)
            .await
            .filter(|s| s.describes(&file_meta))
            .unwrap_or_default();
        let digest = match (&sidecar.etag, &sidecar.md5_base64) {
            (Some(etag), _) => NativeDigest::Etag(etag.clone()).parse()?,
            (None, Some(encoded)) => NativeDigest::Base64Md5(encoded.clone()).parse()?,
            (None, None) => {
                debug!(bucket, key, "no usable sidecar, hashing object");
                DeclaredDigest::Plain(hash_file(&path).await?)
            }
        };

        Ok(Some(ObjectMetadata {
            content_length: file_meta.len(),
            content_type: sidecar.content_type,
            digest: Some(digest),
        }))
    }

    /// Store an object together with the digest its home service declared
    /// for it, as when mirroring a bucket listing from S3 or GCS.
    ///
    /// The declared digest is reported by later metadata lookups as long as
    /// the file is left untouched. It is not checked against `data`.
    pub async fn import_object(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
        digest: NativeDigest,
    ) -> StoreResult<()> {
        digest.parse()?;
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;

        let (etag, md5_base64) = match digest {
            NativeDigest::Etag(etag) => (Some(etag), None),
            NativeDigest::Base64Md5(encoded) => (None, Some(encoded)),
        };
        let sidecar = Sidecar {
            content_type: content_type.map(str::to_string),
            etag,
            md5_base64,
            ..Sidecar::default()
        };
        self.write_sidecar(bucket, key, &path, sidecar).await
    }

    /// Stamp `sidecar` with the object's current length and modification
    /// time, then persist it.
    async fn write_sidecar(
        &self,
        bucket: &str,
        key: &str,
        object_path: &Path,
        mut sidecar: Sidecar,
    ) -> StoreResult<()> {
        let file_meta = fs::metadata(object_path).await?;
        sidecar.content_length = file_meta.len();
        sidecar.modified = FileStamp::of(&file_meta);

        let sidecar_path = self.sidecar_path(bucket, key);
        if let Some(dir) = sidecar_path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let raw = serde_json::to_vec(&sidecar).map_err(|e| StoreError::Io(e.into()))?;
        fs::write(&sidecar_path, raw).await?;
        Ok(())
    }

    async fn write(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn UploadBody,
        content_length: u64,
        content_type: &str,
    ) -> StoreResult<()> {
        let path = self.object_path(bucket, key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?
            .to_path_buf();
        fs::create_dir_all(&parent).await?;

        // Stage into a temp file beside the target so the final rename is atomic.
        let staged = tempfile::Builder::new()
            .prefix(".ferry-upload-")
            .tempfile_in(&parent)?;
        let (std_file, temp_path) = staged.into_parts();
        let mut file = fs::File::from_std(std_file);

        let mut acc = DigestAccumulator::new();
        let mut buf = vec![0u8; READ_BUF_SIZE];
        loop {
            let n = body.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            acc.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
        }
        file.sync_all().await?;
        drop(file);

        if acc.bytes_seen() != content_length {
            return Err(StoreError::Rejected(format!(
                "body length {} does not match declared length {content_length}",
                acc.bytes_seen()
            )));
        }

        temp_path.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        let sidecar = Sidecar {
            content_type: Some(content_type.to_string()),
            etag: Some(acc.finalize().to_hex()),
            ..Sidecar::default()
        };
        self.write_sidecar(bucket, key, &path, sidecar).await
    }

    async fn remove(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        let path = self.object_path(bucket, key)?;
        let existed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        match fs::remove_file(self.sidecar_path(bucket, key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(existed)
    }
}

fn validate_bucket(bucket: &str) -> StoreResult<()> {
    if bucket.is_empty() || bucket.starts_with('.') || bucket.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidKey(format!("invalid bucket name: {bucket:?}")));
    }
    Ok(())
}

async fn hash_file(path: &Path) -> StoreResult<ContentDigest> {
    let mut file = fs::File::open(path).await?;
    let mut acc = DigestAccumulator::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        acc.update(&buf[..n]);
    }
    Ok(acc.finalize())
}

#[async_trait]
impl SourceStore for FsObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        self.stat(bucket, key).await
    }

    async fn get_object_stream(
        &self,
        bucket: &str,
        key: &str,
    ) -> StoreResult<(ObjectStream, ObjectMetadata)> {
        let metadata = self
            .stat(bucket, key)
            .await?
            .ok_or_else(|| StoreError::not_found(bucket, key))?;
        let path = self.object_path(bucket, key)?;
        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::not_found(bucket, key))
            }
            Err(e) => return Err(e.into()),
        };
        Ok((Box::new(BufReader::new(file)), metadata))
    }
}

/// One bucket of an [`FsObjectStore`], usable as a replication target.
#[derive(Clone, Debug)]
pub struct FsDestination {
    display: String,
    store: FsObjectStore,
    bucket: String,
}

impl FsDestination {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl DestinationStore for FsDestination {
    fn name(&self) -> &str {
        &self.display
    }

    async fn stat_object(&self, key: &str) -> StoreResult<Option<ObjectMetadata>> {
        self.store.stat(&self.bucket, key).await
    }

    async fn put_object(
        &self,
        key: &str,
        body: &mut dyn UploadBody,
        content_length: u64,
        content_type: &str,
    ) -> StoreResult<()> {
        self.store
            .write(&self.bucket, key, body, content_length, content_type)
            .await
    }

    async fn delete_object(&self, key: &str) -> StoreResult<bool> {
        self.store.remove(&self.bucket, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_digest::md5_of;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FsObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new("local", dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn head_missing_is_none() {
        let (_dir, store) = setup();
        assert!(store.head_object("b", "missing.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn foreign_file_is_hashed() {
        let (dir, store) = setup();
        std::fs::create_dir_all(dir.path().join("src/docs")).unwrap();
        std::fs::write(dir.path().join("src/docs/a.txt"), b"Hello, World!").unwrap();

        let meta = store.head_object("src", "docs/a.txt").await.unwrap().unwrap();
        assert_eq!(meta.content_length, 13);
        assert!(meta.content_type.is_none());
        assert_eq!(
            meta.digest.unwrap().as_plain().unwrap(),
            &md5_of(b"Hello, World!")
        );
    }

    #[tokio::test]
    async fn put_writes_object_and_sidecar() {
        let (dir, store) = setup();
        let dest = store.destination("dst");
        let mut body = Cursor::new(b"payload".to_vec());
        dest.put_object("nested/k.bin", &mut body, 7, "image/png").await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("dst/nested/k.bin")).unwrap(), b"payload");
        let meta = dest.stat_object("nested/k.bin").await.unwrap().unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("image/png"));
        assert_eq!(meta.digest.unwrap().as_plain().unwrap(), &md5_of(b"payload"));
    }

    #[tokio::test]
    async fn stream_reads_content() {
        let (_dir, store) = setup();
        let dest = store.destination("b");
        let mut body = Cursor::new(vec![3u8; 200_000]);
        dest.put_object("big", &mut body, 200_000, "x/y").await.unwrap();

        let (mut stream, meta) = store.get_object_stream("b", "big").await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), 200_000);
        assert_eq!(meta.content_length, 200_000);
    }

    #[tokio::test]
    async fn stream_missing_is_not_found() {
        let (_dir, store) = setup();
        let err = store.get_object_stream("b", "nope").await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_removes_object_and_sidecar() {
        let (dir, store) = setup();
        let dest = store.destination("b");
        let mut body = Cursor::new(b"x".to_vec());
        dest.put_object("k", &mut body, 1, "x/y").await.unwrap();

        assert!(dest.delete_object("k").await.unwrap());
        assert!(!dir.path().join("b/k").exists());
        assert!(!dir.path().join(".ferry-meta/b/k.json").exists());
        assert!(!dest.delete_object("k").await.unwrap());
    }

    #[tokio::test]
    async fn length_mismatch_leaves_no_object() {
        let (dir, store) = setup();
        let dest = store.destination("b");
        let mut body = Cursor::new(b"abc".to_vec());
        let err = dest.put_object("k", &mut body, 99, "x/y").await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(!dir.path().join("b/k").exists());
    }

    #[tokio::test]
    async fn traversal_keys_rejected() {
        let (_dir, store) = setup();
        let err = store.head_object("b", "../escape").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        let err = store.head_object(".ferry-meta", "k").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn stale_sidecar_is_ignored() {
        let (dir, store) = setup();
        let dest = store.destination("b");
        let mut body = Cursor::new(b"old".to_vec());
        dest.put_object("k", &mut body, 3, "text/plain").await.unwrap();
        std::fs::write(dir.path().join("b/k"), b"newer content").unwrap();

        let meta = store.head_object("b", "k").await.unwrap().unwrap();
        assert_eq!(meta.digest.unwrap().as_plain().unwrap(), &md5_of(b"newer content"));
    }

    fn set_mtime(path: &Path, secs: u64) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(UNIX_EPOCH + std::time::Duration::from_secs(secs)).unwrap();
    }

    #[tokio::test]
    async fn same_length_rewrite_invalidates_sidecar() {
        let (dir, store) = setup();
        let dest = store.destination("b");
        let mut body = Cursor::new(b"aaaa".to_vec());
        dest.put_object("k", &mut body, 4, "text/plain").await.unwrap();

        let path = dir.path().join("b/k");
        std::fs::write(&path, b"bbbb").unwrap();
        // Rewrites can land inside the same timestamp tick; pin a distinct one.
        set_mtime(&path, 1_000_000);

        let meta = store.head_object("b", "k").await.unwrap().unwrap();
        assert_eq!(meta.content_length, 4);
        assert_eq!(meta.digest.unwrap().as_plain().unwrap(), &md5_of(b"bbbb"));
    }

    #[tokio::test]
    async fn sidecar_records_length_and_mtime() {
        let (dir, store) = setup();
        let dest = store.destination("b");
        let mut body = Cursor::new(b"abc".to_vec());
        dest.put_object("k", &mut body, 3, "text/plain").await.unwrap();

        let raw = std::fs::read(dir.path().join(".ferry-meta/b/k.json")).unwrap();
        let sidecar: Sidecar = serde_json::from_slice(&raw).unwrap();
        let file_meta = std::fs::metadata(dir.path().join("b/k")).unwrap();
        assert!(sidecar.describes(&file_meta));
        assert_eq!(sidecar.etag.as_deref(), Some(md5_of(b"abc").to_hex().as_str()));
    }

    #[tokio::test]
    async fn imported_multipart_etag_is_composite() {
        let (_dir, store) = setup();
        let etag = "9b2cf535f27731c974343645a3985328-3";
        store
            .import_object("b", "big.iso", b"parts", None, NativeDigest::Etag(etag.into()))
            .await
            .unwrap();

        let meta = store.head_object("b", "big.iso").await.unwrap().unwrap();
        assert_eq!(
            meta.digest,
            Some(DeclaredDigest::Composite { etag: etag.to_string(), parts: 3 })
        );
    }

    #[tokio::test]
    async fn imported_plain_etag_is_plain() {
        let (_dir, store) = setup();
        let etag = format!("\"{}\"", md5_of(b"hello").to_hex());
        store
            .import_object("b", "k", b"hello", Some("text/plain"), NativeDigest::Etag(etag))
            .await
            .unwrap();

        let meta = store.head_object("b", "k").await.unwrap().unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert_eq!(meta.digest.unwrap().as_plain().unwrap(), &md5_of(b"hello"));
    }

    #[tokio::test]
    async fn imported_base64_md5_is_decoded() {
        let (_dir, store) = setup();
        // GCS md5Hash for "hello".
        let encoded = "XUFAKrxLKna5cZ2REBfFkg==".to_string();
        store
            .import_object("b", "k", b"hello", None, NativeDigest::Base64Md5(encoded))
            .await
            .unwrap();

        let meta = store.head_object("b", "k").await.unwrap().unwrap();
        assert_eq!(meta.digest.unwrap().as_plain().unwrap(), &md5_of(b"hello"));
    }

    #[tokio::test]
    async fn malformed_native_digest_rejected_on_import() {
        let (dir, store) = setup();
        let err = store
            .import_object("b", "k", b"x", None, NativeDigest::Etag("not-hex".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidDigest(_)));
        assert!(!dir.path().join("b/k").exists());
    }

    #[tokio::test]
    async fn rewritten_import_falls_back_to_hashing() {
        let (dir, store) = setup();
        let etag = "9b2cf535f27731c974343645a3985328-2".to_string();
        store
            .import_object("b", "k", b"one", None, NativeDigest::Etag(etag))
            .await
            .unwrap();
        let path = dir.path().join("b/k");
        std::fs::write(&path, b"two").unwrap();
        set_mtime(&path, 42);

        let meta = store.head_object("b", "k").await.unwrap().unwrap();
        assert_eq!(meta.digest.unwrap().as_plain().unwrap(), &md5_of(b"two"));
    }
}
