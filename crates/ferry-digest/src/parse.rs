use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ferry_types::{ContentDigest, DeclaredDigest, DigestAlgorithm};

use crate::error::DigestError;

/// Parse an S3-style ETag.
///
/// Surrounding quotes are stripped. An ETag of the form `<hex>-<parts>` is a
/// multipart (composite) digest; anything else must be a 32-char MD5 hex.
pub fn parse_etag(etag: &str) -> Result<DeclaredDigest, DigestError> {
    let trimmed = etag.trim().trim_matches('"');
    if let Some((hash, parts)) = trimmed.split_once('-') {
        let parts: u32 = parts
            .parse()
            .map_err(|_| DigestError::MalformedEtag(etag.to_string()))?;
        if hash.is_empty() || parts == 0 {
            return Err(DigestError::MalformedEtag(etag.to_string()));
        }
        return Ok(DeclaredDigest::Composite {
            etag: trimmed.to_string(),
            parts,
        });
    }
    let digest = ContentDigest::from_hex(DigestAlgorithm::Md5, &trimmed.to_ascii_lowercase())?;
    Ok(DeclaredDigest::Plain(digest))
}

/// Decode a base64-encoded MD5 (GCS `md5Hash` style).
pub fn decode_base64_md5(encoded: &str) -> Result<ContentDigest, DigestError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| DigestError::InvalidBase64(e.to_string()))?;
    Ok(ContentDigest::new(DigestAlgorithm::Md5, bytes)?)
}
