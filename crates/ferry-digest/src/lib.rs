//! Content digests for ferry.
//!
//! Provides the streaming whole-object hasher used during transfer, and the
//! parsers that normalize what each store declares (hex ETags, base64 MD5)
//! into a common [`ContentDigest`](ferry_types::ContentDigest).
//!
//! All hashing wraps established libraries; there is no custom cryptography.

pub mod accumulator;
pub mod error;
pub mod parse;

pub use accumulator::{md5_of, DigestAccumulator};
pub use error::DigestError;
pub use parse::{decode_base64_md5, parse_etag};
