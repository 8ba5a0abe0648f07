/// Errors from digest parsing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("malformed etag {0:?}")]
    MalformedEtag(String),

    #[error("invalid base64 digest: {0}")]
    InvalidBase64(String),

    #[error("invalid digest: {0}")]
    Invalid(#[from] ferry_types::TypeError),
}
