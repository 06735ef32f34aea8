pub type CertResult<T> = Result<T, CertError>;

/// Errors surfaced by the rendering engine and the batch driver.
///
/// `Resource` and `Precondition` are fatal for a whole batch. `Composition` is
/// scoped to one recipient and is recorded in the manifest by the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum CertError {
    #[error("resource error: {0}")]
    Resource(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("composition error: {0}")]
    Composition(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CertError {
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Whether this error must stop the whole batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Resource(_) | Self::Precondition(_))
    }
}

/// A signer's image could not be decoded.
///
/// Recovered inside the signature renderer, which draws a placeholder line instead.
#[derive(thiserror::Error, Debug)]
#[error("signature image for '{signer}' could not be decoded: {reason}")]
pub struct SignatureDecodeError {
    pub signer: String,
    pub reason: String,
}
