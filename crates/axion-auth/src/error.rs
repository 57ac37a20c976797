/// Failure to mint a token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no active signing key configured")]
    MissingSigningKey,

    #[error("no refresh token secret configured")]
    MissingRefreshSecret,

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Why a token did not verify. Returned as a value, never logged as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("token is malformed")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("token signature matches no configured key")]
    BadSignature,

    #[error("no verification key configured")]
    NoKey,
}

impl From<jsonwebtoken::errors::Error> for VerifyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => VerifyError::Expired,
            ErrorKind::InvalidSignature => VerifyError::BadSignature,
            _ => VerifyError::Malformed,
        }
    }
}
