use std::io;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("internal: {0}.")]
    Internal(#[from] InternalError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    User(#[from] UserError),
    #[error("command {index} of the sequence failed: {source}")]
    Sequence { index: usize, source: Box<Error> },
}

#[derive(Error, Debug)]
pub enum UserError {
    #[error("invalid value `{value}` for context `{context}`")]
    InvalidValue { context: String, value: String },
    #[error("context `{0}` does not exist")]
    ContextNotFound(String),
    #[error("document `{0}` already exists")]
    DocumentExists(String),
    #[error("document `{0}` does not exist")]
    DocumentMissing(String),
    #[error("context `{0}` already exists")]
    ContextExists(String),
    #[error("document mentions unknown context `{0}`")]
    UnresolvedDocumentContext(String),
    #[error("unknown context kind `{0}`")]
    UnknownContextKind(String),
    #[error("operation `{0}` is not available")]
    CapabilityUnavailable(&'static str),
}

#[derive(Error, Debug)]
pub enum InternalError {
    #[error("the query was cancelled")]
    QueryCancelled,
    #[error("context `{0}` is present in the schema but not in the index")]
    ContextOutOfSync(String),
    #[error(transparent)]
    Bincode(#[from] bincode::Error),
}

impl From<bincode::Error> for Error {
    fn from(error: bincode::Error) -> Error {
        Error::Internal(InternalError::Bincode(error))
    }
}

impl Error {
    /// The numeric code of the failure envelope. User-facing failures map
    /// onto the reserved codes 400, 404, 409, 410 and 501; everything else
    /// is reported as 500.
    pub fn code(&self) -> u16 {
        match self {
            Error::User(e) => e.code(),
            Error::Sequence { source, .. } => source.code(),
            Error::Internal(_) | Error::Io(_) => 500,
        }
    }
}

impl UserError {
    pub fn code(&self) -> u16 {
        use UserError::*;

        match self {
            InvalidValue { .. } => 400,
            ContextNotFound(_) => 404,
            DocumentExists(_) | DocumentMissing(_) | ContextExists(_) => 409,
            UnresolvedDocumentContext(_) => 409,
            UnknownContextKind(_) => 410,
            CapabilityUnavailable(_) => 501,
        }
    }
}

/// The `(code, message)` envelope handed to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandError {
    pub code: u16,
    pub message: String,
}

impl From<&Error> for CommandError {
    fn from(error: &Error) -> CommandError {
        CommandError { code: error.code(), message: error.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_codes() {
        let exists = UserError::DocumentExists("id://1".into());
        assert_eq!(exists.code(), 409);
        assert_eq!(UserError::ContextNotFound("subject".into()).code(), 404);
        assert_eq!(UserError::UnknownContextKind("geo".into()).code(), 410);

        let invalid =
            UserError::InvalidValue { context: "date".into(), value: "tomorrow".into() };
        assert_eq!(invalid.code(), 400);
    }

    #[test]
    fn sequence_errors_keep_the_inner_code() {
        let inner = Error::User(UserError::ContextNotFound("subject".into()));
        let error = Error::Sequence { index: 2, source: Box::new(inner) };
        assert_eq!(error.code(), 404);

        let envelope = CommandError::from(&error);
        assert_eq!(envelope.code, 404);
        assert!(envelope.message.contains("command 2"));
    }
}
