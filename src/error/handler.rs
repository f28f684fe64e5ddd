//! Errors surfaced while answering a single DNS request.

use crate::error::ResolveError;

#[derive(Debug)]
pub enum HandlerError {
    /// The request carried no question; nothing to answer.
    NoQuestion,
    /// The resolver could not produce an answer from any upstream.
    Resolve(ResolveError),
    /// Writing the response to the client failed.
    Io(std::io::Error),
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerError::NoQuestion => write!(f, "request carried no question"),
            HandlerError::Resolve(e) => write!(f, "{}", e),
            HandlerError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<ResolveError> for HandlerError {
    fn from(err: ResolveError) -> Self {
        HandlerError::Resolve(err)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::Io(err)
    }
}
