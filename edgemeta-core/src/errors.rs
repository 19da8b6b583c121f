use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
#[error(transparent)]
pub struct MetaError(Box<ErrorKind>);

#[derive(Error, Debug)]
#[error(transparent)]
pub enum ErrorKind {
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Store(String),
    #[error("bus error: {0}")]
    Bus(String),
    #[error("remote query timed out after {0:?}")]
    Timeout(Duration),
    #[error("not connected to cloud")]
    NotConnected,
    #[error("unsupported operation/source combination: {0}")]
    Unsupported(String),
    #[error("malformed resource path: {0}")]
    MalformedResource(String),
}

impl<E> From<E> for MetaError
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        MetaError(Box::new(ErrorKind::from(err)))
    }
}

impl MetaError {
    pub fn store(message: impl Into<String>) -> Self {
        MetaError(Box::new(ErrorKind::Store(message.into())))
    }

    pub fn bus(message: impl Into<String>) -> Self {
        MetaError(Box::new(ErrorKind::Bus(message.into())))
    }

    pub fn timeout(after: Duration) -> Self {
        MetaError(Box::new(ErrorKind::Timeout(after)))
    }

    pub fn not_connected() -> Self {
        MetaError(Box::new(ErrorKind::NotConnected))
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        MetaError(Box::new(ErrorKind::Unsupported(message.into())))
    }

    pub fn malformed_resource(resource: impl Into<String>) -> Self {
        MetaError(Box::new(ErrorKind::MalformedResource(resource.into())))
    }

    pub fn is_not_connected(&self) -> bool {
        matches!(*self.0, ErrorKind::NotConnected)
    }
}
