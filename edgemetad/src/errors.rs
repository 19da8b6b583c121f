use thiserror::Error;

#[derive(Error, Debug)]
#[error(transparent)]
pub struct AppError(Box<ErrorKind>);

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("edgemeta-core error: {0}")]
    Core(#[from] edgemeta_core::errors::MetaError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl<E> From<E> for AppError
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        AppError(Box::new(ErrorKind::from(err)))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
