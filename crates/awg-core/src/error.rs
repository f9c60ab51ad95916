use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("preload buffer is full")]
    Overfull,
    #[error("out of memory growing frame buffer")]
    OutOfMemory,
}
