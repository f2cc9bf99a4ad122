use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Key is empty or would escape the store root.
    #[error("invalid blob key: {0:?}")]
    InvalidKey(String),
}
