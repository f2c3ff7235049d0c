use thiserror::Error;

use crate::ids::RecordId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
    #[error("record not found: {0}")]
    NotFound(RecordId),
}
