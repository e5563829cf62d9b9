//! The closed error taxonomy shared by every layer of the engine.
//!
//! Validation errors (`NotFound`, `DuplicateKey`, `InvalidRecord`,
//! `InvalidSchema`, `ImmutablePrimaryKey`, `AlreadyExists`) are user-visible
//! and returned from the operation that raised them. `IoFailure` and
//! `Corruption` are fatal to the current operation: callers decide whether
//! to close and retry opening the table. Nothing in this crate retries
//! automatically.

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(u32),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("primary key is immutable")]
    ImmutablePrimaryKey,

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("io failure: {0}")]
    IoFailure(#[from] io::Error),

    #[error("corruption: {0}")]
    Corruption(String),
}

impl Error {
    /// Fatal errors leave the in-memory tree state unreliable; the caller
    /// should close the table without flushing rather than keep operating.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::IoFailure(_) | Error::Corruption(_))
    }
}
