//! Errors raised while building or parsing data-model values.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid credit identifier: {0:?}")]
    InvalidCreditId(String),

    #[error("unknown registry source: {0}")]
    UnknownSource(String),

    #[error("quality {0} is outside 0..=100")]
    QualityOutOfRange(u32),
}
