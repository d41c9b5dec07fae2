//! Error types for fittrack

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid meal ID: {0}")]
    InvalidMealId(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Meal not found: {0}")]
    MealNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

impl Error {
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}
