//! fittrack - backend API for a fitness tracking app
//!
//! Provides:
//! - A liveness endpoint
//! - User payload validation
//! - Meal logging, listing and deletion backed by MongoDB
//! - Daily and weekly nutrition summaries
//! - Workout logging
//! - Mock nutrition analysis for meal descriptions

pub mod api;
pub mod config;
pub mod error;
pub mod nutrition;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
