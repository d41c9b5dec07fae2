//! Storage abstraction layer
//!
//! Provides a unified interface over the MongoDB collections and an
//! in-process store used for local development and tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::types::{DayRange, DaySummary, Meal, MealFilter, MealId, Workout};
use crate::Result;

pub mod memory;
pub mod mongo;

/// Meal storage trait
#[async_trait]
pub trait MealStore: Send + Sync {
    /// Persist a new meal
    async fn insert(&self, meal: &Meal) -> Result<()>;

    /// List meals matching the filter, newest first
    async fn list(&self, filter: &MealFilter) -> Result<Vec<Meal>>;

    /// Delete a meal by identifier, returning the number of records removed
    async fn delete(&self, id: &MealId) -> Result<u64>;

    /// Per-day nutrition totals for a user's meals within `range`.
    ///
    /// Days without meals are omitted; rows are ordered by date ascending.
    async fn summarize(&self, user_id: i64, range: &DayRange) -> Result<Vec<DaySummary>>;

    /// Short backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Workout storage trait
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    async fn insert(&self, workout: &Workout) -> Result<()>;

    /// A user's workouts, newest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Workout>>;
}

/// Handles to every collection the API serves
#[derive(Clone)]
pub struct Stores {
    pub meals: Arc<dyn MealStore>,
    pub workouts: Arc<dyn WorkoutStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            meals: Arc::new(memory::MemoryMealStore::new()),
            workouts: Arc::new(memory::MemoryWorkoutStore::new()),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Mongo {
        uri: String,
        database: String,
        meal_collection: String,
        workout_collection: String,
        server_selection_timeout: Duration,
        max_pool_size: u32,
    },
    Memory,
}

/// Create storage backends from config
pub async fn create_store(config: StorageConfig) -> Result<Stores> {
    match config {
        StorageConfig::Mongo {
            uri,
            database,
            meal_collection,
            workout_collection,
            server_selection_timeout,
            max_pool_size,
        } => {
            let db =
                mongo::connect(&uri, &database, server_selection_timeout, max_pool_size).await?;
            tracing::info!(
                meals = %meal_collection,
                workouts = %workout_collection,
                "Using MongoDB collections"
            );
            Ok(Stores {
                meals: Arc::new(mongo::MongoMealStore::new(&db, &meal_collection)),
                workouts: Arc::new(mongo::MongoWorkoutStore::new(&db, &workout_collection)),
            })
        }
        StorageConfig::Memory => Ok(Stores::in_memory()),
    }
}
