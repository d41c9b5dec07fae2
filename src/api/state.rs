//! API server state

use std::sync::Arc;

use crate::storage::{MealStore, Stores, WorkoutStore};

/// API server state
#[derive(Clone)]
pub struct AppState {
    /// Meal store shared by all requests
    pub meals: Arc<dyn MealStore>,
    pub workouts: Arc<dyn WorkoutStore>,
}

impl AppState {
    pub fn new(meals: Arc<dyn MealStore>, workouts: Arc<dyn WorkoutStore>) -> Self {
        Self { meals, workouts }
    }
}

impl From<Stores> for AppState {
    fn from(stores: Stores) -> Self {
        Self::new(stores.meals, stores.workouts)
    }
}
