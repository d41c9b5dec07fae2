//! In-process storage backends

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::types::{DayRange, DaySummary, Meal, MealFilter, MealId, NutritionTotals, Workout};
use crate::{Error, Result};

use super::{MealStore, WorkoutStore};

/// Meals held in a map for the lifetime of the process
#[derive(Default)]
pub struct MemoryMealStore {
    meals: RwLock<HashMap<MealId, Meal>>,
}

impl MemoryMealStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.meals.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.meals.read().await.is_empty()
    }
}

#[async_trait]
impl MealStore for MemoryMealStore {
    async fn insert(&self, meal: &Meal) -> Result<()> {
        let mut meals = self.meals.write().await;
        if meals.contains_key(&meal.id) {
            return Err(Error::storage(format!("duplicate meal id {}", meal.id)));
        }
        meals.insert(meal.id, meal.clone());
        Ok(())
    }

    async fn list(&self, filter: &MealFilter) -> Result<Vec<Meal>> {
        let meals = self.meals.read().await;
        let mut matched: Vec<Meal> = meals
            .values()
            .filter(|meal| filter.matches(meal))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(matched)
    }

    async fn delete(&self, id: &MealId) -> Result<u64> {
        let removed = self.meals.write().await.remove(id);
        Ok(u64::from(removed.is_some()))
    }

    async fn summarize(&self, user_id: i64, range: &DayRange) -> Result<Vec<DaySummary>> {
        let meals = self.meals.read().await;
        let mut days: BTreeMap<_, NutritionTotals> = BTreeMap::new();
        for meal in meals
            .values()
            .filter(|meal| meal.user_id == user_id && range.contains(&meal.date))
        {
            days.entry(meal.date.date_naive()).or_default().add(meal);
        }

        Ok(days
            .into_iter()
            .map(|(date, totals)| DaySummary { date, totals })
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Workouts held in insertion order for the lifetime of the process
#[derive(Default)]
pub struct MemoryWorkoutStore {
    workouts: RwLock<Vec<Workout>>,
}

impl MemoryWorkoutStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkoutStore for MemoryWorkoutStore {
    async fn insert(&self, workout: &Workout) -> Result<()> {
        self.workouts.write().await.push(workout.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Workout>> {
        let workouts = self.workouts.read().await;
        let mut matched: Vec<Workout> = workouts
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(matched)
    }
}
