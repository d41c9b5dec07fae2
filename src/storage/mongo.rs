//! MongoDB storage backend

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};

use crate::types::{
    DayRange, DaySummary, Meal, MealFilter, MealId, NutritionTotals, Workout, WorkoutId,
};
use crate::{Error, Result};

use super::{MealStore, WorkoutStore};

const APP_NAME: &str = "fittrack";
const DAY_FORMAT: &str = "%Y-%m-%d";

/// Connect and verify the deployment is reachable.
///
/// Fails if no server can be selected within `server_selection_timeout`.
pub async fn connect(
    uri: &str,
    database: &str,
    server_selection_timeout: Duration,
    max_pool_size: u32,
) -> Result<Database> {
    let mut options = ClientOptions::parse(uri).await?;
    options.app_name = Some(APP_NAME.to_string());
    options.server_selection_timeout = Some(server_selection_timeout);
    options.max_pool_size = Some(max_pool_size);

    let hosts: Vec<String> = options.hosts.iter().map(|h| h.to_string()).collect();

    let client = Client::with_options(options)?;
    let db = client.database(database);
    db.run_command(doc! { "ping": 1 }).await?;

    tracing::info!(hosts = %hosts.join(","), database, "MongoDB connected");

    Ok(db)
}

fn to_bson_date(at: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(at.timestamp_millis())
}

fn from_bson_date(at: BsonDateTime, id: &ObjectId) -> Result<DateTime<Utc>> {
    let millis = at.timestamp_millis();
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
        Error::storage(format!(
            "document {} has out-of-range date {millis}",
            id.to_hex()
        ))
    })
}

fn date_range_query(range: &DayRange) -> Document {
    doc! {
        "$gte": to_bson_date(range.start),
        "$lt": to_bson_date(range.end),
    }
}

/// Meal as stored in the collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MealDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    user_id: i64,
    description: String,
    #[serde(default)]
    calories: f64,
    #[serde(default)]
    protein: f64,
    #[serde(default)]
    carbs: f64,
    #[serde(default)]
    fats: f64,
    date: BsonDateTime,
}

impl From<&Meal> for MealDocument {
    fn from(meal: &Meal) -> Self {
        Self {
            id: meal.id.object_id(),
            user_id: meal.user_id,
            description: meal.description.clone(),
            calories: meal.calories,
            protein: meal.protein,
            carbs: meal.carbs,
            fats: meal.fats,
            date: to_bson_date(meal.date),
        }
    }
}

impl TryFrom<MealDocument> for Meal {
    type Error = Error;

    fn try_from(document: MealDocument) -> Result<Self> {
        let date = from_bson_date(document.date, &document.id)?;

        Ok(Self {
            id: MealId::from(document.id),
            user_id: document.user_id,
            description: document.description,
            calories: document.calories,
            protein: document.protein,
            carbs: document.carbs,
            fats: document.fats,
            date,
        })
    }
}

/// One `$group` output row of the summary pipeline
#[derive(Debug, Deserialize)]
struct SummaryRow {
    #[serde(rename = "_id")]
    day: String,
    calories: f64,
    protein: f64,
    carbs: f64,
    fats: f64,
    meals: u64,
}

impl TryFrom<SummaryRow> for DaySummary {
    type Error = Error;

    fn try_from(row: SummaryRow) -> Result<Self> {
        let date = NaiveDate::parse_from_str(&row.day, DAY_FORMAT)
            .map_err(|e| Error::storage(format!("bad summary day '{}': {e}", row.day)))?;
        Ok(Self {
            date,
            totals: NutritionTotals {
                calories: row.calories,
                protein: row.protein,
                carbs: row.carbs,
                fats: row.fats,
                meals: row.meals,
            },
        })
    }
}

/// Meals stored in a MongoDB collection
pub struct MongoMealStore {
    collection: Collection<MealDocument>,
}

impl MongoMealStore {
    pub fn new(db: &Database, collection: &str) -> Self {
        Self {
            collection: db.collection(collection),
        }
    }

    fn query_for(filter: &MealFilter) -> Document {
        let mut query = doc! { "userId": filter.user_id };
        if let Some(range) = &filter.day {
            query.insert("date", date_range_query(range));
        }
        query
    }

    fn summary_pipeline(user_id: i64, range: &DayRange) -> Vec<Document> {
        vec![
            doc! { "$match": { "userId": user_id, "date": date_range_query(range) } },
            doc! {
                "$group": {
                    "_id": { "$dateToString": { "format": DAY_FORMAT, "date": "$date" } },
                    "calories": { "$sum": "$calories" },
                    "protein": { "$sum": "$protein" },
                    "carbs": { "$sum": "$carbs" },
                    "fats": { "$sum": "$fats" },
                    "meals": { "$sum": 1 },
                }
            },
            doc! { "$sort": { "_id": 1 } },
        ]
    }
}

#[async_trait]
impl MealStore for MongoMealStore {
    async fn insert(&self, meal: &Meal) -> Result<()> {
        self.collection.insert_one(MealDocument::from(meal)).await?;
        tracing::debug!(meal_id = %meal.id, user_id = meal.user_id, "Inserted meal");
        Ok(())
    }

    async fn list(&self, filter: &MealFilter) -> Result<Vec<Meal>> {
        let cursor = self
            .collection
            .find(Self::query_for(filter))
            .sort(doc! { "date": -1 })
            .await?;
        let documents: Vec<MealDocument> = cursor.try_collect().await?;

        tracing::debug!(
            user_id = filter.user_id,
            count = documents.len(),
            "Listed meals"
        );

        documents.into_iter().map(Meal::try_from).collect()
    }

    async fn delete(&self, id: &MealId) -> Result<u64> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id.object_id() })
            .await?;
        tracing::debug!(meal_id = %id, deleted = result.deleted_count, "Deleted meal");
        Ok(result.deleted_count)
    }

    async fn summarize(&self, user_id: i64, range: &DayRange) -> Result<Vec<DaySummary>> {
        let cursor = self
            .collection
            .aggregate(Self::summary_pipeline(user_id, range))
            .await?;
        let rows: Vec<Document> = cursor.try_collect().await?;

        tracing::debug!(user_id, days = rows.len(), "Summarized meals");

        rows.into_iter()
            .map(|row| {
                let row: SummaryRow = bson::from_document(row)
                    .map_err(|e| Error::storage(format!("bad summary row: {e}")))?;
                DaySummary::try_from(row)
            })
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        "mongo"
    }
}

/// Workout as stored in the collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkoutDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    user_id: i64,
    description: String,
    #[serde(default)]
    duration: u32,
    date: BsonDateTime,
}

impl From<&Workout> for WorkoutDocument {
    fn from(workout: &Workout) -> Self {
        Self {
            id: workout.id.object_id(),
            user_id: workout.user_id,
            description: workout.description.clone(),
            duration: workout.duration,
            date: to_bson_date(workout.date),
        }
    }
}

impl TryFrom<WorkoutDocument> for Workout {
    type Error = Error;

    fn try_from(document: WorkoutDocument) -> Result<Self> {
        let date = from_bson_date(document.date, &document.id)?;

        Ok(Self {
            id: WorkoutId::from(document.id),
            user_id: document.user_id,
            description: document.description,
            duration: document.duration,
            date,
        })
    }
}

/// Workouts stored in a MongoDB collection
pub struct MongoWorkoutStore {
    collection: Collection<WorkoutDocument>,
}

impl MongoWorkoutStore {
    pub fn new(db: &Database, collection: &str) -> Self {
        Self {
            collection: db.collection(collection),
        }
    }
}

#[async_trait]
impl WorkoutStore for MongoWorkoutStore {
    async fn insert(&self, workout: &Workout) -> Result<()> {
        self.collection
            .insert_one(WorkoutDocument::from(workout))
            .await?;
        tracing::debug!(workout_id = %workout.id, user_id = workout.user_id, "Inserted workout");
        Ok(())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Workout>> {
        let cursor = self
            .collection
            .find(doc! { "userId": user_id })
            .sort(doc! { "date": -1 })
            .await?;
        let documents: Vec<WorkoutDocument> = cursor.try_collect().await?;
        documents.into_iter().map(Workout::try_from).collect()
    }
}
