//! API handlers

use axum::{
    extract::{rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::extract::ValidatedJson;
use crate::api::AppState;
use crate::nutrition::{self, AnalyzeMealRequest, NutritionEstimate};
use crate::types::{
    DayRange, DaySummary, Meal, MealFilter, MealId, NewMeal, NewUser, NewWorkout,
    NutritionTotals, UserProfile, Workout, WorkoutId,
};
use crate::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Days covered by the weekly summary, including the last one
const WEEK_DAYS: u32 = 7;

/// Liveness check
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse { api: "Running" })
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    #[serde(rename = "API")]
    pub api: &'static str,
}

/// Validate a user payload and echo it back without the password
pub async fn create_user(
    ValidatedJson(payload): ValidatedJson<NewUser>,
) -> Json<CreateUserResponse> {
    tracing::debug!(username = %payload.username, "Accepted user payload");
    Json(CreateUserResponse {
        user: UserProfile::from(payload),
    })
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user: UserProfile,
}

fn parse_user_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".to_string()))
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ApiError::from(Error::InvalidDate(raw.to_string())))
}

/// Log a meal
pub async fn create_meal(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<NewMeal>,
) -> Result<(StatusCode, Json<MealResponse>), ApiError> {
    // Stored dates only keep millisecond precision
    let meal = Meal::from_new(payload, MealId::new(), Utc::now().trunc_subsecs(3));
    state.meals.insert(&meal).await?;

    tracing::info!(meal_id = %meal.id, user_id = meal.user_id, "Meal logged");

    let today = DayRange::single(meal.date.date_naive())?;
    let daily_totals = state
        .meals
        .summarize(meal.user_id, &today)
        .await?
        .first()
        .map(|day| day.totals)
        .unwrap_or_default();

    Ok((
        StatusCode::CREATED,
        Json(MealResponse { meal, daily_totals }),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealResponse {
    pub meal: Meal,
    /// The user's totals for the day the meal was logged, this meal included
    pub daily_totals: NutritionTotals,
}

/// List a user's meals, newest first
pub async fn list_meals(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<DateParams>, QueryRejection>,
) -> Result<Json<Vec<Meal>>, ApiError> {
    let Path(raw_user_id) = path?;
    let Query(params) = query?;

    let mut filter = MealFilter::for_user(parse_user_id(&raw_user_id)?);
    if let Some(raw_date) = params.date.as_deref() {
        filter = filter.on(parse_date(raw_date)?)?;
    }

    let meals = state.meals.list(&filter).await?;
    Ok(Json(meals))
}

/// Optional `?date=YYYY-MM-DD` query
#[derive(Debug, Deserialize)]
pub struct DateParams {
    pub date: Option<String>,
}

impl DateParams {
    /// The requested day, or today in UTC
    fn day_or_today(&self) -> Result<NaiveDate, ApiError> {
        match self.date.as_deref() {
            Some(raw) => parse_date(raw),
            None => Ok(Utc::now().date_naive()),
        }
    }
}

/// Nutrition totals for one day of a user's meals
pub async fn daily_summary(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<DateParams>, QueryRejection>,
) -> Result<Json<DaySummary>, ApiError> {
    let Path(raw_user_id) = path?;
    let Query(params) = query?;

    let user_id = parse_user_id(&raw_user_id)?;
    let date = params.day_or_today()?;
    let range = DayRange::single(date)?;

    let totals = state
        .meals
        .summarize(user_id, &range)
        .await?
        .first()
        .map(|day| day.totals)
        .unwrap_or_default();

    Ok(Json(DaySummary { date, totals }))
}

/// Per-day totals for the week ending on `?date=` (default today)
pub async fn weekly_summary(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<DateParams>, QueryRejection>,
) -> Result<Json<WeeklySummaryResponse>, ApiError> {
    let Path(raw_user_id) = path?;
    let Query(params) = query?;

    let user_id = parse_user_id(&raw_user_id)?;
    let end = params.day_or_today()?;
    let range = DayRange::ending_on(end, WEEK_DAYS)?;

    let days = state.meals.summarize(user_id, &range).await?;
    let mut totals = NutritionTotals::default();
    for day in &days {
        totals += day.totals;
    }

    Ok(Json(WeeklySummaryResponse {
        start: range.start.date_naive(),
        end,
        totals,
        days,
    }))
}

#[derive(Debug, Serialize)]
pub struct WeeklySummaryResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub totals: NutritionTotals,
    /// Days with at least one meal, oldest first
    pub days: Vec<DaySummary>,
}

/// Delete a meal by identifier
pub async fn delete_meal(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<DeleteMealResponse>, ApiError> {
    let Path(raw_id) = path.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Undecodable meal ID");
        ApiError::from(Error::InvalidMealId(rejection.body_text()))
    })?;

    // Malformed identifiers never reach the store
    let meal_id = MealId::parse(&raw_id)?;

    let deleted = state.meals.delete(&meal_id).await?;
    if deleted == 0 {
        return Err(Error::MealNotFound(meal_id.to_string()).into());
    }

    tracing::info!(%meal_id, "Meal deleted");

    Ok(Json(DeleteMealResponse {
        success: true,
        message: "Meal deleted successfully",
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteMealResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Log a workout
pub async fn create_workout(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<NewWorkout>,
) -> Result<(StatusCode, Json<WorkoutResponse>), ApiError> {
    let workout = Workout::from_new(payload, WorkoutId::new(), Utc::now().trunc_subsecs(3));
    state.workouts.insert(&workout).await?;

    tracing::info!(workout_id = %workout.id, user_id = workout.user_id, "Workout logged");

    Ok((StatusCode::CREATED, Json(WorkoutResponse { workout })))
}

#[derive(Debug, Serialize)]
pub struct WorkoutResponse {
    pub workout: Workout,
}

/// List a user's workouts, newest first
pub async fn list_workouts(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<Workout>>, ApiError> {
    let Path(raw_user_id) = path?;
    let workouts = state
        .workouts
        .list_for_user(parse_user_id(&raw_user_id)?)
        .await?;
    Ok(Json(workouts))
}

/// Estimate nutrition for a meal description
pub async fn analyze_meal(
    ValidatedJson(payload): ValidatedJson<AnalyzeMealRequest>,
) -> Json<NutritionEstimate> {
    Json(nutrition::estimate(&payload.description))
}
