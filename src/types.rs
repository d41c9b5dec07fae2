//! Core types for fittrack

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize, Serializer};

use crate::{Error, Result};

/// Length of the textual form of a document store object identifier
pub const MEAL_ID_LEN: usize = 24;

const MAX_EMAIL_LEN: usize = 254;
const MAX_DOMAIN_LABEL_LEN: usize = 63;

/// Schema-level validation run on request bodies after deserialization
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Incoming user registration payload.
///
/// `password` is accepted but never leaves the process: the only outbound
/// representation is [`UserProfile`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub age: Option<u32>,
}

impl Validate for NewUser {
    fn validate(&self) -> Result<()> {
        if !is_valid_email(&self.email) {
            return Err(Error::validation(format!(
                "email: '{}' is not a valid email address",
                self.email
            )));
        }
        Ok(())
    }
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
}

impl From<NewUser> for UserProfile {
    fn from(user: NewUser) -> Self {
        Self {
            username: user.username,
            email: user.email,
            age: user.age,
        }
    }
}

/// Check an address against a practical subset of RFC 5322 `addr-spec`.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if domain.contains('@') {
        return false;
    }

    is_valid_local_part(local) && is_valid_domain(domain)
}

fn is_valid_local_part(local: &str) -> bool {
    if local.is_empty() || local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    local.chars().all(|c| {
        !c.is_whitespace()
            && !c.is_control()
            && !matches!(
                c,
                '(' | ')' | '<' | '>' | ',' | ';' | ':' | '\\' | '"' | '[' | ']'
            )
    })
}

fn is_valid_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= MAX_DOMAIN_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

macro_rules! object_id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(ObjectId);

        impl $name {
            /// Generate a fresh identifier
            pub fn new() -> Self {
                Self(ObjectId::new())
            }

            pub fn object_id(&self) -> ObjectId {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<ObjectId> for $name {
            fn from(oid: ObjectId) -> Self {
                Self(oid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0.to_hex())
            }
        }
    };
}

object_id_type! {
    /// Identifier of a stored meal: 24 hexadecimal characters.
    MealId
}

object_id_type! {
    /// Identifier of a stored workout
    WorkoutId
}

impl MealId {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != MEAL_ID_LEN || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidMealId(raw.to_string()));
        }

        ObjectId::parse_str(raw)
            .map(Self)
            .map_err(|_| Error::InvalidMealId(raw.to_string()))
    }
}

impl FromStr for MealId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Half-open UTC range `[start, end)` of whole calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayRange {
    /// `count` days starting at midnight of `first`.
    ///
    /// Fails when the range runs past the last representable date.
    pub fn days(first: NaiveDate, count: u32) -> Result<Self> {
        let midnight = |day: NaiveDate| day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());

        let start = midnight(first);
        let end = first
            .checked_add_days(Days::new(u64::from(count)))
            .and_then(midnight);

        match (start, end) {
            (Some(start), Some(end)) => Ok(Self { start, end }),
            _ => Err(Error::InvalidDate(first.to_string())),
        }
    }

    pub fn single(day: NaiveDate) -> Result<Self> {
        Self::days(day, 1)
    }

    /// The `count` days up to and including `last`
    pub fn ending_on(last: NaiveDate, count: u32) -> Result<Self> {
        let first = last
            .checked_sub_days(Days::new(u64::from(count.saturating_sub(1))))
            .ok_or_else(|| Error::InvalidDate(last.to_string()))?;
        Self::days(first, count)
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start && *at < self.end
    }
}

/// Incoming meal log payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeal {
    pub user_id: i64,
    pub description: String,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fats: f64,
}

impl Validate for NewMeal {
    fn validate(&self) -> Result<()> {
        validate_description(&self.description)?;

        for (field, value) in [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fats", self.fats),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::validation(format!(
                    "{field}: must be a non-negative number"
                )));
            }
        }

        Ok(())
    }
}

fn validate_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(Error::validation("description: must not be empty"));
    }
    Ok(())
}

/// A logged meal
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: MealId,
    pub user_id: i64,
    pub description: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
    pub date: DateTime<Utc>,
}

impl Meal {
    pub fn from_new(new: NewMeal, id: MealId, date: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            description: new.description.trim().to_string(),
            calories: new.calories,
            protein: new.protein,
            carbs: new.carbs,
            fats: new.fats,
            date,
        }
    }
}

/// Selection of meals for a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealFilter {
    pub user_id: i64,
    pub day: Option<DayRange>,
}

impl MealFilter {
    pub fn for_user(user_id: i64) -> Self {
        Self { user_id, day: None }
    }

    /// Restrict to meals logged on the given UTC day
    pub fn on(mut self, date: NaiveDate) -> Result<Self> {
        self.day = Some(DayRange::single(date)?);
        Ok(self)
    }

    pub fn matches(&self, meal: &Meal) -> bool {
        if meal.user_id != self.user_id {
            return false;
        }
        match &self.day {
            Some(range) => range.contains(&meal.date),
            None => true,
        }
    }
}

/// Summed macros over a set of meals
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct NutritionTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
    pub meals: u64,
}

impl NutritionTotals {
    pub fn add(&mut self, meal: &Meal) {
        self.calories += meal.calories;
        self.protein += meal.protein;
        self.carbs += meal.carbs;
        self.fats += meal.fats;
        self.meals += 1;
    }
}

impl std::ops::AddAssign for NutritionTotals {
    fn add_assign(&mut self, other: Self) {
        self.calories += other.calories;
        self.protein += other.protein;
        self.carbs += other.carbs;
        self.fats += other.fats;
        self.meals += other.meals;
    }
}

/// Totals for one UTC calendar day
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct DaySummary {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: NutritionTotals,
}

/// Incoming workout log payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkout {
    pub user_id: i64,
    pub description: String,
    /// Minutes
    #[serde(default)]
    pub duration: u32,
}

impl Validate for NewWorkout {
    fn validate(&self) -> Result<()> {
        validate_description(&self.description)
    }
}

/// A logged workout
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub id: WorkoutId,
    pub user_id: i64,
    pub description: String,
    pub duration: u32,
    pub date: DateTime<Utc>,
}

impl Workout {
    pub fn from_new(new: NewWorkout, id: WorkoutId, date: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            description: new.description.trim().to_string(),
            duration: new.duration,
            date,
        }
    }
}
