//! Nutrition estimation for free-text meal descriptions
//!
//! Estimates come from a small table of known foods; anything else gets a
//! generic fallback with lower confidence.

use serde::{Deserialize, Serialize};

use crate::types::Validate;
use crate::{Error, Result};

const KNOWN_CONFIDENCE: f64 = 0.9;
const FALLBACK_CONFIDENCE: f64 = 0.6;

/// Macro-nutrient breakdown of a serving
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
}

const FALLBACK: Macros = Macros {
    calories: 300.0,
    protein: 15.0,
    carbs: 30.0,
    fats: 10.0,
};

const KNOWN_FOODS: &[(&str, Macros)] = &[
    (
        "bowl of rice",
        Macros {
            calories: 200.0,
            protein: 4.0,
            carbs: 45.0,
            fats: 0.5,
        },
    ),
    (
        "chicken breast",
        Macros {
            calories: 165.0,
            protein: 31.0,
            carbs: 0.0,
            fats: 3.6,
        },
    ),
];

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeMealRequest {
    pub description: String,
}

impl Validate for AnalyzeMealRequest {
    fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::validation("description: must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NutritionEstimate {
    pub name: String,
    #[serde(flatten)]
    pub macros: Macros,
    pub confidence: f64,
}

pub fn lookup(description: &str) -> Option<Macros> {
    let key = description.trim().to_lowercase();
    KNOWN_FOODS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, macros)| *macros)
}

pub fn estimate(description: &str) -> NutritionEstimate {
    let (macros, confidence) = match lookup(description) {
        Some(macros) => (macros, KNOWN_CONFIDENCE),
        None => (FALLBACK, FALLBACK_CONFIDENCE),
    };

    NutritionEstimate {
        name: description.to_string(),
        macros,
        confidence,
    }
}
