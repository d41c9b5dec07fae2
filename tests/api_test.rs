//! End-to-end tests for the HTTP API
//!
//! The router is driven in-process over the in-memory stores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use fittrack::api::create_default_router;
use fittrack::storage::memory::{MemoryMealStore, MemoryWorkoutStore};
use fittrack::storage::{MealStore, Stores};
use fittrack::types::{DayRange, DaySummary, Meal, MealFilter, MealId};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

/// Wraps a store and counts every call that reaches it
#[derive(Default)]
struct RecordingStore {
    inner: MemoryMealStore,
    calls: AtomicUsize,
}

impl RecordingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MealStore for RecordingStore {
    async fn insert(&self, meal: &Meal) -> fittrack::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(meal).await
    }

    async fn list(&self, filter: &MealFilter) -> fittrack::Result<Vec<Meal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list(filter).await
    }

    async fn delete(&self, id: &MealId) -> fittrack::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(id).await
    }

    async fn summarize(
        &self,
        user_id: i64,
        range: &DayRange,
    ) -> fittrack::Result<Vec<DaySummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.summarize(user_id, range).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Store whose every operation fails
struct BrokenStore;

#[async_trait]
impl MealStore for BrokenStore {
    async fn insert(&self, _meal: &Meal) -> fittrack::Result<()> {
        Err(fittrack::Error::storage("connection refused"))
    }

    async fn list(&self, _filter: &MealFilter) -> fittrack::Result<Vec<Meal>> {
        Err(fittrack::Error::storage("connection refused"))
    }

    async fn delete(&self, _id: &MealId) -> fittrack::Result<u64> {
        Err(fittrack::Error::storage("connection refused"))
    }

    async fn summarize(
        &self,
        _user_id: i64,
        _range: &DayRange,
    ) -> fittrack::Result<Vec<DaySummary>> {
        Err(fittrack::Error::storage("connection refused"))
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }
}

fn app_with_recorder() -> (Router, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::default());
    let router = create_default_router(Stores {
        meals: store.clone(),
        workouts: Arc::new(MemoryWorkoutStore::new()),
    });
    (router, store)
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!(
                "non-JSON body: status={} body={}",
                status,
                String::from_utf8_lossy(&bytes)
            )
        })
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn root_reports_running() {
    let (app, _) = app_with_recorder();
    let (status, body) = send(&app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"API": "Running"}));
}

#[tokio::test]
async fn create_user_echoes_without_password() {
    let (app, store) = app_with_recorder();
    let (status, body) = send(
        &app,
        post_json(
            "/api/users",
            json!({"username": "a", "email": "a@b.com", "password": "x", "age": 30}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"user": {"username": "a", "email": "a@b.com", "age": 30}})
    );
    assert!(!body.to_string().contains("password"));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn create_user_rejects_schema_violations() {
    let (app, _) = app_with_recorder();

    let payloads = [
        json!({"username": "a", "email": "not-an-email", "password": "x"}),
        json!({"email": "a@b.com", "password": "x"}),
        json!({"username": "a", "password": "x"}),
        json!({"username": "a", "email": "a@b.com"}),
        json!({"username": "a", "email": "a@b.com", "password": "x", "age": "thirty"}),
        json!({"username": "a", "email": "a@b.com", "password": "x", "age": -3}),
    ];

    for payload in payloads {
        let (status, body) = send(&app, post_json("/api/users", payload.clone())).await;
        assert_eq!(
            status,
            StatusCode::UNPROCESSABLE_ENTITY,
            "payload {payload} should be rejected"
        );
        assert!(body["detail"].is_string());
        assert!(!body.to_string().contains("\"password\""));
    }
}

#[tokio::test]
async fn create_user_requires_json_content_type() {
    let (app, _) = app_with_recorder();
    let request = Request::builder()
        .method("POST")
        .uri("/api/users")
        .body(Body::from(r#"{"username":"a","email":"a@b.com","password":"x"}"#))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn delete_missing_meal_is_not_found() {
    let (app, store) = app_with_recorder();
    let (status, body) = send(&app, delete("/api/meals/507f1f77bcf86cd799439011")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Meal not found"}));
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn delete_with_malformed_id_never_touches_store() {
    let (app, store) = app_with_recorder();

    for bad in [
        "123",
        "507f1f77bcf86cd79943901",
        "507f1f77bcf86cd7994390111",
        "zzzzzzzzzzzzzzzzzzzzzzzz",
        "507f1f77bcf86cd79943901%20",
        "%FF",
    ] {
        let (status, body) = send(&app, delete(&format!("/api/meals/{bad}"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "id {bad}");
        assert_eq!(body, json!({"detail": "Invalid meal ID"}));
    }

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn meal_lifecycle() {
    let (app, store) = app_with_recorder();

    let (status, body) = send(
        &app,
        post_json(
            "/api/meals",
            json!({"userId": 1, "description": "  chicken breast ", "calories": 165, "protein": 31}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let meal = &body["meal"];
    assert_eq!(meal["userId"], 1);
    assert_eq!(meal["description"], "chicken breast");
    assert_eq!(meal["calories"], 165.0);
    assert_eq!(meal["carbs"], 0.0);
    let meal_id = meal["id"].as_str().unwrap().to_string();
    assert_eq!(meal_id.len(), 24);

    let (status, body) = send(&app, get("/api/meals/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], meal_id.as_str());

    let (status, body) = send(&app, delete(&format!("/api/meals/{meal_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"success": true, "message": "Meal deleted successfully"})
    );
    assert!(store.inner.is_empty().await);

    // Same end state, different status on the second call
    let (status, body) = send(&app, delete(&format!("/api/meals/{meal_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Meal not found"}));
}

#[tokio::test]
async fn delete_removes_only_the_matching_meal() {
    let (app, _) = app_with_recorder();

    let mut ids = Vec::new();
    for description in ["oats", "salad", "soup"] {
        let (_, body) = send(
            &app,
            post_json("/api/meals", json!({"userId": 5, "description": description})),
        )
        .await;
        ids.push(body["meal"]["id"].as_str().unwrap().to_string());
    }

    let (status, _) = send(&app, delete(&format!("/api/meals/{}", ids[1]))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/api/meals/5")).await;
    let remaining: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(&ids[0].as_str()));
    assert!(remaining.contains(&ids[2].as_str()));
}

#[tokio::test]
async fn create_meal_rejects_invalid_payloads() {
    let (app, store) = app_with_recorder();

    for payload in [
        json!({"description": "oats"}),
        json!({"userId": 1}),
        json!({"userId": 1, "description": "   "}),
        json!({"userId": 1, "description": "oats", "calories": -10}),
    ] {
        let (status, _) = send(&app, post_json("/api/meals", payload.clone())).await;
        assert_eq!(
            status,
            StatusCode::UNPROCESSABLE_ENTITY,
            "payload {payload} should be rejected"
        );
    }

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn list_meals_filters_by_date_and_user() {
    let (app, _) = app_with_recorder();

    send(
        &app,
        post_json("/api/meals", json!({"userId": 9, "description": "eggs"})),
    )
    .await;
    send(
        &app,
        post_json("/api/meals", json!({"userId": 10, "description": "toast"})),
    )
    .await;

    let (status, body) = send(&app, get("/api/meals/9")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(&app, get("/api/meals/9?date=1999-01-01")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(&app, get("/api/meals/11")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn list_meals_rejects_bad_parameters() {
    let (app, store) = app_with_recorder();

    let (status, body) = send(&app, get("/api/meals/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"detail": "Invalid user ID"}));

    let (status, body) = send(&app, get("/api/meals/1?date=31-01-2024")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"detail": "Invalid date, expected YYYY-MM-DD"}));

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn list_meals_rejects_the_last_representable_date() {
    let (app, store) = app_with_recorder();
    send(
        &app,
        post_json("/api/meals", json!({"userId": 1, "description": "eggs"})),
    )
    .await;
    let calls_after_insert = store.calls();

    // The day after +262142-12-31 cannot be represented
    let (status, body) = send(&app, get("/api/meals/1?date=%2B262142-12-31")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"detail": "Invalid date, expected YYYY-MM-DD"}));
    assert_eq!(store.calls(), calls_after_insert);

    let (status, body) = send(&app, get("/api/meals/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn create_meal_reports_daily_totals() {
    let (app, _) = app_with_recorder();

    let (status, body) = send(
        &app,
        post_json(
            "/api/meals",
            json!({"userId": 4, "description": "chicken breast", "calories": 165, "protein": 31}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body["dailyTotals"],
        json!({"calories": 165.0, "protein": 31.0, "carbs": 0.0, "fats": 0.0, "meals": 1})
    );

    // Other users' meals stay out of the totals
    send(
        &app,
        post_json(
            "/api/meals",
            json!({"userId": 99, "description": "cake", "calories": 500}),
        ),
    )
    .await;

    let (_, body) = send(
        &app,
        post_json(
            "/api/meals",
            json!({"userId": 4, "description": "rice", "calories": 200, "carbs": 45}),
        ),
    )
    .await;
    assert_eq!(body["dailyTotals"]["calories"], 365.0);
    assert_eq!(body["dailyTotals"]["carbs"], 45.0);
    assert_eq!(body["dailyTotals"]["meals"], 2);
}

#[tokio::test]
async fn daily_summary_totals_one_day() {
    let (app, _) = app_with_recorder();
    for (description, calories) in [("oats", 150), ("salad", 250)] {
        send(
            &app,
            post_json(
                "/api/meals",
                json!({"userId": 7, "description": description, "calories": calories, "fats": 2.5}),
            ),
        )
        .await;
    }

    let (status, body) = send(&app, get("/api/meals/7/summary")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "date": today(),
            "calories": 400.0,
            "protein": 0.0,
            "carbs": 0.0,
            "fats": 5.0,
            "meals": 2,
        })
    );

    let (status, body) = send(&app, get("/api/meals/7/summary?date=1999-01-01")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "1999-01-01");
    assert_eq!(body["calories"], 0.0);
    assert_eq!(body["meals"], 0);
}

#[tokio::test]
async fn weekly_summary_lists_days_with_meals() {
    let (app, _) = app_with_recorder();
    send(
        &app,
        post_json(
            "/api/meals",
            json!({"userId": 8, "description": "soup", "calories": 120, "protein": 6}),
        ),
    )
    .await;

    let (status, body) = send(&app, get("/api/meals/8/summary/weekly")).await;
    assert_eq!(status, StatusCode::OK);
    let end = chrono::Utc::now().date_naive();
    let start = end - chrono::Days::new(6);
    assert_eq!(body["start"], start.to_string());
    assert_eq!(body["end"], end.to_string());
    assert_eq!(body["totals"]["calories"], 120.0);
    assert_eq!(body["totals"]["meals"], 1);
    assert_eq!(body["days"].as_array().unwrap().len(), 1);
    assert_eq!(body["days"][0]["date"], end.to_string());
    assert_eq!(body["days"][0]["protein"], 6.0);

    let (status, body) = send(&app, get("/api/meals/8/summary/weekly?date=1999-01-07")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start"], "1999-01-01");
    assert_eq!(body["days"], json!([]));
    assert_eq!(body["totals"]["meals"], 0);
}

#[tokio::test]
async fn summaries_reject_bad_parameters() {
    let (app, store) = app_with_recorder();

    for uri in ["/api/meals/abc/summary", "/api/meals/abc/summary/weekly"] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body, json!({"detail": "Invalid user ID"}));
    }

    for uri in [
        "/api/meals/1/summary?date=yesterday",
        "/api/meals/1/summary?date=%2B262142-12-31",
        "/api/meals/1/summary/weekly?date=%2B262142-12-31",
    ] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body, json!({"detail": "Invalid date, expected YYYY-MM-DD"}));
    }

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn workout_lifecycle() {
    let (app, _) = app_with_recorder();

    let (status, body) = send(
        &app,
        post_json(
            "/api/workouts",
            json!({"userId": 3, "description": " 5k run ", "duration": 30}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let workout = &body["workout"];
    assert_eq!(workout["userId"], 3);
    assert_eq!(workout["description"], "5k run");
    assert_eq!(workout["duration"], 30);
    assert_eq!(workout["id"].as_str().unwrap().len(), 24);

    let (status, body) = send(
        &app,
        post_json("/api/workouts", json!({"userId": 3, "description": "yoga"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["workout"]["duration"], 0);

    send(
        &app,
        post_json("/api/workouts", json!({"userId": 4, "description": "swim"})),
    )
    .await;

    let (status, body) = send(&app, get("/api/workouts/3")).await;
    assert_eq!(status, StatusCode::OK);
    let mut descriptions: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["description"].as_str().unwrap())
        .collect();
    descriptions.sort_unstable();
    assert_eq!(descriptions, ["5k run", "yoga"]);

    let (status, body) = send(&app, get("/api/workouts/5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn workouts_reject_bad_input() {
    let (app, _) = app_with_recorder();

    for payload in [
        json!({"description": "run"}),
        json!({"userId": 3}),
        json!({"userId": 3, "description": ""}),
        json!({"userId": 3, "description": "run", "duration": -5}),
    ] {
        let (status, _) = send(&app, post_json("/api/workouts", payload.clone())).await;
        assert_eq!(
            status,
            StatusCode::UNPROCESSABLE_ENTITY,
            "payload {payload} should be rejected"
        );
    }

    let (status, body) = send(&app, get("/api/workouts/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"detail": "Invalid user ID"}));
}

#[tokio::test]
async fn analyze_meal_uses_known_foods() {
    let (app, _) = app_with_recorder();

    let (status, body) = send(
        &app,
        post_json("/api/analyze-meal", json!({"description": "Bowl of Rice"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Bowl of Rice");
    assert_eq!(body["calories"], 200.0);
    assert_eq!(body["confidence"], 0.9);

    let (status, body) = send(
        &app,
        post_json("/api/analyze-meal", json!({"description": "lasagna"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["calories"], 300.0);
    assert_eq!(body["confidence"], 0.6);

    let (status, _) = send(
        &app,
        post_json("/api/analyze-meal", json!({"description": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn store_failures_surface_as_server_errors() {
    let app = create_default_router(Stores {
        meals: Arc::new(BrokenStore),
        workouts: Arc::new(MemoryWorkoutStore::new()),
    });

    let (status, body) = send(&app, delete("/api/meals/507f1f77bcf86cd799439011")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"detail": "Internal server error"}));

    let (status, _) = send(&app, get("/api/meals/1")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = send(&app, get("/api/meals/1/summary")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = send(
        &app,
        post_json("/api/meals", json!({"userId": 1, "description": "eggs"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn cors_preflight_allows_any_origin_by_default() {
    let (app, _) = app_with_recorder();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/users")
        .header("origin", "http://localhost:19006")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}
