//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - Static SPA from the configured directory with index fallback
/// - CORS (allow any origin/method/headers), adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new(&state.static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(format!("{}/index.html", state.static_dir)));

    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Catalogs
        .route("/api/v1/challenges", get(http::http_list_challenges))
        .route("/api/v1/challenges/:id", get(http::http_get_challenge))
        .route("/api/v1/leaderboard", get(http::http_leaderboard))
        .route("/api/v1/badges", get(http::http_list_badges))
        .route("/api/v1/badges/:id", get(http::http_get_badge))
        .route("/api/v1/badges/category/:category", get(http::http_badges_by_category))
        // Eco challenges
        .route("/api/v1/users/:user/challenges", get(http::http_user_challenges))
        .route("/api/v1/users/:user/challenges/:id/join", post(http::http_join_challenge))
        .route("/api/v1/users/:user/challenges/:id/complete", post(http::http_complete_challenge_day))
        // Fun challenges
        .route(
            "/api/v1/users/:user/fun-challenges",
            get(http::http_user_fun_challenges).delete(http::http_reset_fun_challenges),
        )
        .route("/api/v1/users/:user/fun-challenges/stats", get(http::http_fun_challenge_stats))
        .route("/api/v1/users/:user/fun-challenges/:id/complete", post(http::http_complete_fun_challenge))
        // Quizzes
        .route(
            "/api/v1/users/:user/quiz-attempts",
            get(http::http_quiz_history).post(http::http_submit_quiz),
        )
        // Ledger & badges
        .route("/api/v1/users/:user/points", get(http::http_user_points))
        .route("/api/v1/users/:user/badges", get(http::http_user_badges))
        .route("/api/v1/users/:user/badges/progress", get(http::http_badge_progress))
        .route("/api/v1/users/:user/badges/evaluate", post(http::http_evaluate_badges))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::util::testing::FixedClock;

    fn app() -> Router {
        let clock = Arc::new(FixedClock::at(2024, 4, 22, 9));
        build_router(Arc::new(AppState::from_config(AppConfig::default(), clock)))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(v) => builder
                .header("content-type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[tokio::test]
    async fn health() {
        let (status, body) = send(&app(), "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn join_then_complete_day_once() {
        let app = app();
        let uri = "/api/v1/users/u1/challenges/plastic-free-week";

        let (status, body) = send(&app, "POST", &format!("{uri}/join"), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "active");
        let (status, _) = send(&app, "POST", &format!("{uri}/join"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&app, "POST", &format!("{uri}/complete"), Some(json!({ "impact": { "plasticSaved": 0.5 } }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["pointsAwarded"], 21);
        assert_eq!(body["data"]["ledger"]["totalPoints"], 21);

        let (status, body) = send(&app, "POST", &format!("{uri}/complete"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (_, body) = send(&app, "GET", "/api/v1/users/u1/points", None).await;
        assert_eq!(body["data"]["totalPoints"], 21);
        assert_eq!(body["data"]["stats"]["totalImpact"]["plasticSaved"], 0.5);
    }

    #[tokio::test]
    async fn unknown_and_unjoined_challenges() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/v1/users/u1/challenges/nope/complete", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);

        let (status, _) = send(&app, "POST", "/api/v1/users/u1/challenges/climate-education/complete", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/api/v1/challenges/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn quiz_submission_and_history() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/users/u1/quiz-attempts",
            Some(json!({ "subject": "Oceans", "difficulty": "advanced", "scorePercentage": 95, "timeTaken": 2.5, "totalQuestions": 10 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["points"]["total"], 85);
        assert!(!body["data"]["newBadges"].as_array().unwrap().is_empty());

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/users/u1/quiz-attempts",
            Some(json!({ "subject": "Oceans", "difficulty": "advanced", "scorePercentage": 150 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, "GET", "/api/v1/users/u1/quiz-attempts?limit=5", None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (_, body) = send(&app, "GET", "/api/v1/leaderboard", None).await;
        assert_eq!(body["data"][0]["userId"], "u1");
    }

    #[tokio::test]
    async fn fun_challenge_complete_and_reset() {
        let app = app();
        let uri = "/api/v1/users/u1/fun-challenges";
        let body = json!({ "title": "Pick up litter", "category": "Waste Reduction" });

        let (status, _) = send(&app, "POST", &format!("{uri}/litter/complete"), Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "POST", &format!("{uri}/litter/complete"), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, stats) = send(&app, "GET", &format!("{uri}/stats"), None).await;
        assert_eq!(stats["data"]["totalPoints"], 50);

        let (status, body) = send(&app, "DELETE", uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["removedChallenges"], 1);
        assert_eq!(body["data"]["ledger"]["totalPoints"], 0);
    }

    #[tokio::test]
    async fn badge_catalog_filters() {
        let app = app();
        let (status, body) = send(&app, "GET", "/api/v1/badges/category/streak", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (status, _) = send(&app, "GET", "/api/v1/badges/category/bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "GET", "/api/v1/badges/week-warrior", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["requirement"]["kind"], "streak");
        let (status, _) = send(&app, "GET", "/api/v1/badges/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "POST", "/api/v1/users/u2/badges/evaluate", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }
}
