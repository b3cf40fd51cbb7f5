//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

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
use crate::tracking::TRACK_PATH;

pub mod http;
pub mod ws;

/// API routes without the static fallback.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // Course content
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/chapters", get(http::http_chapters))
        .route("/api/v1/navigation", get(http::http_navigation))
        .route("/api/v1/challenge-sets", get(http::http_list_sets))
        .route("/api/v1/challenge-sets/:slug", get(http::http_get_set))
        // Runs
        .route("/api/v1/runs", post(http::http_create_run))
        .route("/api/v1/runs/:id", get(http::http_get_run).delete(http::http_delete_run))
        .route("/api/v1/runs/:id/start", post(http::http_start_run))
        .route("/api/v1/runs/:id/select", post(http::http_select))
        .route("/api/v1/runs/:id/submit", post(http::http_submit))
        .route("/api/v1/runs/:id/restart", post(http::http_restart))
        // Matching boards
        .route("/api/v1/boards/:slug", get(http::http_get_board))
        .route("/api/v1/boards/:slug/check", post(http::http_check_board))
        // Calculators
        .route("/api/v1/calc/z-score", get(http::http_calc_z))
        .route("/api/v1/calc/interval", get(http::http_calc_interval))
        .route("/api/v1/calc/transform", get(http::http_calc_transform))
        .route("/api/v1/calc/empirical", get(http::http_calc_empirical))
        // Tracking
        .route("/api/v1/track/navigate", post(http::http_track_navigate))
        .route("/api/v1/track/interaction", post(http::http_track_interaction))
        .route("/api/v1/track/login", post(http::http_track_login))
        .route(TRACK_PATH, post(http::http_student_track))
        .with_state(state)
}

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Static front-end from `static_dir` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>, static_dir: &str) -> Router {
    let static_service = ServeDir::new(static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(format!("{static_dir}/index.html")));

    api_router(state)
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
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::state::tests::test_state;

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn app() -> Router {
        let (state, _) = test_state(Duration::from_millis(4000));
        api_router(Arc::new(state))
    }

    #[tokio::test]
    async fn health_and_catalog() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (_, chapters) = call(&app, "GET", "/api/v1/chapters", None).await;
        assert_eq!(chapters.as_array().unwrap().len(), 13);

        let (_, nav) = call(&app, "GET", "/api/v1/navigation?path=/chapters/5/normal-plots", None).await;
        assert_eq!(nav["previousTopic"], "/chapters/5/empirical-rule");
        assert_eq!(nav["nextTopic"], "/chapters/5");
    }

    #[tokio::test]
    async fn challenge_sets_hide_answers() {
        let app = app();
        let (status, body) = call(&app, "GET", "/api/v1/challenge-sets/z-score-game", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 6);
        assert_eq!(body["feedback_delay_ms"], 4000);
        assert!(body["challenges"][0].get("correct_choice").is_none());
        assert!(body["challenges"][0].get("explanation").is_none());

        let (status, body) = call(&app, "GET", "/api/v1/challenge-sets/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn run_lifecycle_over_http() {
        let app = app();
        let (status, run) = call(&app, "POST", "/api/v1/runs", Some(json!({ "slug": "z-score-game" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(run["state"]["phase"], "idle");
        let id = run["run_id"].as_str().unwrap().to_string();

        let (_, run) = call(&app, "POST", &format!("/api/v1/runs/{id}/start"), None).await;
        assert_eq!(run["state"]["phase"], "presenting");
        assert_eq!(run["challenge"]["id"], 1);

        // Nothing selected yet: submit is a no-op.
        let (status, run) = call(&app, "POST", &format!("/api/v1/runs/{id}/submit"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(run["state"]["phase"], "presenting");
        assert!(run["feedback"].is_null());

        let (status, _) =
            call(&app, "POST", &format!("/api/v1/runs/{id}/select"), Some(json!({ "choice": "Z = +9" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        call(&app, "POST", &format!("/api/v1/runs/{id}/select"), Some(json!({ "choice": "z = +2.0" }))).await;
        let (_, run) = call(&app, "POST", &format!("/api/v1/runs/{id}/submit"), None).await;
        assert_eq!(run["state"]["phase"], "feedback");
        assert_eq!(run["feedback"]["correct"], true);
        assert_eq!(run["feedback"]["celebrate"], true);
        assert_eq!(run["state"]["score"], 1);

        // Grading twice is rejected while feedback is showing.
        let (status, body) = call(&app, "POST", &format!("/api/v1/runs/{id}/submit"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("feedback"));
        let (_, run) = call(&app, "GET", &format!("/api/v1/runs/{id}"), None).await;
        assert_eq!(run["state"]["phase"], "feedback");
        assert_eq!(run["state"]["score"], 1);

        let (status, _) = call(&app, "POST", &format!("/api/v1/runs/{id}/start"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, run) = call(&app, "POST", &format!("/api/v1/runs/{id}/restart"), None).await;
        assert_eq!(run["state"]["phase"], "idle");
        assert_eq!(run["state"]["score"], 0);

        let (status, _) = call(&app, "DELETE", &format!("/api/v1/runs/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "GET", &format!("/api/v1/runs/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn board_check_grades_each_target() {
        let app = app();
        let (_, board) = call(&app, "GET", "/api/v1/boards/association-types", None).await;
        assert_eq!(board["spec"]["targets"].as_array().unwrap().len(), 9);
        assert!(board["spec"]["targets"][0].get("expected").is_none());

        let body = json!({ "placements": [
            { "label": "Mosaic", "target": "cc-visual" },
            { "label": "Scatterplot", "target": "cc-test" },
        ]});
        let (status, out) = call(&app, "POST", "/api/v1/boards/association-types/check", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(out["state"]["feedback"]["cc-visual"], "correct");
        assert_eq!(out["state"]["feedback"]["cc-test"], "incorrect");

        let body = json!({ "placements": [{ "label": "Mosaic", "target": "nope" }] });
        let (status, _) = call(&app, "POST", "/api/v1/boards/association-types/check", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn calculators() {
        let app = app();
        let (_, z) = call(&app, "GET", "/api/v1/calc/z-score?x=115&mean=100&sd=15", None).await;
        assert_eq!(z["display"], "1.00");
        let (_, z) = call(&app, "GET", "/api/v1/calc/z-score?x=&mean=100&sd=0", None).await;
        assert_eq!(z["display"], "-");
        let (status, _) = call(&app, "GET", "/api/v1/calc/transform?preset=cube", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, e) = call(&app, "GET", "/api/v1/calc/empirical?mean=100&sd=15", None).await;
        assert_eq!(e["bands"][2]["upper"], 145.0);
    }

    #[tokio::test]
    async fn tracking_routes() {
        let (state, sink) = test_state(Duration::from_millis(4000));
        let app = api_router(Arc::new(state));

        let body = json!({ "netId": "ab123", "sessionId": "session_1_x", "path": "/chapters/2" });
        let (_, out) = call(&app, "POST", "/api/v1/track/navigate", Some(body)).await;
        assert_eq!(out["emitted"], true);
        let events = sink.taken();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].page_title, "Univariate Displays");

        let (_, out) = call(&app, "POST", "/api/v1/track/navigate", Some(json!({ "path": "/chapters/2" }))).await;
        assert_eq!(out["emitted"], false);

        let (status, _) =
            call(&app, "POST", "/api/v1/track/login", Some(json!({ "netId": " ", "path": "/" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let ev = json!({ "netId": "ab123", "pagePath": "/chapters/2", "pageTitle": "x", "action": "page_view" });
        let (_, ack) = call(&app, "POST", TRACK_PATH, Some(ev)).await;
        assert_eq!(ack["success"], true);
        assert!(sink.taken().is_empty());
    }
}
