use crate::report::parse_report;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};

use super::AppState;

/// POST /report: validate first, mutate only on success
pub(super) async fn handle_report(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    match parse_report(&body) {
        Ok(report) => {
            let stats = state.tracker.report(report);
            (StatusCode::OK, Json(serde_json::json!({ "ok": true, "stats": stats })))
        }
        Err(e) => {
            tracing::warn!(error = %e, "report rejected");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    }
}

/// GET /stats
pub(super) async fn handle_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tracker.stats())
}

/// GET /heartbeat. Polling this is what expires a silent detector
pub(super) async fn handle_heartbeat(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "alive": state.tracker.is_alive() }))
}

/// POST /reset
pub(super) async fn handle_reset(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.tracker.reset();
    Json(serde_json::json!({ "reset": true, "session_id": stats.session_id }))
}

/// GET /test
pub(super) async fn handle_test() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "Hello, World!" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SessionConfig;
    use crate::session::SessionTracker;
    use std::sync::Arc;

    fn make_state() -> (AppState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let tracker = SessionTracker::with_clock(
            &SessionConfig {
                penalty_rate_per_second: 0.1,
                max_accrual_gap_seconds: 5.0,
                heartbeat_timeout_seconds: 10.0,
            },
            clock.clone(),
        );
        (AppState::new(tracker), clock)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn report_updates_stats() {
        let (state, _clock) = make_state();
        for t in [1_001.0, 1_002.0, 1_004.0] {
            let body = Bytes::from(format!(r#"{{"is_active": true, "timestamp": {t}}}"#));
            let response = handle_report(State(state.clone()), body).await.into_response();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let json = body_json(handle_stats(State(state)).await.into_response()).await;
        assert_eq!(json["doom_seconds_today"], 3.0);
        assert_eq!(json["is_doomscrolling"], true);
        assert_eq!(json["last_doomscrolled_at"], 1_001.0);
        let owed = json["owed_usd"].as_f64().unwrap();
        assert!((owed - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn malformed_report_has_no_side_effect() {
        let (state, _clock) = make_state();
        let response = handle_report(State(state.clone()), Bytes::from_static(br#"{"timestamp": 5}"#))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("is_active"));

        let stats = state.tracker.stats();
        assert_eq!(stats.reports_received, 0);
        assert!(!state.tracker.is_alive());
    }

    #[tokio::test]
    async fn heartbeat_expires_when_polled_late() {
        let (state, clock) = make_state();
        let body = Bytes::from_static(br#"{"is_active": false, "timestamp": 1000.5}"#);
        handle_report(State(state.clone()), body).await;

        let json = body_json(handle_heartbeat(State(state.clone())).await.into_response()).await;
        assert_eq!(json["alive"], true);

        clock.advance(11.0);
        let json = body_json(handle_heartbeat(State(state)).await.into_response()).await;
        assert_eq!(json["alive"], false);
    }

    #[tokio::test]
    async fn reset_clears_session() {
        let (state, _clock) = make_state();
        for t in [1_001.0, 1_002.0] {
            let body = Bytes::from(format!(r#"{{"is_active": true, "timestamp": {t}}}"#));
            handle_report(State(state.clone()), body).await;
        }

        let json = body_json(handle_reset(State(state.clone())).await.into_response()).await;
        assert_eq!(json["reset"], true);

        let json = body_json(handle_stats(State(state)).await.into_response()).await;
        assert_eq!(json["doom_seconds_today"], 0.0);
        assert_eq!(json["owed_usd"], 0.0);
        assert_eq!(json["last_doomscrolled_at"], serde_json::Value::Null);
        assert_eq!(json["penalty_rate_per_second"], 0.1);
    }

    #[tokio::test]
    async fn smoke_test_route() {
        let json = body_json(handle_test().await.into_response()).await;
        assert_eq!(json["message"], "Hello, World!");
    }
}
