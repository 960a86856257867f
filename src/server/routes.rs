use crate::errors::AgentError;
use crate::extract::ParameterSource;
use crate::report::{Histogram, DEFAULT_BINS};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use std::sync::Arc;
use tracing::Instrument;

#[derive(serde::Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub histogram: bool,
    pub bins: Option<usize>,
}

pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/api/query", axum::routing::post(post_query))
        .route("/api/config", axum::routing::get(get_config))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}

/// POST /api/query -- answer one free-text question
pub async fn post_query(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> (StatusCode, Json<serde_json::Value>) {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("query", %request_id);

    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::warn!(parent: &span, error = %rejection.body_text(), "bad request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": format!("Error: invalid request body: {}", rejection.body_text())
                })),
            );
        }
    };

    async move {
        tracing::info!(query = %req.query.trim(), "query received");
        let today = chrono::Local::now().date_naive();

        match state.pipeline().run(&req.query, today).await {
            Ok(eval) => {
                let histogram = req
                    .histogram
                    .then(|| Histogram::build(&eval.result, eval.spot_price, req.bins.unwrap_or(DEFAULT_BINS)));

                (
                    StatusCode::OK,
                    Json(serde_json::json!({
                        "report": eval.report(),
                        "symbol": eval.params.symbol,
                        "qualified_symbol": eval.qualified_symbol,
                        "strike": eval.params.strike,
                        "target_date": eval.params.target_date,
                        "spot_price": eval.spot_price,
                        "volatility": eval.sigma,
                        "days_to_target": eval.horizon.days,
                        "time_to_target": eval.horizon.years,
                        "prob_reach_or_exceed": eval.result.prob_reach_or_exceed(),
                        "prob_not_reach": eval.result.prob_not_reach(),
                        "analytic_prob_reach": eval.analytic_prob_reach,
                        "histogram": histogram,
                    })),
                )
            }
            Err(e) => {
                tracing::warn!(error = %e, "query failed");
                (status_for(&e), Json(serde_json::json!({ "error": e.user_message() })))
            }
        }
    }
    .instrument(span)
    .await
}

/// GET /api/config -- read-only simulation constants in effect
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "extractor": state.extractor.name(),
        "exchange_suffix": state.config.exchange_suffix,
        "risk_free_rate": state.config.simulation.risk_free_rate,
        "path_count": state.config.simulation.path_count,
        "seed": state.config.simulation.seed,
        "trading_days_per_year": crate::models::monte_carlo::TRADING_DAYS_PER_YEAR,
    }))
}

fn status_for(e: &AgentError) -> StatusCode {
    match e {
        AgentError::Unparseable
        | AgentError::MalformedResponse(_)
        | AgentError::InvalidHorizon { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AgentError::DataUnavailable(_) => StatusCode::NOT_FOUND,
        AgentError::Network(_) | AgentError::UpstreamApi { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::errors::CANNOT_UNDERSTAND;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> axum::Router {
        let state = AppState::from_config(test_config()).unwrap();
        router(Arc::new(state))
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/query")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_unparseable_query_returns_fixed_message() {
        let resp = app()
            .oneshot(post(serde_json::json!({ "query": "What's the chance AAPL goes up?" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(resp).await;
        assert_eq!(body["error"], CANNOT_UNDERSTAND);
    }

    #[tokio::test]
    async fn test_past_date_is_rejected() {
        let resp = app()
            .oneshot(post(serde_json::json!({ "query": "PETR4 to 45 by 2001-01-01" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(resp).await;
        let msg = body["error"].as_str().unwrap();
        assert!(msg.contains("future"), "message: {msg}");
    }

    #[tokio::test]
    async fn test_bad_body_returns_json_error() {
        let resp = app()
            .oneshot(post(serde_json::json!({ "question": "PETR4 to 45 by 2030-01-01" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        let msg = body["error"].as_str().unwrap();
        assert!(msg.starts_with("Error: invalid request body"), "message: {msg}");

        let not_json = Request::builder()
            .method("POST")
            .uri("/api/query")
            .header("content-type", "application/json")
            .body(Body::from("{query: oops"))
            .unwrap();
        let resp = app().oneshot(not_json).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_content_type_returns_json_error() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/query")
            .body(Body::from(r#"{"query":"PETR4 to 45 by 2030-01-01"}"#))
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_config_endpoint() {
        let resp = app()
            .oneshot(Request::builder().uri("/api/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["extractor"], "rules");
        assert_eq!(body["seed"], 42);
        assert_eq!(body["trading_days_per_year"], 252.0);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&AgentError::Unparseable), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(&AgentError::DataUnavailable("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&AgentError::Network("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&AgentError::Task("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
