//! Logging configuration routes.
//!
//! Read and replace the active log filter directive at runtime.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::logging::LoggingHandle;

/// Request to update the log filter.
#[derive(Debug, Deserialize)]
pub struct UpdateLogFilterRequest {
    pub filter: String,
}

/// Response for logging configuration.
#[derive(Debug, Serialize)]
pub struct LoggingConfigResponse {
    pub filter: String,
    pub log_dir: String,
}

/// Create the logging router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_logging_config).put(update_logging_config))
}

fn logging_handle(state: &AppState) -> ApiResult<&Arc<LoggingHandle>> {
    state
        .logging
        .as_ref()
        .ok_or_else(|| ApiError::internal("Logging configuration not available"))
}

fn config_response(logging: &LoggingHandle) -> LoggingConfigResponse {
    LoggingConfigResponse {
        filter: logging.get_filter(),
        log_dir: logging.log_dir().display().to_string(),
    }
}

async fn get_logging_config(
    State(state): State<AppState>,
) -> ApiResult<Json<LoggingConfigResponse>> {
    let logging = logging_handle(&state)?;
    Ok(Json(config_response(logging)))
}

async fn update_logging_config(
    State(state): State<AppState>,
    Json(request): Json<UpdateLogFilterRequest>,
) -> ApiResult<Json<LoggingConfigResponse>> {
    let logging = logging_handle(&state)?;

    logging
        .set_filter(&request.filter)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(Json(config_response(logging)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes::create_router;
    use crate::domain::{MediaType, PlanPolicy};
    use crate::events::EventBroadcaster;
    use crate::logging::LoggingSettings;
    use crate::session::testing::{FixedPolicy, MemoryLedger, MemoryMedia, ScriptedEngine};
    use crate::session::{SessionConfig, SessionController, StreamService};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;
    use tracing_subscriber::{EnvFilter, Registry, reload};

    type FilterLayer = reload::Layer<EnvFilter, Registry>;

    fn state() -> AppState {
        let ledger = Arc::new(MemoryLedger::default());
        let events = EventBroadcaster::new();
        let controller = SessionController::new(
            Arc::new(ScriptedEngine::default()),
            ledger.clone(),
            Arc::new(FixedPolicy(PlanPolicy::new([MediaType::Audio], 3600))),
            Arc::new(events.clone()),
            SessionConfig::default(),
        );
        let service = StreamService::new(controller, Arc::new(MemoryMedia(Vec::new())), ledger);
        AppState::new(service, events)
    }

    /// Router with a live filter handle; the layer must outlive the requests.
    fn app() -> (Router, FilterLayer) {
        let (layer, filter_handle): (FilterLayer, _) =
            reload::Layer::new(EnvFilter::new("rust_scast=info"));
        let settings = LoggingSettings::default();
        let logging = Arc::new(LoggingHandle::new(filter_handle, &settings));
        (create_router(state().with_logging(logging)), layer)
    }

    fn put_filter(filter: &str) -> Request<Body> {
        Request::put("/api/logging")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::json!({ "filter": filter }).to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_and_update_filter() {
        let (app, _layer) = app();

        let response = app
            .clone()
            .oneshot(Request::get("/api/logging").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["filter"], "rust_scast=info");
        assert_eq!(json["log_dir"], "logs");

        let response = app
            .clone()
            .oneshot(put_filter("rust_scast=debug"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["filter"], "rust_scast=debug");

        let response = app
            .oneshot(Request::get("/api/logging").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["filter"], "rust_scast=debug");
    }

    #[tokio::test]
    async fn test_invalid_filter_is_rejected() {
        let (app, _layer) = app();

        let response = app
            .clone()
            .oneshot(put_filter("rust_scast=loud"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

        let response = app
            .oneshot(Request::get("/api/logging").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(response).await["filter"], "rust_scast=info");
    }

    #[tokio::test]
    async fn test_unavailable_without_handle() {
        let app = create_router(state());
        let response = app
            .oneshot(Request::get("/api/logging").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
