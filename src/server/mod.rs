//! Dashboard transport: one axum router serving the WebSocket and a small
//! JSON API.
//!
//! ```text
//! GET  /ws       live updates + commands   (see ws.rs)
//! GET  /config   current settings
//! POST /config   patch settings
//! POST /command  route a CommandRequest, return its result
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::hub::StateHub;
use crate::modules::{CommandError, CommandRequest, ModuleRegistry};

pub mod ws;

/// Shared handles every route needs.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<StateHub>,
    pub registry: Arc<ModuleRegistry>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::websocket_handler))
        .route("/config", get(get_config).post(update_config))
        .route("/command", post(run_command))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: &str,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    log::info!("server: listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;

    log::info!("server: stopped");
    Ok(())
}

async fn get_config(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    route(&state, "config", "get", None).await
}

async fn update_config(
    State(state): State<AppState>,
    Json(patch): Json<Value>,
) -> (StatusCode, Json<Value>) {
    route(&state, "config", "update", Some(patch)).await
}

async fn run_command(
    State(state): State<AppState>,
    request: Result<Json<CommandRequest>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let result = match request {
        Ok(Json(request)) => state.registry.execute(request).await,
        Err(rejection) => CommandError::InvalidPayload(rejection.body_text()).to_json(),
    };
    (status_for(&result), Json(result))
}

async fn route(
    state: &AppState,
    module: &str,
    command: &str,
    data: Option<Value>,
) -> (StatusCode, Json<Value>) {
    let result = state
        .registry
        .execute(CommandRequest {
            module: module.into(),
            command: command.into(),
            data,
        })
        .await;
    (status_for(&result), Json(result))
}

fn status_for(result: &Value) -> StatusCode {
    if result.get("error").is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{AppConfig, ConfigStore};
    use crate::modules::ConfigModule;

    fn state() -> AppState {
        let hub = Arc::new(StateHub::new(10));
        let store = Arc::new(ConfigStore::in_memory(AppConfig::default()));
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(ConfigModule::new(store, hub.clone())));
        AppState {
            hub,
            registry: Arc::new(registry),
        }
    }

    async fn call(
        state: AppState,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn get_config_returns_settings() {
        let (status, body) = call(state(), Method::GET, "/config", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["notifications"]["capacity"], 100);
    }

    #[tokio::test]
    async fn post_config_patches_and_notifies() {
        let state = state();
        let hub = state.hub.clone();

        let (status, body) = call(
            state,
            Method::POST,
            "/config",
            Some(json!({ "base_url": "http://vision.local" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["remote"]["base_url"], "http://vision.local");
        assert_eq!(hub.history().len(), 1);
    }

    #[tokio::test]
    async fn command_to_unknown_module_is_bad_request() {
        let (status, body) = call(
            state(),
            Method::POST,
            "/command",
            Some(json!({ "module": "camera", "command": "snap" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Unknown module: camera" }));
    }

    #[tokio::test]
    async fn malformed_command_gets_json_error() {
        let (status, body) = call(
            state(),
            Method::POST,
            "/command",
            Some(json!({ "command": "snap" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = body["error"].as_str().unwrap();
        assert!(error.starts_with("Invalid payload: "), "{error}");
    }
}
