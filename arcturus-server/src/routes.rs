use crate::AppState;
use arcturus_config::{list_maps, list_sources, load_map_style, load_tileserver_config};
use arcturus_core::{ArcturusError, HealthResponse, ProcessStatus, StyleEntry, TileserverConfig};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

pub fn router(state: AppState) -> Router {
    let frontend_dist = state.settings.frontend_dist_path.clone();

    let api = Router::new()
        .route("/api/health", get(get_health))
        .route("/api/tileserver/config", get(get_tileserver_config))
        .route("/api/tileserver/sources", get(get_tileserver_sources))
        .route("/api/maps", get(list_configured_maps))
        .route("/api/maps/:map_id", get(get_map_style))
        .route("/api/processes/tileserver", get(get_tileserver_status))
        .route("/api/processes/tileserver/start", post(start_tileserver))
        .route("/api/processes/tileserver/stop", post(stop_tileserver))
        .route("/api/processes/tileserver/restart", post(restart_tileserver))
        .route("/api/processes/tileserver/sighup", post(sighup_tileserver))
        .with_state(state);

    let app = if frontend_dist.exists() {
        api.fallback_service(ServeDir::new(frontend_dist))
    } else {
        api
    };

    app.layer(TraceLayer::new_for_http())
}

/// Error body, shaped `{"detail": "..."}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Maps domain errors onto HTTP status codes
#[derive(Debug)]
pub struct ApiError(ArcturusError);

impl From<ArcturusError> for ApiError {
    fn from(err: ArcturusError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            err if err.is_not_found() => StatusCode::NOT_FOUND,
            ArcturusError::InvalidConfig(_) | ArcturusError::InvalidStyle(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(status = %status, error = %self.0, "Request rejected");
        }

        let body = ErrorResponse {
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourcesResponse {
    pub sources: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MapsResponse {
    pub maps: Vec<StyleEntry>,
}

async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        tileserver: state.supervisor.status().await,
    })
}

async fn get_tileserver_config(
    State(state): State<AppState>,
) -> Result<Json<TileserverConfig>, ApiError> {
    let config = load_tileserver_config(&state.settings.tileserver_config_path)?;
    Ok(Json(config))
}

async fn get_tileserver_sources(
    State(state): State<AppState>,
) -> Result<Json<SourcesResponse>, ApiError> {
    let config = load_tileserver_config(&state.settings.tileserver_config_path)?;
    Ok(Json(SourcesResponse {
        sources: list_sources(&config).to_vec(),
    }))
}

async fn list_configured_maps(
    State(state): State<AppState>,
) -> Result<Json<MapsResponse>, ApiError> {
    let config = load_tileserver_config(&state.settings.tileserver_config_path)?;
    Ok(Json(MapsResponse {
        maps: list_maps(&config).to_vec(),
    }))
}

async fn get_map_style(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let config_path = &state.settings.tileserver_config_path;
    let config = load_tileserver_config(config_path)?;
    let style = load_map_style(config_path, &config, &map_id)?;
    Ok(Json(style))
}

async fn get_tileserver_status(State(state): State<AppState>) -> Json<ProcessStatus> {
    Json(state.supervisor.status().await)
}

async fn start_tileserver(
    State(state): State<AppState>,
) -> Result<Json<ProcessStatus>, ApiError> {
    Ok(Json(state.supervisor.start().await?))
}

async fn stop_tileserver(State(state): State<AppState>) -> Json<ProcessStatus> {
    Json(state.supervisor.stop().await)
}

async fn restart_tileserver(
    State(state): State<AppState>,
) -> Result<Json<ProcessStatus>, ApiError> {
    Ok(Json(state.supervisor.restart().await?))
}

async fn sighup_tileserver(State(state): State<AppState>) -> Json<ProcessStatus> {
    Json(state.supervisor.reload().await)
}
