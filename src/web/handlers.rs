//! HTTP handlers for the admin API.

use crate::error::AdminError;
use crate::gpio::{self, PinRecord};
use crate::options::OptionList;
use crate::proxies::ProxyRecord;
use crate::storage::{StorageInspector, StorageReport};
use crate::web::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, warn};

type ApiResult<T> = std::result::Result<Json<T>, AdminError>;

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AdminError::Network(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, Json(json!({ "status": "ERROR", "message": self.to_string() }))).into_response()
    }
}

/// Annotated pin list.
pub async fn get_gpio_config(State(state): State<AppState>) -> ApiResult<Vec<PinRecord>> {
    let config = state.config.aggregator_config();
    let pins = gpio::gpio_config(state.inventory.as_ref(), config).await?;
    Ok(Json(pins))
}

/// Inventory exactly as the player reports it.
pub async fn get_gpio_inventory(State(state): State<AppState>) -> ApiResult<Vec<Value>> {
    Ok(Json(state.inventory.fetch_raw().await?))
}

pub async fn get_options(
    State(state): State<AppState>,
    Path(setting): Path<String>,
) -> Json<OptionList> {
    Json(state.options.get(&setting).await)
}

pub async fn list_proxies(State(state): State<AppState>) -> ApiResult<Vec<ProxyRecord>> {
    let store = state.proxies.lock().await;
    Ok(Json(store.list()?))
}

pub async fn replace_proxies(
    State(state): State<AppState>,
    Json(records): Json<Vec<ProxyRecord>>,
) -> ApiResult<Vec<ProxyRecord>> {
    let store = state.proxies.lock().await;
    Ok(Json(store.replace(records)?))
}

/// Optional body of a single proxy add.
#[derive(Debug, Default, Deserialize)]
pub struct NewProxy {
    #[serde(default)]
    pub description: String,
}

pub async fn add_proxy(
    State(state): State<AppState>,
    Path(host): Path<String>,
    body: Option<Json<NewProxy>>,
) -> ApiResult<Vec<ProxyRecord>> {
    let description = body.map(|Json(b)| b.description).unwrap_or_default();
    let store = state.proxies.lock().await;
    Ok(Json(store.add(&host, &description)?))
}

pub async fn remove_proxy(
    State(state): State<AppState>,
    Path(host): Path<String>,
) -> ApiResult<Vec<ProxyRecord>> {
    let store = state.proxies.lock().await;
    Ok(Json(store.remove(&host)?))
}

/// Storage devices, the selected one and the applicable actions.
pub async fn get_storage(State(state): State<AppState>) -> ApiResult<StorageReport> {
    let config = state.config.clone();
    let usage = state.disk_usage.clone();
    let report = tokio::task::spawn_blocking(move || {
        let inspector = match usage {
            Some(usage) => StorageInspector::with_usage(&config, usage),
            None => StorageInspector::new(&config),
        };
        inspector.report()
    })
    .await
    .map_err(|e| AdminError::web_server_error(format!("Storage task failed: {}", e)))??;
    Ok(Json(report))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "show-admin",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Serve `index.html` from the static directory.
pub async fn serve_index(State(state): State<AppState>) -> Result<Html<String>, StatusCode> {
    let Some(dir) = state.static_path.as_ref() else {
        return Ok(Html(DEFAULT_INDEX_HTML.to_string()));
    };
    match tokio::fs::read_to_string(dir.join("index.html")).await {
        Ok(content) => Ok(Html(content)),
        Err(e) => {
            error!("Failed to read index.html: {}", e);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

pub async fn default_index() -> Html<&'static str> {
    Html(DEFAULT_INDEX_HTML)
}

const DEFAULT_INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Show Controller Admin</title>
    <style>
        body { font-family: sans-serif; margin: 2rem; color: #333; }
        code { background: #f3f3f3; padding: 0 4px; }
        li { margin-bottom: 6px; }
    </style>
</head>
<body>
    <h1>Show Controller Admin API</h1>
    <ul>
        <li><a href="/api/gpio/config"><code>GET /api/gpio/config</code></a> annotated pin usage</li>
        <li><a href="/api/gpio"><code>GET /api/gpio</code></a> pin inventory</li>
        <li><code>GET /api/options/:setting</code> setting choices</li>
        <li><a href="/api/proxies"><code>GET /api/proxies</code></a> proxied controllers</li>
        <li><a href="/api/storage"><code>GET /api/storage</code></a> storage devices</li>
        <li><a href="/api/health"><code>GET /api/health</code></a> health</li>
    </ul>
</body>
</html>
"#;
