//! Web application router and middleware setup.

use crate::web::config::WebConfig;
use crate::web::{handlers, AppState};
use axum::{
    routing::{get, get_service, post},
    Router,
};
use std::path::PathBuf;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Create the axum application with all routes and middleware.
pub fn create_app(config: &WebConfig, mut state: AppState) -> Router {
    let mut app = Router::new()
        .route("/api/gpio", get(handlers::get_gpio_inventory))
        .route("/api/gpio/config", get(handlers::get_gpio_config))
        .route("/api/options/:setting", get(handlers::get_options))
        .route(
            "/api/proxies",
            get(handlers::list_proxies).post(handlers::replace_proxies),
        )
        .route(
            "/api/proxies/:host",
            post(handlers::add_proxy).delete(handlers::remove_proxy),
        )
        .route("/api/storage", get(handlers::get_storage))
        .route("/api/health", get(handlers::health_check));

    match config.static_path.as_ref().map(PathBuf::from) {
        Some(static_path) if static_path.exists() => {
            info!("Serving static files from: {:?}", static_path);
            app = app.nest_service("/static", get_service(ServeDir::new(&static_path)));

            if static_path.join("index.html").exists() {
                state.static_path = Some(static_path);
                app = app.route("/", get(handlers::serve_index));
            } else {
                app = app.route("/", get(handlers::default_index));
            }
        }
        Some(static_path) => {
            warn!(
                "Static path {:?} does not exist, serving default index",
                static_path
            );
            app = app.route("/", get(handlers::default_index));
        }
        None => {
            app = app.route("/", get(handlers::default_index));
        }
    }

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
