//! Static asset server for the push application.

pub mod web;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::{AppConfig, ServerConfig};
use crate::error::{Error, Result};

const JAVASCRIPT: &str = "application/javascript; charset=utf-8";

#[derive(Clone)]
struct AppState {
    client_script: Arc<str>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn api_health() -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn index_page() -> impl IntoResponse {
    Html(web::index_html())
}

async fn client_script(State(state): State<AppState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, JAVASCRIPT)], state.client_script.to_string())
}

async fn service_worker() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, JAVASCRIPT),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        web::service_worker_js(),
    )
}

async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], web::styles_css())
}

async fn manifest() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/manifest+json")],
        web::manifest_json(),
    )
}

async fn icon() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/svg+xml")], web::icon_svg())
}

/// Routes for the built-in bundle, with the application server key baked
/// into the client script.
fn bundle_routes(config: &AppConfig) -> Result<Router> {
    let key_literal = serde_json::to_string(&config.push.application_server_key)?;
    let state = AppState {
        client_script: web::main_js(&key_literal).into(),
    };

    Ok(Router::new()
        .route("/", get(index_page))
        .route("/index.html", get(index_page))
        .route("/scripts/main.js", get(client_script))
        .route("/sw.js", get(service_worker))
        .route("/styles/index.css", get(stylesheet))
        .route("/manifest.json", get(manifest))
        .route("/images/icon.svg", get(icon))
        .with_state(state))
}

/// Builds the application router.
///
/// Serves `asset_dir` when configured, the built-in bundle otherwise.
///
/// # Errors
///
/// Returns an error if the client script cannot be generated.
pub fn router(config: &AppConfig) -> Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = match &config.server.asset_dir {
        Some(dir) => {
            log::info!("Serving assets from {}", dir.display());
            Router::new().fallback_service(ServeDir::new(dir))
        }
        None => bundle_routes(config)?,
    };

    Ok(app.route("/api/health", get(api_health)).layer(cors))
}

/// Binds the configured address.
///
/// # Errors
///
/// Returns an error if the address is invalid or cannot be bound.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Server(format!("invalid bind address: {e}")))?;
    Ok(TcpListener::bind(addr).await?)
}

/// Serves the application on an already bound listener until it fails.
///
/// # Errors
///
/// Returns an error if the router cannot be built or the server fails.
pub async fn serve(listener: TcpListener, config: &AppConfig) -> Result<()> {
    let app = router(config)?;
    let port = listener.local_addr()?.port();
    log::info!("Push notification app listening on port {port}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Binds and runs the asset server.
///
/// # Errors
///
/// Returns an error if the server cannot bind to the configured address.
pub async fn run(config: AppConfig) -> Result<()> {
    let listener = bind(&config.server).await?;
    serve(listener, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn spawn(config: AppConfig) -> String {
        let listener = bind(&config.server.clone().with_host("127.0.0.1").with_port(0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = serve(listener, &config).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let base = spawn(AppConfig::default()).await;
        let body = reqwest::get(format!("{base}/api/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn bundle_serves_page_and_scripts() {
        let base = spawn(AppConfig::default()).await;

        let page = reqwest::get(format!("{base}/")).await.unwrap();
        assert!(page.status().is_success());
        assert!(page.text().await.unwrap().contains("js-push-btn"));

        let sw = reqwest::get(format!("{base}/sw.js")).await.unwrap();
        assert_eq!(sw.headers()["content-type"], JAVASCRIPT);
    }

    #[tokio::test]
    async fn client_script_carries_configured_key() {
        let mut config = AppConfig::default();
        config.push.application_server_key = "BAEC".to_string();
        let base = spawn(config).await;

        let js = reqwest::get(format!("{base}/scripts/main.js"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(js.contains(r#"const applicationServerPublicKey = "BAEC";"#));
    }

    #[tokio::test]
    async fn asset_dir_is_served() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>custom</p>").unwrap();
        let config = AppConfig {
            server: ServerConfig::default().with_asset_dir(dir.path()),
            ..AppConfig::default()
        };
        let base = spawn(config).await;

        let page = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert_eq!(page, "<p>custom</p>");
        let missing = reqwest::get(format!("{base}/sw.js")).await.unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_host_is_rejected() {
        let config = ServerConfig::default().with_host("not a host");
        assert!(matches!(bind(&config).await, Err(Error::Server(_))));
    }
}
