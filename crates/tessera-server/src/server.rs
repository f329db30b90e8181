use std::{net::SocketAddr, sync::Arc};

use axum::{Router, middleware, routing::get};
use tessera_auth::{
    RotationEngine,
    http::{AuthState, CookieSettings},
};
use tower_http::trace::TraceLayer;

use crate::{bootstrap, config::AppConfig, handlers, middleware as app_middleware};

pub struct TesseraServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(cfg: &AppConfig, engine: Arc<RotationEngine>) -> Router {
    let body_limit = cfg.server.body_limit_bytes;

    // Cookies live as long as the refresh window so an expired access token
    // can still be sent to the refresh endpoint.
    let max_age = time::Duration::try_from(cfg.auth.tokens.refresh_token_lifetime)
        .unwrap_or(time::Duration::days(30));
    let auth_state = AuthState::new(
        engine,
        CookieSettings {
            secure: cfg.server.secure_cookies,
            max_age,
        },
    );

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .merge(tessera_auth::http::router(auth_state))
        // Middleware stack (order: request id -> trace -> body limit)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Assembles the rotation engine and the router.
    pub async fn build(self) -> anyhow::Result<TesseraServer> {
        let engine = Arc::new(bootstrap::build_engine(&self.config).await?);
        let app = build_app(&self.config, engine);

        Ok(TesseraServer {
            addr: self.addr,
            app,
        })
    }
}

impl TesseraServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        // Peer addresses feed the request origin when no proxy header is present
        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
