use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::body::Body;
use axum::{routing::get, Router};
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod routes;
mod services;

use config::Config;
use db::models::Platform;
use services::crypto::CredentialCipher;
use services::dgis::DgisService;
use services::flamp::FlampService;
use services::gateway::GatewayClient;
use services::init;
use services::platform::ReviewPlatform;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub dgis: DgisService,
    pub flamp: FlampService,
    pub cipher: CredentialCipher,
}

impl AppState {
    pub fn platform_service(&self, platform: Platform) -> &dyn ReviewPlatform {
        match platform {
            Platform::Dgis => &self.dgis,
            Platform::Flamp => &self.flamp,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedback_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Feedback Gateway");

    let pool = init::init_db(&config).await?;

    let dgis = DgisService::new(GatewayClient::new(
        &config.dgis.base_url,
        config.gateway.timeout_seconds,
    )?);
    let flamp = FlampService::new(GatewayClient::new(
        &config.flamp.base_url,
        config.gateway.timeout_seconds,
    )?);
    let cipher = CredentialCipher::from_base64_key(&config.encryption.key)?;

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        dgis,
        flamp,
        cipher,
    });

    let thread_shutdown = Arc::new(AtomicBool::new(false));

    // Rate limiter for the upstream proxy endpoints. The error handler keeps
    // the same error envelope as `AppError`.
    let mut proxy_builder = GovernorConfigBuilder::default();
    proxy_builder.per_second(config.rate_limit.proxy_per_second.into());
    proxy_builder.burst_size(config.rate_limit.proxy_burst);
    proxy_builder.key_extractor(SmartIpKeyExtractor);
    proxy_builder.error_handler(|error: GovernorError| -> http::Response<Body> {
        match error {
            GovernorError::TooManyRequests { wait_time, headers } => {
                let body = serde_json::json!({
                    "error": {
                        "code": "RATE_LIMITED",
                        "message": "Rate limit exceeded",
                        "details": { "retry_after_seconds": wait_time }
                    }
                })
                .to_string();

                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;
                resp.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );
                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }
                resp.headers_mut().insert(
                    http::header::RETRY_AFTER,
                    http::HeaderValue::from_str(&wait_time.to_string()).unwrap(),
                );
                resp
            }
            GovernorError::UnableToExtractKey => {
                let body = serde_json::json!({
                    "error": {
                        "code": "INVALID_REQUEST",
                        "message": "Unable to determine client IP for rate limiting"
                    }
                })
                .to_string();

                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::BAD_REQUEST;
                resp.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );
                resp
            }
            GovernorError::Other { code, msg, headers } => {
                let body = msg.unwrap_or_else(|| "Rate limiting error".to_string());
                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::from_u16(code.as_u16())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }
                resp
            }
        }
    });

    let proxy_gov_conf = Arc::new(
        proxy_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build proxy governor config"))?,
    );

    // Governor storage grows per client IP; prune it periodically.
    let proxy_cleaner = {
        let limiter = proxy_gov_conf.limiter().clone();
        let interval = Duration::from_secs(60);
        let flag = thread_shutdown.clone();
        std::thread::spawn(move || {
            let tick = Duration::from_secs(1);
            loop {
                for _ in 0..interval.as_secs() {
                    if flag.load(Ordering::SeqCst) {
                        tracing::info!("Proxy rate limiter cleanup thread exiting");
                        return;
                    }
                    std::thread::sleep(tick);
                }
                tracing::debug!("proxy rate limiter size: {}", limiter.len());
                limiter.retain_recent();
            }
        })
    };

    let proxy_rate_layer = GovernorLayer {
        config: proxy_gov_conf.clone(),
    };
    let dgis_rate_layer = GovernorLayer {
        config: proxy_gov_conf.clone(),
    };

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        // Profile and branch management
        .nest("/api/platforms", routes::profiles::router())
        // Review/stats proxies (rate limited, they fan out to upstreams)
        .nest(
            "/api/platforms",
            routes::reviews::router().layer(proxy_rate_layer),
        )
        // 2GIS-only review actions
        .nest(
            "/api/dgis",
            routes::reviews::dgis_router().layer(dgis_rate_layer),
        )
        .with_state(app_state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(
                    config
                        .server
                        .frontend_url
                        .parse::<HeaderValue>()
                        .expect("Invalid FRONTEND_URL for CORS"),
                )
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PATCH,
                    http::Method::OPTIONS,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                ])
                .allow_credentials(true),
        );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let thread_shutdown_clone = thread_shutdown.clone();
    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut term =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to bind SIGTERM");
            tokio::select! {
                _ = ctrl_c => {},
                _ = term.recv() => {},
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("Failed to bind Ctrl+C");
        }

        tracing::info!("Shutdown signal received");
        thread_shutdown_clone.store(true, Ordering::SeqCst);
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {
            tracing::info!("Server future dropped, no longer accepting connections");
        }
    }

    if let Err(e) = proxy_cleaner.join() {
        tracing::warn!("Proxy cleanup thread join failed: {:?}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
