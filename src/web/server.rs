//! Web server: router, shared state and background tasks.

use axum::{
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::admin::admin_router;
use super::auth::SharedSessionStore;
use super::{account, events, members};
use crate::advisory::SharedAdvisoryClient;
use crate::auth::{self, SharedAuthProvider};
use crate::config::WebServerConfig;
use crate::gateway::SharedTeamStore;
use crate::logging::SharedLogBuffer;
use crate::managers::{SharedMemberManager, SharedTeamManager};

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SharedTeamStore,
    pub team: SharedTeamManager,
    pub members: SharedMemberManager,
    pub auth: SharedAuthProvider,
    pub advisory: SharedAdvisoryClient,
    pub sessions: SharedSessionStore,
    pub log_buffer: SharedLogBuffer,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(account::index))
        .route("/health", get(health))
        .route("/login", get(account::login_page).post(account::login))
        .route("/signup", get(account::signup_page).post(account::signup))
        .route("/logout", get(account::logout))
        .route("/pending", get(account::pending))
        .route("/pending/bootstrap", post(account::bootstrap))
        .route("/events", get(events::list).post(events::create))
        .route("/events/new", get(events::new_form))
        .route("/events/:id", get(events::detail))
        .route("/events/:id/attendance", post(events::attendance))
        .route("/events/:id/advice", post(events::advice))
        .route("/calendar", get(events::calendar))
        .route("/members", get(members::roster))
        .route("/members/:id/approve", post(members::approve))
        .route("/members/:id/reject", post(members::reject))
        .route("/members/:id/edit", get(members::edit_form).post(members::save_edit))
        .route("/members/:id/delete", post(members::delete))
        .route("/members/:id/role", post(members::toggle_role))
        .route("/settings", get(members::settings))
        .route("/settings/profile", post(members::save_settings))
        .route("/settings/password", post(members::change_password))
        .with_state(state.clone())
        .nest("/admin", admin_router(state))
        .layer(TraceLayer::new_for_http())
}

/// Start the web server; runs until Ctrl-C
pub async fn start_web_server(config: WebServerConfig, state: AppState) -> anyhow::Result<()> {
    // Auth events for the lifetime of the server
    let sessions = state.sessions.clone();
    let _subscription = auth::subscribe(&*state.auth, move |event| {
        let sessions = sessions.clone();
        async move { sessions.route_event(&event).await }
    });

    if let Err(e) = state.team.refresh().await {
        warn!("Initial load failed, pages will retry: {}", e);
    }
    let refresher = spawn_refresh_task(&config, &state);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}:{}: {}", config.bind, config.port, e))?;
    let app = router(state);

    let served = match config.tls_paths() {
        Some((cert_path, key_path)) => {
            if !cert_path.exists() {
                return Err(anyhow::anyhow!(
                    "Certificate file not found: {}",
                    cert_path.display()
                ));
            }
            if !key_path.exists() {
                return Err(anyhow::anyhow!(
                    "Private key file not found: {}",
                    key_path.display()
                ));
            }
            info!("Loading TLS certificate {}", cert_path.display());
            let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .map_err(|e| anyhow::anyhow!(
                    "Failed to load TLS certificates: {}\n\nHint: The private key must be in PKCS#8 PEM format.",
                    e
                ))?;

            let handle = axum_server::Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
            });

            info!("Web server listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(anyhow::Error::from)
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("Web server listening on http://{}", listener.local_addr()?);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(anyhow::Error::from)
        }
    };

    if let Some(task) = refresher {
        task.abort();
    }
    info!("Web server stopped");
    served
}

/// Periodic full reload plus expired-session cleanup
fn spawn_refresh_task(config: &WebServerConfig, state: &AppState) -> Option<JoinHandle<()>> {
    let period = config.refresh_interval?;
    let team = state.team.clone();
    let sessions = state.sessions.clone();
    info!("Reloading team data every {}s", period.as_secs());

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // the first tick fires immediately and startup already loaded
        interval.tick().await;
        loop {
            interval.tick().await;
            match team.refresh().await {
                Ok(true) => {}
                Ok(false) => info!("Periodic reload skipped, newer changes in cache"),
                Err(e) => error!("Periodic reload failed: {}", e),
            }
            let expired = sessions.cleanup_expired().await;
            if expired > 0 {
                info!("Removed {} expired sessions", expired);
            }
        }
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn health() -> &'static str {
    "ok"
}
