use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{info, warn};

/// Team schedule and attendance board for a futsal team
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run against in-memory demo data instead of Supabase
    #[arg(long)]
    demo: bool,

    /// Port to listen on (overrides WEB_PORT)
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Address to bind (overrides WEB_BIND)
    #[arg(long)]
    bind: Option<String>,

    /// Log entries kept for the admin log viewer
    #[arg(long, default_value_t = logging::DEFAULT_CAPACITY)]
    log_buffer: usize,
}

mod advisory;
mod auth;
mod calendar;
mod config;
mod error;
mod gateway;
mod logging;
mod managers;
mod models;
mod state;
mod web;

use advisory::AdvisoryClient;
use auth::{GoTrueAuth, MemoryAuth, SharedAuthProvider};
use config::AppConfig;
use gateway::{MemoryStore, SharedTeamStore, SupabaseStore, TeamStore};
use managers::{create_shared_member_manager, create_shared_team_manager};
use state::create_shared_team_cache;
use web::{create_session_store, start_web_server, AppState};

/// Password of every account in demo mode
const DEMO_PASSWORD: &str = "password";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    // Create log buffer for web admin panel
    let log_buffer = logging::create_log_buffer(args.log_buffer);

    // Initialize tracing with our custom layer
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .with(logging::LogCaptureLayer::new(log_buffer.clone()))
        .init();

    let mut config = AppConfig::from_env()?;
    if let Some(port) = args.port {
        config.web.port = port;
    }
    if let Some(bind) = args.bind {
        config.web.bind = bind;
    }
    info!(
        "Team policy: bootstrap {:?}, orphaned attendance {:?}",
        config.policy.bootstrap, config.policy.orphans
    );

    let (store, auth): (SharedTeamStore, SharedAuthProvider) = if args.demo {
        demo_backend().await?
    } else {
        info!("Using Supabase at {}", config.supabase.url);
        (
            Arc::new(SupabaseStore::new(&config.supabase)?),
            Arc::new(GoTrueAuth::new(&config.supabase)?),
        )
    };

    let advisory = AdvisoryClient::new(config.advisory.clone())?;
    if !advisory.is_configured() {
        warn!("No API key for the generative model; strategy advice is disabled");
    }

    let cache = create_shared_team_cache();
    let team = create_shared_team_manager(store.clone(), cache.clone());
    let members = create_shared_member_manager(store.clone(), auth.clone(), cache, config.policy);

    let state = AppState {
        store,
        team,
        members,
        auth,
        advisory: Arc::new(advisory),
        sessions: create_session_store(),
        log_buffer,
    };

    start_web_server(config.web, state).await
}

/// In-memory store seeded with the demo team; every member signs in with
/// `DEMO_PASSWORD`
async fn demo_backend() -> Result<(SharedTeamStore, SharedAuthProvider)> {
    let store = MemoryStore::with_demo_data(chrono::Local::now().date_naive());
    let auth = MemoryAuth::new();
    for user in store.list_users().await? {
        auth.add_account(&user.id, &user.email, DEMO_PASSWORD);
        info!("Demo account {} ({})", user.email, user.role);
    }
    warn!("Demo mode: data lives in memory, all accounts use password '{}'", DEMO_PASSWORD);
    Ok((Arc::new(store), Arc::new(auth)))
}
