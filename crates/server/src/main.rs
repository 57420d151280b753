use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dashmap::DashMap;
use voxgate_capacity::{in_process::InProcessCapacityStore, redis_store::RedisCapacityStore, CapacityStore};
use voxgate_config::{InProcessTenantConfigStore, RedisTenantConfigStore, TenantConfigStore};
use voxgate_core::logging::{init_logging, LoggingConfig};
use voxgate_core::metrics::MetricsRegistry;
use voxgate_core::time::Clock;
use voxgate_server::cli::{Cli, Command};
use voxgate_server::clients::{CarrierHttpClient, FilesystemWavStore, KokoroTtsClient, LlmHttpClient};
use voxgate_server::config::ServerConfig;
use voxgate_server::routes::build_router;
use voxgate_server::routes::carrier_ws::dead_air_tick;
use voxgate_server::state::{AppState, SessionClientsFactory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::from_env());

    let cli = Cli::parse();
    let config = ServerConfig::from_env();

    match cli.command {
        Some(Command::Config(args)) => {
            let store = build_tenant_config_store(&config).await?;
            let code = voxgate_config::cli::run(&store, args).await;
            std::process::exit(code);
        }
        Some(Command::Serve) | None => serve(config).await,
    }
}

async fn build_tenant_config_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn TenantConfigStore>> {
    Ok(match &config.redis_url {
        Some(url) => Arc::new(
            RedisTenantConfigStore::connect(url, config.runtime.capacity.tenantcfg_prefix.clone()).await?,
        ),
        None => Arc::new(InProcessTenantConfigStore::new()),
    })
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let capacity: Arc<dyn CapacityStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisCapacityStore::connect(url, config.runtime.capacity.cap_prefix.clone()).await?),
        None => Arc::new(InProcessCapacityStore::new()),
    };
    let tenant_config = build_tenant_config_store(&config).await?;

    let http = reqwest::Client::new();
    let clock = Clock::wall();

    let clients = SessionClientsFactory::new(
        Arc::new(CarrierHttpClient::new(http.clone(), config.carrier_base_url.clone(), config.carrier_api_key.clone())),
        Arc::new(LlmHttpClient::new(http.clone(), config.llm_url.clone())),
        Arc::new(KokoroTtsClient::new(http.clone(), config.tts_kokoro_url.clone(), None)),
        Arc::new(FilesystemWavStore::new(
            config.audio_storage_dir.clone(),
            config.audio_public_base_url.clone(),
        )),
    );

    let sessions = voxgate_session::SessionManager::new(capacity.clone(), clock.clone(), config.runtime.idle_ttl.as_millis() as u64);

    let bind_addr = config.bind_addr.clone();
    let idle_sweep_interval = config.runtime.idle_sweep_interval;

    let state = Arc::new(AppState {
        config,
        clock,
        http,
        metrics: MetricsRegistry::new(),
        capacity,
        tenant_config,
        sessions,
        calls: DashMap::new(),
        clients,
    });

    spawn_idle_sweep(state.clone(), idle_sweep_interval);

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "voxgate-server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

/// Background sweep (spec §4.7 "idle sweeper"): tears down sessions with no
/// activity for the configured idle TTL, and releases their call pipeline
/// along with them.
fn spawn_idle_sweep(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let expired = state.sessions.sweep_idle().await;
            for call_id in expired {
                state.calls.remove(&call_id);
            }

            for entry in state.calls.iter() {
                if let Err(e) = dead_air_tick(entry.value()).await {
                    tracing::debug!(call_id = %entry.key(), error = %e, "dead-air tick failed");
                }
            }
        }
    });
}
