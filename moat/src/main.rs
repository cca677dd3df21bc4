use std::{env, sync::Arc, time::Duration};

use config::{DEFAULT_CONFIG_PATH, load_config};
use global::Global;
use moat_blocking::{BlockingControl, BlockingController};
use moat_blocklist::{BlocklistService, ListRefresher};
use moat_resolver::{
    ChainQuerier, ChainedResolver, Resolver, blocking::BlockingResolver, chain,
    conditional::ConditionalUpstreamResolver,
    upstream::{DEFAULT_UPSTREAM_TIMEOUT, UpstreamResolver},
};
use moat_server::{DnsServer, ServerState};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking;
use tracing_subscriber::{Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod global;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let (nb, _guard) = non_blocking(std::io::stdout());

    let config_path = env::var("MOAT_CONFIG").unwrap_or(DEFAULT_CONFIG_PATH.to_string());

    let config = load_config(&config_path)?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(nb)
                .with_target(false)
                .with_filter(LevelFilter::from(config.server.log_level)),
        )
        .init();

    let server_addr = config.server.addr()?;
    let timeout = config.server.timeout();

    let lists = Arc::new(BlocklistService::new(&config.blocking.denylists)?);
    if lists.is_configured() {
        if let Err(e) = lists.refresh_lists().await {
            tracing::warn!("initial list load incomplete: {e:#}");
        }
    }

    let control: Arc<dyn BlockingControl> = Arc::new(BlockingController::new(lists.group_names()));

    let nodes: Vec<Box<dyn ChainedResolver>> = vec![
        Box::new(ConditionalUpstreamResolver::new(&config.conditional, DEFAULT_UPSTREAM_TIMEOUT)?),
        Box::new(BlockingResolver::new(&config.blocking, control.clone(), lists.clone())),
    ];
    let upstream = UpstreamResolver::new(&config.upstream.addrs()?, DEFAULT_UPSTREAM_TIMEOUT);
    let head: Arc<dyn Resolver> = Arc::from(chain(nodes, Box::new(upstream)));

    let shutdown = CancellationToken::new();
    let refresh_interval = config.blocking.refresh_interval_secs;
    if refresh_interval > 0 && lists.is_configured() {
        lists.spawn_refresh_task(Duration::from_secs(refresh_interval), shutdown.clone());
    }

    let global = Arc::new(Global {
        control,
        querier: Arc::new(ChainQuerier::new(head.clone(), timeout)),
        refresher: lists,
        config,
    });

    let server = DnsServer::new(server_addr, ServerState { resolver: head, timeout });

    tokio::select! {
        r = server.run() => {
            if let Err(e) = r {
                tracing::error!("DNS server exited with error: {}", e);
            }
        },
        r = api::serve_web(global) => {
            if let Err(e) = r {
                tracing::error!("HTTP server exited with error: {}", e);
            }
        },
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down DNS server...");
        },
    }

    shutdown.cancel();

    Ok(())
}
