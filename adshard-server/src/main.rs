mod config;
mod consumer;

use adshard_core::{
    EventDispatcher, ImpressionQueue, InteractionLimitOperation, RedisBus, ShowBannersOperation,
    ShowBannersOperationRequest, SqlitePlatformDirectory, StartBannerOperation,
    StopBannerOperation,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use consumer::run_consumer;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "adshard")]
#[command(about = "Sharded banner inventory with interaction limits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume banner and interaction events until interrupted
    Server {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Serve banners for one platform once and print them as JSON
    Show {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        #[arg(long)]
        platform: u64,

        #[arg(long, default_value = adshard_core::DEVICE_DESKTOP)]
        device: String,

        /// Overrides serving.default_limit
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "adshard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Server { config } => {
            tracing::info!("Starting Adshard server with config: {}", config);
            run_server(&config).await
        }
        Commands::Show {
            config,
            platform,
            device,
            limit,
        } => run_show(&config, platform, device, limit).await,
    };

    if let Err(error) = result {
        tracing::error!("{:#}", error);
        std::process::exit(1);
    }
}

async fn run_server(path: &str) -> anyhow::Result<()> {
    let cfg = Config::from_file(path).context("failed to load config")?;
    let builder = cfg.cluster_builder();

    let counters = Arc::new(builder.build_counter_store().await?);
    let inventory = Arc::new(builder.build_inventory_store(builder.rng(0))?);
    let platforms = Arc::new(
        SqlitePlatformDirectory::open(&cfg.platforms)
            .with_context(|| format!("failed to open platforms at {:?}", cfg.platforms))?,
    );
    let bus = RedisBus::new(&cfg.bus.url, cfg.bus.namespace_or_default())
        .await
        .context("failed to connect to bus")?;

    tracing::info!(
        "Counter shards: {}, inventory shards: {}, namespace: {}",
        cfg.counter_shards.len(),
        inventory.shard_count(),
        cfg.bus.namespace_or_default()
    );

    let stop = Arc::new(StopBannerOperation::new(inventory.clone()));
    let limits = Arc::new(InteractionLimitOperation::new(
        counters,
        Arc::new(bus.clone()),
        stop.clone(),
    ));
    let start = Arc::new(StartBannerOperation::new(
        inventory,
        platforms,
        builder.rng(1),
    ));
    let dispatcher = EventDispatcher::new(limits, start, stop);

    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!("could not listen for shutdown signal: {}", error);
            std::future::pending::<()>().await;
        }
    };
    run_consumer(&bus, &dispatcher, cfg.bus.poll_timeout(), shutdown).await?;

    tracing::info!("Adshard server stopped");
    Ok(())
}

async fn run_show(
    path: &str,
    platform_id: u64,
    device: String,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let cfg = Config::from_file(path).context("failed to load config")?;
    let builder = cfg.cluster_builder();

    let inventory = Arc::new(builder.build_inventory_store(builder.rng(0))?);
    let bus = RedisBus::new(&cfg.bus.url, cfg.bus.namespace_or_default())
        .await
        .context("failed to connect to bus")?;

    // Views go out on the bus and are counted by the server.
    let impressions = Arc::new(ImpressionQueue::start(
        cfg.serving.queue_capacity,
        Arc::new(bus),
    )?);
    let show = ShowBannersOperation::new(inventory, impressions.clone());

    let records = show
        .run(ShowBannersOperationRequest {
            platform_id,
            device,
            user_agent: format!("adshard-cli/{}", env!("CARGO_PKG_VERSION")),
            limit: limit.unwrap_or(cfg.serving.default_limit),
        })
        .await?;

    impressions.shutdown().await?;

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
