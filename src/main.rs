use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use concert_ticketing::{
    build_router,
    config::Config,
    database::Database,
    services::{
        ChannelEventPublisher, RedisEventPublisher, ReservationEventConsumer,
        ReservationEventPublisher, TicketingService,
    },
    store::PgStore,
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("invalid configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Concert Ticketing API ({})", config.app.environment);

    // Connect to the database
    let db = Database::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    db.run_migrations()
        .await
        .context("failed to run migrations")?;
    let store = PgStore::new(db, config.database.lock_timeout_ms);

    // Reservation events go to Redis when configured, otherwise to the in-process consumer
    let (events, local_rx): (Arc<dyn ReservationEventPublisher>, _) = match &config.redis.url {
        Some(url) => {
            let publisher: Arc<dyn ReservationEventPublisher> = Arc::new(
                RedisEventPublisher::connect(url, config.redis.channel.clone())
                    .await
                    .context("failed to connect to Redis")?,
            );
            (publisher, None)
        }
        None => {
            warn!("REDIS_URL not set, reservation events are handled in-process");
            let (publisher, rx) = ChannelEventPublisher::channel();
            let publisher: Arc<dyn ReservationEventPublisher> = Arc::new(publisher);
            (publisher, Some(rx))
        }
    };

    let ticketing = Arc::new(TicketingService::new(store, events));

    // --- Start background tasks ---
    if let Some(rx) = local_rx {
        let consumer = ReservationEventConsumer::new(ticketing.clone(), config.reservation.hold());
        tokio::spawn(consumer.run(rx));
    }

    // --- Start the web server ---
    let app = build_router(AppState::new(ticketing));

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("HOST/PORT do not form a socket address")?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
