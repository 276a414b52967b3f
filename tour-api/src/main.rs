use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tour_api::{app, AppState, AuthConfig};
use tour_booking::{spawn_notification_worker, BookingEngine, BookingStore, InMemoryBookingStore};
use tour_core::{LogNotificationSink, NotificationSink};
use tour_store::{
    Config, DbClient, EventProducer, KafkaNotificationSink, PgBookingStore, RedisClient,
    StorageBackend,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tour_api=debug,tour_booking=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting tour API on port {}", config.server.port);

    let store: Arc<dyn BookingStore> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data is lost on restart");
            Arc::new(InMemoryBookingStore::new())
        }
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(PgBookingStore::new(db.pool))
        }
    };

    let sink: Arc<dyn NotificationSink> = match &config.kafka {
        Some(kafka) => {
            let producer =
                EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?;
            Arc::new(KafkaNotificationSink::new(producer))
        }
        None => Arc::new(LogNotificationSink),
    };
    let (notifications, _worker) = spawn_notification_worker(sink);

    let redis = match &config.redis {
        Some(redis) => Some(Arc::new(
            RedisClient::new(&redis.url)
                .await
                .context("Failed to create Redis client")?,
        )),
        None => None,
    };

    let app_state = AppState {
        engine: BookingEngine::new(store, notifications),
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        webhook_secret: config.payments.webhook_secret.clone(),
        rate_limit: config.rate_limit.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
