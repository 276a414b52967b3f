pub mod app_config;
pub mod database;
pub mod events;
pub mod pg_store;
pub mod redis_repo;

pub use app_config::{Config, StorageBackend};
pub use database::DbClient;
pub use events::{EventProducer, KafkaNotificationSink};
pub use pg_store::PgBookingStore;
pub use redis_repo::RedisClient;
