use redis::{AsyncCommands, RedisResult};

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns whether this hit is still within `limit`.
    /// The window starts at the first hit; later hits never extend it.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: i64,
        window_seconds: i64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count, ttl): (i64, i64) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .ttl(key)
            .query_async(&mut conn)
            .await?;

        if window_needs_expiry(count, ttl) {
            let _: () = conn.expire(key, window_seconds).await?;
        }

        Ok(count <= limit)
    }
}

/// A window gets its expiry once, on the hit that opened it. A counter left without a
/// TTL (`-1`) is repaired so it cannot block a client forever.
fn window_needs_expiry(count: i64, ttl: i64) -> bool {
    count == 1 || ttl == -1
}

pub fn rate_limit_key(client: &str) -> String {
    format!("ratelimit:{}", client)
}
