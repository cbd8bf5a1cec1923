use anyhow::Result;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use serde::Serialize;
use tracing::{debug, info};

// Progress keys outlive the job so late subscribers can still read the last value.
const PROGRESS_TTL_SECS: u64 = 24 * 60 * 60;

/// Job-queue side of progress reporting.
#[async_trait]
pub trait ProgressChannel: Send + Sync {
    async fn report(&self, video_id: &str, percent: u8) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProgressEvent<'a> {
    video_id: &'a str,
    progress: u8,
}

/// One multiplexed connection shared by every job; it reconnects on its own
/// after the server drops it.
#[derive(Clone)]
pub struct RedisService {
    conn: ConnectionManager,
}

impl RedisService {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = Client::open(connection_string)?;
        let conn = ConnectionManager::new(client).await?;

        info!("✅ Connected to Redis");
        Ok(Self { conn })
    }

    pub fn get_conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    pub fn progress_key(video_id: &str) -> String {
        format!("transcoding:progress:{}", video_id)
    }
}

#[async_trait]
impl ProgressChannel for RedisService {
    async fn report(&self, video_id: &str, percent: u8) -> Result<()> {
        let mut conn = self.get_conn();
        let key = Self::progress_key(video_id);
        let payload = serde_json::to_string(&ProgressEvent {
            video_id,
            progress: percent,
        })?;

        conn.set_ex::<_, _, ()>(&key, percent, PROGRESS_TTL_SECS).await?;
        conn.publish::<_, _, ()>(&key, payload).await?;

        debug!("Published progress {}% to {}", percent, key);
        Ok(())
    }
}
