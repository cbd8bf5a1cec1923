use anyhow::{Result, anyhow};
use async_trait::async_trait;
use sqlx::PgPool;

use super::model::VideoStatus;

/// Writes the worker makes to the external video record.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn mark_processing(&self, id: &str) -> Result<()>;
    async fn update_progress(&self, id: &str, percent: u8) -> Result<()>;
    async fn set_thumbnails_ready(&self, id: &str) -> Result<()>;
    async fn publish(&self, id: &str, duration_seconds: i32) -> Result<()>;
    async fn mark_failed(&self, id: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_status(&self, id: &str, status: VideoStatus) -> Result<()> {
        let result = sqlx::query("UPDATE videos SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_updated(result.rows_affected(), id)
    }
}

fn ensure_updated(rows: u64, id: &str) -> Result<()> {
    if rows == 0 {
        return Err(anyhow!("Video {} not found", id));
    }
    Ok(())
}

#[async_trait]
impl VideoStore for VideoRepository {
    async fn mark_processing(&self, id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE videos SET status = $1, processing_progress = 0, updated_at = NOW() WHERE id = $2",
        )
        .bind(VideoStatus::Processing.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_updated(result.rows_affected(), id)
    }

    async fn update_progress(&self, id: &str, percent: u8) -> Result<()> {
        sqlx::query("UPDATE videos SET processing_progress = $1, updated_at = NOW() WHERE id = $2")
            .bind(i32::from(percent))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_thumbnails_ready(&self, id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE videos SET thumbnails_ready = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_updated(result.rows_affected(), id)
    }

    async fn publish(&self, id: &str, duration_seconds: i32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE videos
            SET duration = $1, status = $2, processing_progress = 100, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(duration_seconds)
        .bind(VideoStatus::Public.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_updated(result.rows_affected(), id)
    }

    async fn mark_failed(&self, id: &str) -> Result<()> {
        self.set_status(id, VideoStatus::Failed).await
    }
}
