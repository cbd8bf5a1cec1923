use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::config::env::{self, EnvKey};
use crate::infrastructure::storage::upload::UploadTarget;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub rabbitmq_host: String,
    pub rabbitmq_port: u16,
    pub rabbitmq_user: String,
    pub rabbitmq_password: String,
    pub rabbitmq_vhost: String,
    pub queue_name: String,
    pub queue_lock_duration_secs: u64,
    pub worker_concurrency: usize,
    pub database_url: String,
    pub redis_url: String,
    pub minio_url: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub raw_uploads_bucket: String,
    pub signed_url_ttl_secs: u64,
    pub storage_upload_url: String,
    pub storage_key: String,
    pub videos_bucket: String,
    pub scratch_dir: PathBuf,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            rabbitmq_host: env::get_or(EnvKey::RabbitMqHost, "localhost"),
            rabbitmq_port: env::get_parsed(EnvKey::RabbitMqPort, 5672),
            rabbitmq_user: env::get_or(EnvKey::RabbitMqUser, "guest"),
            rabbitmq_password: env::get(EnvKey::RabbitMqPassword)?,
            rabbitmq_vhost: env::get_or(EnvKey::RabbitMqVhost, "/"),
            queue_name: env::get_or(EnvKey::QueueName, "transcoding"),
            // Lease covers a whole encode; there is no renewal mid-job.
            queue_lock_duration_secs: env::get_parsed(EnvKey::QueueLockDurationSecs, 300),
            worker_concurrency: env::get_parsed(EnvKey::WorkerConcurrency, 1usize).max(1),
            database_url: env::get(EnvKey::DatabaseUrl)?,
            redis_url: env::get(EnvKey::RedisUrl)?,
            minio_url: env::get(EnvKey::MinioUrl)?,
            minio_access_key: env::get(EnvKey::MinioAccessKey)?,
            minio_secret_key: env::get(EnvKey::MinioSecretKey)?,
            raw_uploads_bucket: env::get_or(EnvKey::RawUploadsBucket, "raw-videos"),
            signed_url_ttl_secs: env::get_parsed(EnvKey::SignedUrlTtlSecs, 3600),
            storage_upload_url: env::get(EnvKey::StorageUploadUrl)?,
            storage_key: env::get(EnvKey::StorageKey)?,
            videos_bucket: env::get_or(EnvKey::VideosBucket, "videos"),
            scratch_dir: PathBuf::from(env::get_or(EnvKey::ScratchDir, "/transcode")),
            ffmpeg_path: env::get_or(EnvKey::FfmpegPath, "ffmpeg"),
            ffprobe_path: env::get_or(EnvKey::FfprobePath, "ffprobe"),
        })
    }

    /// AMQP connection string with percent-encoded credentials.
    pub fn amqp_url(&self) -> Result<String, url::ParseError> {
        let mut url = Url::parse(&format!(
            "amqp://{}:{}",
            self.rabbitmq_host, self.rabbitmq_port
        ))?;
        url.set_username(&self.rabbitmq_user)
            .map_err(|_| url::ParseError::EmptyHost)?;
        url.set_password(Some(&self.rabbitmq_password))
            .map_err(|_| url::ParseError::EmptyHost)?;

        let vhost = if self.rabbitmq_vhost == "/" {
            "%2f".to_string()
        } else {
            self.rabbitmq_vhost.trim_start_matches('/').to_string()
        };
        url.set_path(&vhost);

        Ok(url.to_string())
    }

    pub fn lock_duration(&self) -> Duration {
        Duration::from_secs(self.queue_lock_duration_secs)
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }

    pub fn dead_letter_queue(&self) -> String {
        format!("{}.dead", self.queue_name)
    }

    pub fn upload_target(&self) -> UploadTarget {
        UploadTarget::new(
            &self.storage_upload_url,
            &self.videos_bucket,
            &self.storage_key,
        )
    }
}
