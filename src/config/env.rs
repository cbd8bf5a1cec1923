use std::env;
use std::str::FromStr;

pub enum EnvKey {
    RabbitMqHost,
    RabbitMqPort,
    RabbitMqUser,
    RabbitMqPassword,
    RabbitMqVhost,
    QueueName,
    QueueLockDurationSecs,
    WorkerConcurrency,
    DatabaseUrl,
    RedisUrl,
    MinioUrl,
    MinioAccessKey,
    MinioSecretKey,
    RawUploadsBucket,
    SignedUrlTtlSecs,
    StorageUploadUrl,
    StorageKey,
    VideosBucket,
    ScratchDir,
    FfmpegPath,
    FfprobePath,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::RabbitMqHost => "RABBITMQ_HOST",
            EnvKey::RabbitMqPort => "RABBITMQ_PORT",
            EnvKey::RabbitMqUser => "RABBITMQ_USER",
            EnvKey::RabbitMqPassword => "RABBITMQ_PASSWORD",
            EnvKey::RabbitMqVhost => "RABBITMQ_VHOST",
            EnvKey::QueueName => "QUEUE_NAME",
            EnvKey::QueueLockDurationSecs => "QUEUE_LOCK_DURATION_SECS",
            EnvKey::WorkerConcurrency => "WORKER_CONCURRENCY",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::MinioUrl => "MINIO_ENDPOINT",
            EnvKey::MinioAccessKey => "AWS_ACCESS_KEY_ID",
            EnvKey::MinioSecretKey => "AWS_SECRET_ACCESS_KEY",
            EnvKey::RawUploadsBucket => "RAW_UPLOADS_BUCKET",
            EnvKey::SignedUrlTtlSecs => "SIGNED_URL_TTL_SECS",
            EnvKey::StorageUploadUrl => "STORAGE_UPLOAD_URL",
            EnvKey::StorageKey => "STORAGE_KEY",
            EnvKey::VideosBucket => "VIDEOS_BUCKET",
            EnvKey::ScratchDir => "SCRATCH_DIR",
            EnvKey::FfmpegPath => "FFMPEG_PATH",
            EnvKey::FfprobePath => "FFPROBE_PATH",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
