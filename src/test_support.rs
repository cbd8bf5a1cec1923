//! Recording fakes for the worker's external collaborators.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::settings::AppConfig;
use crate::infrastructure::redis::client::ProgressChannel;
use crate::infrastructure::storage::s3::ObjectStore;
use crate::media::process::{ExitState, ProcessInvoker, ProcessOutput, StreamingProcess};
use crate::modules::video::repository::VideoStore;
use crate::state::AppState;

pub fn test_config(scratch_dir: PathBuf) -> AppConfig {
    AppConfig {
        rabbitmq_host: "localhost".into(),
        rabbitmq_port: 5672,
        rabbitmq_user: "guest".into(),
        rabbitmq_password: "guest".into(),
        rabbitmq_vhost: "/".into(),
        queue_name: "transcoding".into(),
        queue_lock_duration_secs: 300,
        worker_concurrency: 1,
        database_url: "postgres://localhost/videos".into(),
        redis_url: "redis://localhost:6379".into(),
        minio_url: "http://localhost:9000".into(),
        minio_access_key: "minio".into(),
        minio_secret_key: "minio123".into(),
        raw_uploads_bucket: "raw-videos".into(),
        signed_url_ttl_secs: 3600,
        storage_upload_url: "https://store.test/storage/v1/object".into(),
        storage_key: "service-key".into(),
        videos_bucket: "videos".into(),
        scratch_dir,
        ffmpeg_path: "ffmpeg".into(),
        ffprobe_path: "ffprobe".into(),
    }
}

/// Value following `flag` in an argument list.
pub fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

pub fn output(code: i32, stdout: &str, stderr: &str) -> io::Result<ProcessOutput> {
    Ok(ProcessOutput {
        exit: ExitState { code: Some(code) },
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub program: String,
    pub args: Vec<String>,
    pub streamed: bool,
}

type RunHandler = dyn Fn(&str, &[String]) -> io::Result<ProcessOutput> + Send + Sync;

enum EncoderBehaviour {
    Exit { stderr: Vec<u8>, code: Option<i32> },
    SpawnFails,
}

/// Answers buffered runs through a handler and streamed spawns with a
/// canned stderr and exit code.
pub struct FakeTools {
    calls: Mutex<Vec<ToolCall>>,
    run: Box<RunHandler>,
    encoder: EncoderBehaviour,
}

impl FakeTools {
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&str, &[String]) -> io::Result<ProcessOutput> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            run: Box::new(run),
            encoder: EncoderBehaviour::Exit {
                stderr: Vec::new(),
                code: Some(0),
            },
        }
    }

    pub fn with_encoder(mut self, stderr: &[u8], code: Option<i32>) -> Self {
        self.encoder = EncoderBehaviour::Exit {
            stderr: stderr.to_vec(),
            code,
        };
        self
    }

    pub fn with_spawn_failure(mut self) -> Self {
        self.encoder = EncoderBehaviour::SpawnFails;
        self
    }

    fn record(&self, program: &str, args: &[String], streamed: bool) {
        self.calls.lock().unwrap().push(ToolCall {
            program: program.to_string(),
            args: args.to_vec(),
            streamed,
        });
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<ToolCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program && !c.streamed)
            .collect()
    }

    pub fn spawned(&self) -> Vec<ToolCall> {
        self.calls().into_iter().filter(|c| c.streamed).collect()
    }
}

#[async_trait]
impl ProcessInvoker for FakeTools {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<ProcessOutput> {
        self.record(program, args, false);
        (self.run)(program, args)
    }

    fn spawn(&self, program: &str, args: &[String]) -> io::Result<StreamingProcess> {
        self.record(program, args, true);
        match &self.encoder {
            EncoderBehaviour::SpawnFails => {
                Err(io::Error::new(io::ErrorKind::NotFound, "no such tool"))
            }
            EncoderBehaviour::Exit { stderr, code } => {
                let code = *code;
                Ok(StreamingProcess {
                    stderr: Box::pin(io::Cursor::new(stderr.clone())),
                    exit: Box::pin(async move { Ok(ExitState { code }) }),
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoUpdate {
    Processing(String),
    Progress(String, u8),
    ThumbnailsReady(String),
    Published(String, i32),
    Failed(String),
}

#[derive(Default)]
pub struct RecordingVideos {
    updates: Mutex<Vec<VideoUpdate>>,
    failing: bool,
}

impl RecordingVideos {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn updates(&self) -> Vec<VideoUpdate> {
        self.updates.lock().unwrap().clone()
    }

    fn push(&self, update: VideoUpdate) -> Result<()> {
        if self.failing {
            return Err(anyhow!("database unavailable"));
        }
        self.updates.lock().unwrap().push(update);
        Ok(())
    }
}

#[async_trait]
impl VideoStore for RecordingVideos {
    async fn mark_processing(&self, id: &str) -> Result<()> {
        self.push(VideoUpdate::Processing(id.into()))
    }

    async fn update_progress(&self, id: &str, percent: u8) -> Result<()> {
        self.push(VideoUpdate::Progress(id.into(), percent))
    }

    async fn set_thumbnails_ready(&self, id: &str) -> Result<()> {
        self.push(VideoUpdate::ThumbnailsReady(id.into()))
    }

    async fn publish(&self, id: &str, duration_seconds: i32) -> Result<()> {
        self.push(VideoUpdate::Published(id.into(), duration_seconds))
    }

    async fn mark_failed(&self, id: &str) -> Result<()> {
        self.push(VideoUpdate::Failed(id.into()))
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    reports: Mutex<Vec<(String, u8)>>,
    failing: bool,
}

impl RecordingProgress {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<(String, u8)> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressChannel for RecordingProgress {
    async fn report(&self, video_id: &str, percent: u8) -> Result<()> {
        if self.failing {
            return Err(anyhow!("redis unavailable"));
        }
        self.reports.lock().unwrap().push((video_id.to_string(), percent));
        Ok(())
    }
}

/// Signs every key as `{base_url}/{key}`.
pub struct FakeObjectStore {
    base_url: String,
    deleted: Mutex<Vec<String>>,
}

impl FakeObjectStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn signed_download_url(&self, key: &str, _ttl: Duration) -> Result<String> {
        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn delete_raw(&self, key: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Handles on the fakes behind a test [`AppState`].
pub struct Harness {
    pub state: AppState,
    pub tools: Arc<FakeTools>,
    pub videos: Arc<RecordingVideos>,
    pub progress: Arc<RecordingProgress>,
    pub storage: Arc<FakeObjectStore>,
}

pub fn harness(scratch_dir: PathBuf, storage_url: &str, tools: FakeTools) -> Harness {
    let tools = Arc::new(tools);
    let videos = Arc::new(RecordingVideos::default());
    let progress = Arc::new(RecordingProgress::default());
    let storage = Arc::new(FakeObjectStore::new(storage_url));

    let state = AppState::new(
        test_config(scratch_dir),
        videos.clone(),
        storage.clone(),
        progress.clone(),
        tools.clone(),
        reqwest::Client::new(),
    );

    Harness {
        state,
        tools,
        videos,
        progress,
        storage,
    }
}
