use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::redis::client::ProgressChannel;
use crate::infrastructure::storage::s3::ObjectStore;
use crate::infrastructure::storage::upload::UploadTarget;
use crate::media::process::ProcessInvoker;
use crate::modules::video::repository::VideoStore;

/// Clients shared by every job, built once at startup. All of them are safe
/// to use from concurrent jobs.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub upload_target: UploadTarget,
    pub videos: Arc<dyn VideoStore>,
    pub storage: Arc<dyn ObjectStore>,
    pub progress: Arc<dyn ProgressChannel>,
    pub tools: Arc<dyn ProcessInvoker>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        videos: Arc<dyn VideoStore>,
        storage: Arc<dyn ObjectStore>,
        progress: Arc<dyn ProgressChannel>,
        tools: Arc<dyn ProcessInvoker>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            upload_target: config.upload_target(),
            config,
            videos,
            storage,
            progress,
            tools,
            http,
        }
    }
}
