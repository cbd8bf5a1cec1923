use serde::{Deserialize, Serialize};

/// Message on the transcoding queue. `id` is the video id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub id: String,
    pub data: TranscodeJobData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeJobData {
    /// Object key of the raw upload in the raw-uploads bucket.
    pub filename: String,
    pub user_id: String,
}

impl TranscodeJob {
    pub fn video_id(&self) -> &str {
        &self.id
    }

    pub fn owner_id(&self) -> &str {
        &self.data.user_id
    }

    pub fn filename(&self) -> &str {
        &self.data.filename
    }
}
