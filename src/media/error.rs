use thiserror::Error;

/// Fatal outcomes of a transcoding job. Anything that reaches the queue
/// consumer as one of these fails the delivery.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("failed to sign download for {filename}: {source}")]
    SignedUrl {
        filename: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to acquire source: {0}")]
    Acquisition(String),

    #[error("ffprobe failed: {0}")]
    Probe(String),

    #[error("malformed probe output: {0}")]
    ProbeParse(String),

    #[error("unsupported input video codec: {0}")]
    UnsupportedCodec(String),

    #[error("transcode process failed: {0}")]
    TranscodeProcess(String),

    #[error("metadata update failed ({step}): {source}")]
    Metadata {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl JobError {
    pub fn metadata(step: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| JobError::Metadata { step, source }
    }
}
