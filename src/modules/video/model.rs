/// Publication state of a video record, stored as text in `videos.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStatus {
    Processing,
    Public,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Processing => "PROCESSING",
            VideoStatus::Public => "PUBLIC",
            VideoStatus::Failed => "FAILED",
        }
    }
}
