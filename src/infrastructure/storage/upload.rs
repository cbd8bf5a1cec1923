/// Object-storage endpoint that ffmpeg writes to directly over HTTP.
///
/// Every request ffmpeg makes against it carries the bearer key and an
/// upsert header, so re-running a job overwrites earlier output.
#[derive(Clone, Debug)]
pub struct UploadTarget {
    base_url: String,
    bucket: String,
    key: String,
}

impl UploadTarget {
    pub fn new(base_url: &str, bucket: &str, key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.trim_matches('/').to_string(),
            key: key.to_string(),
        }
    }

    /// `{base}/{bucket}/{owner}/{video}`
    pub fn video_prefix(&self, owner_id: &str, video_id: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, self.bucket, owner_id, video_id)
    }

    pub fn object_url(&self, owner_id: &str, video_id: &str, name: &str) -> String {
        format!("{}/{}", self.video_prefix(owner_id, video_id), name)
    }

    pub fn thumbnail_url(&self, owner_id: &str, video_id: &str, slot: u8) -> String {
        self.object_url(owner_id, video_id, &format!("thumb-{slot}.jpeg"))
    }

    /// Value for `-protocol_opts` on single-image uploads. The colons are
    /// escaped because ffmpeg parses the option string as `key=value` pairs.
    pub fn image_protocol_opts(&self) -> String {
        format!(
            "headers=authorization\\: Bearer {}\r\nContent-Type\\: image/jpeg\r\nx-upsert\\: true\r\n",
            self.key
        )
    }

    /// Value for `-headers` on the HLS muxer.
    pub fn hls_headers(&self) -> String {
        format!("authorization: Bearer {}\r\nx-upsert: true\r\n", self.key)
    }
}
