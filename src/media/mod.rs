//! Building blocks of the transcoding pipeline, in the order a job runs them.

pub mod acquisition;
pub mod error;
pub mod hls;
pub mod ladder;
pub mod probe;
pub mod process;
pub mod progress;
pub mod thumbnails;
pub mod workspace;
