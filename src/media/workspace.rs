use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::JobError;

/// Per-attempt scratch directory `{root}/{owner}/{video}/{attempt}`.
///
/// Owned by exactly one job attempt. A redelivered copy of a job that is
/// still running gets its own attempt directory. Removed by
/// [`ScratchWorkspace::cleanup`] and again on drop, so a panicking or
/// cancelled job still releases it.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: PathBuf,
}

fn single_component(value: &str, what: &str) -> Result<(), JobError> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(JobError::InvalidJob(format!(
            "{} {:?} is not a single path component",
            what, value
        ))),
    }
}

impl ScratchWorkspace {
    pub fn new(root: &Path, owner_id: &str, video_id: &str) -> Result<Self, JobError> {
        single_component(owner_id, "owner id")?;
        single_component(video_id, "video id")?;

        Ok(Self {
            dir: root
                .join(owner_id)
                .join(video_id)
                .join(Uuid::new_v4().simple().to_string()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local path for the raw upload. Only the object key's file name is
    /// kept so the source always lands inside the workspace.
    pub fn source_path(&self, filename: &str) -> Result<PathBuf, JobError> {
        let name = Path::new(filename)
            .file_name()
            .ok_or_else(|| JobError::InvalidJob(format!("filename {:?} has no file name", filename)))?;
        Ok(self.dir.join(name))
    }

    /// Recursively removes the workspace. Never fails; a missing directory
    /// counts as already clean. The per-video parent goes too once no other
    /// attempt is using it.
    pub fn cleanup(&self) {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!("Removed scratch workspace {}", self.dir.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove scratch workspace {}: {}",
                self.dir.display(),
                e
            ),
        }

        // Fails while a sibling attempt still has its directory.
        if let Some(parent) = self.dir.parent() {
            let _ = std::fs::remove_dir(parent);
        }
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_removes_tree_and_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let workspace = ScratchWorkspace::new(root.path(), "u1", "v1").unwrap();
        std::fs::create_dir_all(workspace.dir().join("nested")).unwrap();
        std::fs::write(workspace.dir().join("nested/file.bin"), b"x").unwrap();

        workspace.cleanup();
        assert!(!workspace.dir().exists());

        workspace.cleanup();
        workspace.cleanup();
        assert!(root.path().join("u1").exists());
    }

    #[test]
    fn drop_removes_workspace() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let workspace = ScratchWorkspace::new(root.path(), "u1", "v1").unwrap();
            std::fs::create_dir_all(workspace.dir()).unwrap();
            workspace.dir().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn source_path_keeps_only_file_name() {
        let workspace = ScratchWorkspace::new(Path::new("/transcode"), "u1", "v1").unwrap();
        assert_eq!(
            workspace.source_path("u1/v1/in.mp4").unwrap(),
            workspace.dir().join("in.mp4")
        );
        assert_eq!(
            workspace.source_path("../../etc/passwd").unwrap(),
            workspace.dir().join("passwd")
        );
        assert!(workspace.dir().starts_with("/transcode/u1/v1"));
        assert!(workspace.source_path("..").is_err());
    }

    #[test]
    fn attempts_for_the_same_video_do_not_share_a_directory() {
        let root = tempfile::tempdir().unwrap();
        let first = ScratchWorkspace::new(root.path(), "u1", "v1").unwrap();
        let second = ScratchWorkspace::new(root.path(), "u1", "v1").unwrap();
        assert_ne!(first.dir(), second.dir());

        for workspace in [&first, &second] {
            std::fs::create_dir_all(workspace.dir()).unwrap();
            std::fs::write(workspace.source_path("in.mp4").unwrap(), b"x").unwrap();
        }

        second.cleanup();
        assert!(first.source_path("in.mp4").unwrap().exists());
        assert!(root.path().join("u1/v1").exists());

        first.cleanup();
        assert!(!root.path().join("u1/v1").exists());
    }

    #[test]
    fn rejects_ids_that_escape_the_root() {
        for (owner, video) in [("..", "v1"), ("u1", "a/b"), ("", "v1"), ("/abs", "v1")] {
            let result = ScratchWorkspace::new(Path::new("/transcode"), owner, video);
            assert!(matches!(result, Err(JobError::InvalidJob(_))), "{owner}/{video}");
        }
    }
}
