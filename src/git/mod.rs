//! Git snapshot source built on gix.

use std::path::{Path, PathBuf};

use gix::Repository;
use tracing::debug;

use crate::core::{Error, Result};

/// Git repository wrapper yielding the Java blobs of a revision.
pub struct GitSource {
    /// The gix repository handle.
    repo: Repository,
    /// Repository root path.
    root: PathBuf,
}

impl GitSource {
    /// Open a git repository at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let repo =
            gix::open(path).map_err(|e| Error::git(format!("failed to open repository: {e}")))?;
        let root = repo
            .work_dir()
            .ok_or_else(|| Error::git("not a work tree"))?
            .to_path_buf();

        Ok(Self { repo, root })
    }

    /// Get the repository root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the HEAD commit SHA.
    pub fn head_revision(&self) -> Result<String> {
        let head = self
            .repo
            .head_id()
            .map_err(|e| Error::git(format!("failed to get HEAD: {e}")))?;
        Ok(head.to_string())
    }

    /// Get the fetch URL of the `origin` remote, if configured.
    pub fn remote_url(&self) -> Option<String> {
        self.repo
            .find_remote("origin")
            .ok()
            .and_then(|remote| {
                remote
                    .url(gix::remote::Direction::Fetch)
                    .map(|url| url.to_bstring().to_string())
            })
    }

    /// Collect `(path, content)` for every `.java` blob reachable from
    /// the HEAD commit's tree.
    pub fn java_blobs(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let commit = self
            .repo
            .head_commit()
            .map_err(|e| Error::git(format!("failed to resolve HEAD commit: {e}")))?;
        let tree = commit
            .tree()
            .map_err(|e| Error::git(format!("failed to read commit tree: {e}")))?;

        let mut recorder = gix::traverse::tree::Recorder::default();
        tree.traverse()
            .breadthfirst(&mut recorder)
            .map_err(|e| Error::git(format!("failed to traverse tree: {e}")))?;

        let mut blobs = Vec::new();
        for entry in recorder.records {
            if !entry.mode.is_blob() {
                continue;
            }
            let path = entry.filepath.to_string();
            if !path.ends_with(".java") {
                continue;
            }
            let object = self
                .repo
                .find_object(entry.oid)
                .map_err(|e| Error::git(format!("failed to read blob {}: {e}", entry.oid)))?;
            blobs.push((path, object.detach().data));
        }
        blobs.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(count = blobs.len(), "collected java blobs from HEAD");
        Ok(blobs)
    }
}
