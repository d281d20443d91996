use std::path::PathBuf;

use civicdesk_domain::DomainResult;
use civicdesk_domain::blob::blob_key;
use civicdesk_domain::error::DomainError;
use civicdesk_domain::ports::BoxFuture;
use civicdesk_domain::ports::blob::BlobStore;

/// Writes photo uploads to a directory on local disk.
///
/// Returned paths are `<upload_dir>/<key>`, the same form the files are served under.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalBlobStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        let root = upload_dir.into();
        let public_prefix = root
            .to_string_lossy()
            .trim_end_matches('/')
            .trim_start_matches("./")
            .to_string();
        Self {
            root,
            public_prefix,
        }
    }

    /// Maps a returned path back to its file, refusing anything outside the upload dir.
    fn file_for(&self, path: &str) -> DomainResult<PathBuf> {
        path.strip_prefix(self.public_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty() && !key.contains('/') && !key.contains(".."))
            .map(|key| self.root.join(key))
            .ok_or_else(|| DomainError::Store(format!("photo path '{path}' is not an upload")))
    }
}

impl BlobStore for LocalBlobStore {
    fn store(
        &self,
        file_name: Option<&str>,
        bytes: Vec<u8>,
    ) -> BoxFuture<'_, DomainResult<String>> {
        let key = blob_key(file_name);
        Box::pin(async move {
            tokio::fs::create_dir_all(&self.root)
                .await
                .map_err(|err| DomainError::Store(format!("create upload dir failed: {err}")))?;
            let target = self.root.join(&key);
            tokio::fs::write(&target, &bytes)
                .await
                .map_err(|err| DomainError::Store(format!("write upload failed: {err}")))?;
            tracing::debug!(path = %target.display(), size = bytes.len(), "stored photo");
            Ok(format!("{}/{key}", self.public_prefix))
        })
    }

    fn remove(&self, path: &str) -> BoxFuture<'_, DomainResult<()>> {
        let target = self.file_for(path);
        Box::pin(async move {
            let target = target?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {
                    tracing::debug!(path = %target.display(), "removed photo");
                    Ok(())
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(DomainError::Store(format!("remove upload failed: {err}"))),
            }
        })
    }
}
