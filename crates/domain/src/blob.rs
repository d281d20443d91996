use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::DomainResult;
use crate::ports::BoxFuture;
use crate::ports::blob::BlobStore;
use crate::util::uuid_v7_without_dashes;

/// Extension kept on stored photos, lowercased. Unknown or odd extensions are dropped.
pub fn photo_extension(file_name: Option<&str>) -> Option<String> {
    let (_, ext) = file_name?.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let valid =
        !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|ch| ch.is_ascii_alphanumeric());
    valid.then_some(ext)
}

pub fn blob_key(file_name: Option<&str>) -> String {
    match photo_extension(file_name) {
        Some(ext) => format!("{}.{ext}", uuid_v7_without_dashes()),
        None => uuid_v7_without_dashes(),
    }
}

#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(path).cloned()
    }

    pub async fn blob_count(&self) -> usize {
        self.blobs.read().await.len()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn store(
        &self,
        file_name: Option<&str>,
        bytes: Vec<u8>,
    ) -> BoxFuture<'_, DomainResult<String>> {
        let path = format!("memory/{}", blob_key(file_name));
        let blobs = self.blobs.clone();
        Box::pin(async move {
            blobs.write().await.insert(path.clone(), bytes);
            Ok(path)
        })
    }

    fn remove(&self, path: &str) -> BoxFuture<'_, DomainResult<()>> {
        let path = path.to_string();
        let blobs = self.blobs.clone();
        Box::pin(async move {
            blobs.write().await.remove(&path);
            Ok(())
        })
    }
}
