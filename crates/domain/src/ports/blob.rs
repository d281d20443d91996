use crate::DomainResult;
use crate::ports::BoxFuture;

/// Opaque photo storage. Returns the path reference handed back to clients.
pub trait BlobStore: Send + Sync {
    fn store(
        &self,
        file_name: Option<&str>,
        bytes: Vec<u8>,
    ) -> BoxFuture<'_, DomainResult<String>>;

    /// Deletes a photo previously returned by `store`. Missing photos are not an error.
    fn remove(&self, path: &str) -> BoxFuture<'_, DomainResult<()>>;
}
