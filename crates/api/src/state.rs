use std::sync::Arc;

use civicdesk_domain::idempotency::{InMemorySubmissionStore, SubmissionConfig, SubmissionGuard};
use civicdesk_domain::ports::blob::BlobStore;
use civicdesk_domain::ports::complaints::ComplaintRepository;
use civicdesk_domain::ports::idempotency::SubmissionStore;
use civicdesk_domain::service::ComplaintService;
use civicdesk_infra::blob::LocalBlobStore;
use civicdesk_infra::config::AppConfig;
use civicdesk_infra::db::DbConfig;
use civicdesk_infra::idempotency::RedisSubmissionStore;
use civicdesk_infra::repositories::{InMemoryComplaintRepository, SurrealComplaintRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub complaints: ComplaintService,
    pub submissions: SubmissionGuard,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&config.upload_dir));

        match config.data_backend.to_ascii_lowercase().as_str() {
            "surreal" => {
                let db_config = DbConfig::from_app_config(&config);
                let repository = SurrealComplaintRepository::new(&db_config).await?;
                let store = RedisSubmissionStore::connect(&config.redis_url).await?;
                tracing::info!(backend = "surreal", "complaint store ready");
                Ok(Self::assemble(
                    config,
                    Arc::new(repository),
                    blobs,
                    Arc::new(store),
                ))
            }
            "memory" => {
                tracing::warn!(
                    backend = "memory",
                    "complaints are kept in process memory and lost on restart"
                );
                Ok(Self::assemble(
                    config,
                    Arc::new(InMemoryComplaintRepository::new()),
                    blobs,
                    Arc::new(InMemorySubmissionStore::new()),
                ))
            }
            other => {
                anyhow::bail!("unsupported data_backend '{other}' (expected memory or surreal)")
            }
        }
    }

    pub fn assemble(
        config: AppConfig,
        repository: Arc<dyn ComplaintRepository>,
        blobs: Arc<dyn BlobStore>,
        submission_store: Arc<dyn SubmissionStore>,
    ) -> Self {
        Self {
            config,
            complaints: ComplaintService::new(repository, blobs),
            submissions: SubmissionGuard::new(submission_store, SubmissionConfig::default()),
        }
    }
}
