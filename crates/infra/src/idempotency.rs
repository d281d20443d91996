use std::time::Duration;

use civicdesk_domain::DomainResult;
use civicdesk_domain::complaint::Complaint;
use civicdesk_domain::error::DomainError;
use civicdesk_domain::ports::BoxFuture;
use civicdesk_domain::ports::idempotency::{
    ClaimOutcome, SubmissionKey, SubmissionState, SubmissionStore,
};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

const DEFAULT_PREFIX: &str = "civicdesk";
const CLAIM_ATTEMPTS: usize = 2;

#[derive(Clone)]
pub struct RedisSubmissionStore {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisSubmissionStore {
    pub async fn connect(redis_url: &str) -> DomainResult<Self> {
        let client = redis::Client::open(redis_url).map_err(redis_error)?;
        let manager = ConnectionManager::new(client).await.map_err(redis_error)?;
        tracing::info!("submission store connected to redis");
        Ok(Self {
            manager,
            prefix: DEFAULT_PREFIX.to_string(),
        })
    }

    fn ttl_ms(ttl: Duration) -> u64 {
        u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
    }
}

fn redis_error(err: redis::RedisError) -> DomainError {
    tracing::error!(error = %err, "redis command failed");
    DomainError::Store(format!("submission store: {err}"))
}

fn encode(state: &SubmissionState) -> DomainResult<String> {
    serde_json::to_string(state)
        .map_err(|err| DomainError::Store(format!("invalid submission entry: {err}")))
}

fn decode(payload: &str) -> DomainResult<SubmissionState> {
    serde_json::from_str(payload)
        .map_err(|err| DomainError::Store(format!("invalid submission entry: {err}")))
}

impl SubmissionStore for RedisSubmissionStore {
    fn claim(
        &self,
        key: &SubmissionKey,
        ttl: Duration,
    ) -> BoxFuture<'_, DomainResult<ClaimOutcome>> {
        let cache_key = key.cache_key(&self.prefix);
        Box::pin(async move {
            let pending = encode(&SubmissionState::Pending)?;
            let ttl_ms = Self::ttl_ms(ttl);
            let mut conn = self.manager.clone();
            // The holder may expire or release between SET NX and GET.
            for _ in 0..CLAIM_ATTEMPTS {
                let claimed: Option<String> = redis::cmd("SET")
                    .arg(&cache_key)
                    .arg(&pending)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_ms)
                    .query_async(&mut conn)
                    .await
                    .map_err(redis_error)?;
                if claimed.is_some() {
                    return Ok(ClaimOutcome::Claimed);
                }

                let existing: Option<String> =
                    conn.get(&cache_key).await.map_err(redis_error)?;
                if let Some(payload) = existing {
                    return Ok(ClaimOutcome::Existing(decode(&payload)?));
                }
            }
            Err(DomainError::Conflict)
        })
    }

    fn record(
        &self,
        key: &SubmissionKey,
        complaint: &Complaint,
        ttl: Duration,
    ) -> BoxFuture<'_, DomainResult<()>> {
        let cache_key = key.cache_key(&self.prefix);
        let state = SubmissionState::Filed(Box::new(complaint.clone()));
        Box::pin(async move {
            let payload = encode(&state)?;
            let mut conn = self.manager.clone();
            let _: () = redis::cmd("SET")
                .arg(&cache_key)
                .arg(payload)
                .arg("PX")
                .arg(Self::ttl_ms(ttl))
                .query_async(&mut conn)
                .await
                .map_err(redis_error)?;
            Ok(())
        })
    }

    fn release(&self, key: &SubmissionKey) -> BoxFuture<'_, DomainResult<()>> {
        let cache_key = key.cache_key(&self.prefix);
        Box::pin(async move {
            let mut conn = self.manager.clone();
            let _: () = conn.del(&cache_key).await.map_err(redis_error)?;
            Ok(())
        })
    }
}
