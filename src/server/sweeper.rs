use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Periodically drops denylist and refresh rows that are past `expires_at`.
/// A revoked id is redundant once its token would fail the expiry check anyway.
pub struct RevocationSweeper {
    revocation_store: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    cancellation_token: CancellationToken,
}

impl RevocationSweeper {
    pub fn new(
        revocation_store: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            revocation_store,
            clock,
            interval,
            cancellation_token,
        }
    }

    pub async fn tick_once(&self) -> Result<SweepReport, StoreError> {
        let report = self
            .revocation_store
            .sweep_expired(self.clock.now())
            .await?;
        if report != SweepReport::default() {
            tracing::info!(
                revoked_access_tokens = report.revoked_access_tokens,
                refresh_tokens = report.refresh_tokens,
                "swept expired rows"
            );
        }
        Ok(report)
    }

    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("Sweeper shutting down...");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick_once().await {
                        tracing::error!("Sweeper error: {:#?}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::*;
    use crate::infra_memory::MemoryRevocationStore;
    use chrono::{Duration as ChronoDuration, Utc};

    #[tokio::test]
    async fn tick_drops_expired_denylist_entries() {
        let store = Arc::new(MemoryRevocationStore::new());
        let now = Utc::now();
        let expired = RevokedAccessToken {
            token_id: TokenId::new_random(),
            user_id: UserId::new_random(),
            expires_at: now - ChronoDuration::seconds(5),
        };
        store.revoke(&expired).await.unwrap();

        let sweeper = RevocationSweeper::new(
            store.clone(),
            Arc::new(SystemClock),
            Duration::from_secs(60),
            CancellationToken::new(),
        );
        let report = sweeper.tick_once().await.unwrap();

        assert_eq!(report.revoked_access_tokens, 1);
        assert_eq!(store.revoked_count(), 0);
    }

    #[tokio::test]
    async fn run_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        let sweeper = RevocationSweeper::new(
            Arc::new(MemoryRevocationStore::new()),
            Arc::new(SystemClock),
            Duration::from_millis(10),
            cancel.clone(),
        );

        let handle = tokio::spawn(async move { sweeper.run().await });
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
