use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::ports::{BankClient, BankError, BankIssuer};

pub const DIRECTORY_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cached list of banks a user can pick from. Readers never block the
/// refresher: every refresh swaps in a whole new list.
pub struct IssuerDirectory {
    name: &'static str,
    inner: ArcSwap<Vec<BankIssuer>>,
}

impl IssuerDirectory {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn issuers(&self) -> Arc<Vec<BankIssuer>> {
        self.inner.load_full()
    }

    pub fn is_loaded(&self) -> bool {
        !self.inner.load().is_empty()
    }

    /// Replaces the cached list with the bank's current directory. The
    /// previous list stays in place if the bank cannot be reached.
    pub async fn refresh(&self, bank: &dyn BankClient) -> Result<usize, BankError> {
        let issuers = bank.directory().await?;
        let count = issuers.len();
        self.inner.store(Arc::new(issuers));
        Ok(count)
    }

    /// Refreshes now and then every `refresh_interval`.
    pub fn start(
        self: &Arc<Self>,
        bank: Arc<dyn BankClient>,
        refresh_interval: Duration,
    ) -> JoinHandle<()> {
        let directory = self.clone();
        tokio::spawn(async move {
            loop {
                tracing::info!("updating {} issuer list", directory.name);
                match directory.refresh(bank.as_ref()).await {
                    Ok(count) => tracing::info!(
                        "finished updating {} issuer list ({} issuers)",
                        directory.name,
                        count
                    ),
                    Err(e) => tracing::error!(
                        "failed to update {} issuer list: {}",
                        directory.name,
                        e
                    ),
                }
                sleep(refresh_interval).await;
            }
        })
    }
}
