//! Transaction lifecycle: start, return and delete.
//!
//! All three operations share one [`TransactionStore`] with the
//! [`Sweeper`](super::sweeper::Sweeper). No record lock is ever held across
//! a call to the bank or the credential issuer; a record is looked up again
//! after every upstream call before it is written.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::config::LifecyclePolicy;
use crate::domain::{
    attributes_for, credential_validity, BankStatus, ConsumerAttributes, EntranceCode, Purpose,
    TransactionRecord, TransactionStatus,
};
use crate::ports::{
    BankClient, BankError, CredentialIssuer, IssuanceError, IssuanceRequest, IssuanceSession,
    StartRequest,
};
use crate::services::rate_limiter::RateLimiter;
use crate::services::sweeper::Sweeper;
use crate::services::transaction_store::{SharedRecord, TransactionStore};
use crate::utils::random::random_alphanumeric;

pub const ENTRANCE_CODE_LEN: usize = 40;
pub const PURCHASE_ID_LEN: usize = 10;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("amount '{0}' is not allowed")]
    InvalidAmount(String),
    #[error("failed to generate entrance code: {0}")]
    EntranceCode(rand::Error),
    #[error("failed to generate purchase id: {0}")]
    PurchaseId(rand::Error),
    #[error("bank request failed: {0}")]
    Bank(#[from] BankError),
    #[error("bank assigned an already tracked transaction id: {0}")]
    DuplicateTransaction(String),
    #[error("transaction {0} not found")]
    NotFound(String),
    #[error("entrance code mismatch for transaction {0}")]
    EntranceCodeMismatch(String),
    #[error("status check too soon, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },
    #[error("transaction is still open, retry after {retry_after}s")]
    Open { retry_after: u64 },
    #[error("transaction was cancelled")]
    Cancelled,
    #[error("transaction expired")]
    Expired,
    #[error("transaction status is inconclusive")]
    Inconclusive,
    #[error("transaction {0} is not finished")]
    NotFinished(String),
    #[error("cannot start issuance session: {0}")]
    Issuance(#[from] IssuanceError),
}

impl TransactionError {
    /// Code sent to the client as `error:<code>`.
    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::InvalidAmount(_) => "invalid-amount",
            TransactionError::EntranceCode(_) => "no-ec",
            TransactionError::PurchaseId(_) => "no-pid",
            TransactionError::Bank(_)
            | TransactionError::DuplicateTransaction(_)
            | TransactionError::Inconclusive => "transaction",
            TransactionError::NotFound(_) => "trxid-not-found",
            TransactionError::EntranceCodeMismatch(_) => "ec-mismatch",
            TransactionError::RateLimited { .. } => "too-many-requests",
            TransactionError::Open { .. } => "transaction-open",
            TransactionError::Cancelled => "transaction-cancelled",
            TransactionError::Expired => "transaction-expired",
            TransactionError::NotFinished(_) => "transaction-not-finished",
            TransactionError::Issuance(_) => "issuance",
        }
    }
}

/// Result of a successful return call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnOutcome {
    /// Payment confirmed, nothing to issue.
    Donated,
    Issuance(IssuanceSession),
}

/// Per-product settings of a [`TransactionManager`].
#[derive(Debug, Clone, Default)]
pub struct ManagerSettings {
    pub credential_id: String,
    pub payment_amounts: Vec<String>,
    /// Falls back to `payment_amounts` when empty.
    pub donation_amounts: Vec<String>,
    /// Description shown by the bank for authentication and identity
    /// transactions.
    pub message: String,
    pub donation_message: String,
}

impl ManagerSettings {
    fn allowed_amounts(&self, purpose: Purpose) -> &[String] {
        match purpose {
            Purpose::Donation if !self.donation_amounts.is_empty() => &self.donation_amounts,
            _ => &self.payment_amounts,
        }
    }

    fn description(&self, purpose: Purpose) -> &str {
        match purpose {
            Purpose::Donation => &self.donation_message,
            Purpose::Authentication | Purpose::Identity => &self.message,
        }
    }
}

/// What the return path does once the record lock is released.
enum Handoff {
    Donated,
    Issue(Purpose, ConsumerAttributes),
}

pub struct TransactionManager {
    store: TransactionStore,
    bank: Arc<dyn BankClient>,
    issuer: Arc<dyn CredentialIssuer>,
    clock: Arc<dyn Clock>,
    policy: LifecyclePolicy,
    rate_limiter: RateLimiter,
    settings: ManagerSettings,
}

impl TransactionManager {
    pub fn new(
        bank: Arc<dyn BankClient>,
        issuer: Arc<dyn CredentialIssuer>,
        clock: Arc<dyn Clock>,
        settings: ManagerSettings,
    ) -> Self {
        let policy = LifecyclePolicy::default();
        Self {
            store: TransactionStore::new(),
            bank,
            issuer,
            clock,
            rate_limiter: RateLimiter::new(policy.min_check_interval),
            policy,
            settings,
        }
    }

    pub fn with_policy(mut self, policy: LifecyclePolicy) -> Self {
        self.rate_limiter = RateLimiter::new(policy.min_check_interval);
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    pub fn bank(&self) -> Arc<dyn BankClient> {
        self.bank.clone()
    }

    /// Amounts accepted for authentication payments.
    pub fn payment_amounts(&self) -> &[String] {
        &self.settings.payment_amounts
    }

    /// Background sweeper working on this manager's store.
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            self.store.clone(),
            self.bank.clone(),
            self.clock.clone(),
            self.policy,
        )
    }

    /// Begins a bank transaction and returns the URL the user must be sent
    /// to.
    pub async fn start_transaction(
        &self,
        bank: &str,
        amount: Option<&str>,
        purpose: Purpose,
    ) -> Result<String, TransactionError> {
        let amount = self.check_amount(purpose, amount)?;

        let entrance_code = random_alphanumeric(ENTRANCE_CODE_LEN).map_err(|e| {
            error!(error = %e, "failed to generate fresh entrance code");
            TransactionError::EntranceCode(e)
        })?;
        let purchase_id = random_alphanumeric(PURCHASE_ID_LEN).map_err(|e| {
            error!(error = %e, "failed to generate fresh purchase id");
            TransactionError::PurchaseId(e)
        })?;

        let request = StartRequest {
            issuer_id: bank.to_string(),
            purchase_id,
            amount,
            description: self.settings.description(purpose).to_string(),
            entrance_code: entrance_code.clone(),
        };

        let started = self.bank.start_transaction(&request).await.map_err(|e| {
            error!(bank, error = %e, "failed to create transaction");
            TransactionError::Bank(e)
        })?;

        let now = self.clock.now();
        let record = TransactionRecord::new(
            started.transaction_id.clone(),
            EntranceCode::new(entrance_code),
            purpose,
            now,
            now + self.policy.first_check_delay,
        );

        if !self.store.put(record).await {
            error!(
                transaction_id = %started.transaction_id,
                "bank returned a transaction id that is already tracked"
            );
            return Err(TransactionError::DuplicateTransaction(started.transaction_id));
        }

        info!(transaction_id = %started.transaction_id, %purpose, "transaction started");
        Ok(started.issuer_authentication_url)
    }

    /// Handles a user coming back from the bank.
    pub async fn return_transaction(
        &self,
        transaction_id: &str,
        entrance_code: &str,
    ) -> Result<ReturnOutcome, TransactionError> {
        let handle = self.authorize(transaction_id, entrance_code).await?;

        let needs_check = {
            let mut record = handle.lock().await;
            if record.is_terminal() {
                false
            } else {
                let now = self.clock.now();
                if let Err(retry_after) = self.rate_limiter.try_acquire(&mut record, now) {
                    info!(transaction_id, retry_after, "status check refused, too soon after previous");
                    return Err(TransactionError::RateLimited { retry_after });
                }
                true
            }
        };

        let handoff = if needs_check {
            let report = self
                .bank
                .transaction_status(transaction_id)
                .await
                .map_err(|e| {
                    warn!(transaction_id, error = %e, "failed to request transaction status");
                    TransactionError::Bank(e)
                })?;
            info!(transaction_id, status = %report.status, "transaction status on return");

            let handle = self
                .store
                .get(transaction_id)
                .await
                .ok_or_else(|| TransactionError::NotFound(transaction_id.to_string()))?;
            let mut record = handle.lock().await;
            let changed = record.observe(report.status, report.consumer);
            let inconclusive = report.status == BankStatus::Failure;
            self.dispatch(&mut record, inconclusive, changed)?
        } else {
            let mut record = handle.lock().await;
            self.dispatch(&mut record, false, false)?
        };

        match handoff {
            Handoff::Donated => Ok(ReturnOutcome::Donated),
            Handoff::Issue(purpose, consumer) => {
                self.issue(transaction_id, purpose, &consumer).await
            }
        }
    }

    /// Removes a finished transaction on behalf of the user who started it.
    pub async fn delete_transaction(
        &self,
        transaction_id: &str,
        entrance_code: &str,
    ) -> Result<(), TransactionError> {
        let handle = self.authorize(transaction_id, entrance_code).await?;

        // Terminal statuses never change, so the check stays valid after the
        // lock is dropped.
        let status = handle.lock().await.status();
        if !status.is_terminal() {
            info!(
                transaction_id, %status,
                "transaction is not fully handled by bank, so cannot be deleted yet"
            );
            return Err(TransactionError::NotFinished(transaction_id.to_string()));
        }

        self.store.delete(transaction_id).await;
        info!(transaction_id, "transaction deleted by user");
        Ok(())
    }

    fn check_amount(
        &self,
        purpose: Purpose,
        amount: Option<&str>,
    ) -> Result<Option<String>, TransactionError> {
        if purpose == Purpose::Identity {
            return Ok(None);
        }

        let requested = amount.unwrap_or_default();
        if self
            .settings
            .allowed_amounts(purpose)
            .iter()
            .any(|allowed| allowed == requested)
        {
            Ok(Some(requested.to_string()))
        } else {
            info!(amount = requested, %purpose, "requested payment amount is not allowed");
            Err(TransactionError::InvalidAmount(requested.to_string()))
        }
    }

    async fn authorize(
        &self,
        transaction_id: &str,
        entrance_code: &str,
    ) -> Result<SharedRecord, TransactionError> {
        let handle = self.store.get(transaction_id).await.ok_or_else(|| {
            info!(transaction_id, "request for a transaction that is not tracked");
            TransactionError::NotFound(transaction_id.to_string())
        })?;

        let authorized = handle.lock().await.entrance_code().matches(entrance_code);
        if !authorized {
            warn!(transaction_id, "entrance code mismatch");
            return Err(TransactionError::EntranceCodeMismatch(
                transaction_id.to_string(),
            ));
        }

        Ok(handle)
    }

    /// Decides what a return call yields for the record's current status and
    /// schedules the record's next deadline accordingly. `changed` is set when
    /// this call's bank report moved the record to its current status.
    fn dispatch(
        &self,
        record: &mut TransactionRecord,
        inconclusive: bool,
        changed: bool,
    ) -> Result<Handoff, TransactionError> {
        let now = self.clock.now();

        if inconclusive {
            record.set_recheck_not_before(now + self.policy.recheck_interval);
            return Err(TransactionError::Inconclusive);
        }

        match record.status() {
            TransactionStatus::Success => {
                // Issuance stays retryable until returned_retention elapses.
                // A success first seen by the sweeper keeps its own deadline.
                if changed {
                    record.set_recheck_not_before(now + self.policy.returned_retention);
                }
                if !record.purpose().issues_credential() {
                    return Ok(Handoff::Donated);
                }
                let consumer = record.consumer().cloned().unwrap_or_default();
                Ok(Handoff::Issue(record.purpose(), consumer))
            }
            TransactionStatus::Open => {
                record.set_recheck_not_before(now + self.policy.recheck_interval);
                let retry_after = self
                    .rate_limiter
                    .retry_after(record, now)
                    .unwrap_or_else(|| self.rate_limiter.min_interval().num_seconds().max(1) as u64);
                Err(TransactionError::Open { retry_after })
            }
            TransactionStatus::Cancelled => {
                record.extend_recheck_not_before(now + self.policy.returned_retention);
                Err(TransactionError::Cancelled)
            }
            TransactionStatus::Expired => {
                record.extend_recheck_not_before(now + self.policy.returned_retention);
                Err(TransactionError::Expired)
            }
            TransactionStatus::Unknown => {
                record.set_recheck_not_before(now + self.policy.recheck_interval);
                Err(TransactionError::Inconclusive)
            }
        }
    }

    async fn issue(
        &self,
        transaction_id: &str,
        purpose: Purpose,
        consumer: &ConsumerAttributes,
    ) -> Result<ReturnOutcome, TransactionError> {
        let request = IssuanceRequest {
            credential_id: self.settings.credential_id.clone(),
            validity: credential_validity(self.clock.now()),
            attributes: attributes_for(purpose, consumer),
        };

        match self.issuer.start_issuance(&request).await {
            Ok(session) => {
                info!(transaction_id, credential = %request.credential_id, "issuance session started");
                Ok(ReturnOutcome::Issuance(session))
            }
            Err(e) => {
                error!(transaction_id, error = %e, "cannot start issuance session");
                Err(TransactionError::Issuance(e))
            }
        }
    }
}
