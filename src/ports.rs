//! Collaborator interfaces the lifecycle manager depends on.
//! Concrete HTTP implementations live in `adapters`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{BankStatus, ConsumerAttributes};

#[derive(Error, Debug)]
pub enum BankError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Bank gateway returned status {0}")]
    UnexpectedStatus(u16),
    #[error("Transaction not found at bank: {0}")]
    TransactionNotFound(String),
    #[error("Invalid response from bank gateway: {0}")]
    InvalidResponse(String),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

#[derive(Error, Debug)]
pub enum IssuanceError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Credential issuer returned status {0}")]
    UnexpectedStatus(u16),
    #[error("Invalid response from credential issuer: {0}")]
    InvalidResponse(String),
}

/// A bank listed in the scheme's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankIssuer {
    pub issuer_id: String,
    pub issuer_name: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone)]
pub struct StartRequest {
    pub issuer_id: String,
    pub purchase_id: String,
    /// Amount in cents. Absent for identity transactions.
    pub amount: Option<String>,
    pub description: String,
    pub entrance_code: String,
}

#[derive(Debug, Clone)]
pub struct StartedTransaction {
    pub transaction_id: String,
    pub issuer_authentication_url: String,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: BankStatus,
    /// Present only when `status` is `Success`.
    pub consumer: Option<ConsumerAttributes>,
}

#[async_trait]
pub trait BankClient: Send + Sync {
    async fn directory(&self) -> Result<Vec<BankIssuer>, BankError>;

    async fn start_transaction(
        &self,
        request: &StartRequest,
    ) -> Result<StartedTransaction, BankError>;

    async fn transaction_status(&self, transaction_id: &str) -> Result<StatusReport, BankError>;
}

#[derive(Debug, Clone)]
pub struct IssuanceRequest {
    pub credential_id: String,
    pub validity: DateTime<Utc>,
    pub attributes: BTreeMap<String, String>,
}

/// Handle the holder's wallet uses to complete issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceSession {
    #[serde(rename = "sessionPointer")]
    pub session_pointer: serde_json::Value,
    pub token: String,
}

#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn start_issuance(
        &self,
        request: &IssuanceRequest,
    ) -> Result<IssuanceSession, IssuanceError>;
}
