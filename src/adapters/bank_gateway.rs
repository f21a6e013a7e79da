use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use crate::domain::{BankStatus, ConsumerAttributes};
use crate::ports::{
    BankClient, BankError, BankIssuer, StartRequest, StartedTransaction, StatusReport,
};

type GatewayBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

#[derive(Debug, Serialize)]
struct StartTransactionBody<'a> {
    issuer_id: &'a str,
    purchase_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<&'a str>,
    description: &'a str,
    entrance_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartTransactionResponse {
    transaction_id: String,
    issuer_authentication_url: String,
}

/// Response from the gateway's `/transactions/{id}` endpoint
#[derive(Debug, Deserialize)]
struct TransactionStatusResponse {
    status: String,
    #[serde(default)]
    consumer_name: Option<String>,
    #[serde(default)]
    consumer_iban: Option<String>,
    #[serde(default)]
    consumer_bic: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl TransactionStatusResponse {
    fn into_report(self) -> StatusReport {
        let status = parse_status(&self.status);
        let consumer = (status == BankStatus::Success).then(|| ConsumerAttributes {
            name: self.consumer_name.unwrap_or_default(),
            iban: self.consumer_iban.unwrap_or_default(),
            bic: self.consumer_bic.unwrap_or_default(),
            identity: self.attributes,
        });
        StatusReport { status, consumer }
    }
}

/// Statuses the gateway does not know how to classify are reported as
/// `Failure`, so they never move a transaction forward.
fn parse_status(raw: &str) -> BankStatus {
    match raw.to_ascii_lowercase().as_str() {
        "open" => BankStatus::Open,
        "success" => BankStatus::Success,
        "cancelled" => BankStatus::Cancelled,
        "expired" => BankStatus::Expired,
        _ => BankStatus::Failure,
    }
}

/// HTTP client for a bank gateway exposing the iDEAL/iDIN scheme as JSON.
#[derive(Clone)]
pub struct BankGatewayClient {
    client: Client,
    base_url: String,
    circuit_breaker: GatewayBreaker,
}

impl BankGatewayClient {
    /// Creates a new BankGatewayClient with the specified base URL
    pub fn new(base_url: String) -> Self {
        Self::with_circuit_breaker(base_url, 3, 60)
    }

    /// Creates a new BankGatewayClient with custom circuit breaker configuration
    pub fn with_circuit_breaker(
        base_url: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        BankGatewayClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn guarded<T, F>(&self, request: F) -> Result<T, BankError>
    where
        F: Future<Output = Result<T, BankError>>,
    {
        match self.circuit_breaker.call(request).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(BankError::CircuitBreakerOpen(
                "bank gateway circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl BankClient for BankGatewayClient {
    async fn directory(&self) -> Result<Vec<BankIssuer>, BankError> {
        let url = self.url("directory");
        let client = self.client.clone();

        self.guarded(async move {
            let response = client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(BankError::UnexpectedStatus(response.status().as_u16()));
            }
            let issuers = response.json::<Vec<BankIssuer>>().await?;
            Ok(issuers)
        })
        .await
    }

    async fn start_transaction(
        &self,
        request: &StartRequest,
    ) -> Result<StartedTransaction, BankError> {
        let url = self.url("transactions");
        let client = self.client.clone();
        let body = StartTransactionBody {
            issuer_id: &request.issuer_id,
            purchase_id: &request.purchase_id,
            amount: request.amount.as_deref(),
            description: &request.description,
            entrance_code: &request.entrance_code,
        };

        self.guarded(async move {
            let response = client.post(&url).json(&body).send().await?;
            if !response.status().is_success() {
                return Err(BankError::UnexpectedStatus(response.status().as_u16()));
            }
            let started = response.json::<StartTransactionResponse>().await?;
            if started.transaction_id.is_empty() {
                return Err(BankError::InvalidResponse(
                    "empty transaction id".to_string(),
                ));
            }
            Ok(StartedTransaction {
                transaction_id: started.transaction_id,
                issuer_authentication_url: started.issuer_authentication_url,
            })
        })
        .await
    }

    async fn transaction_status(&self, transaction_id: &str) -> Result<StatusReport, BankError> {
        let url = self.url(&format!("transactions/{}", transaction_id));
        let client = self.client.clone();
        let id = transaction_id.to_string();

        self.guarded(async move {
            let response = client.get(&url).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(BankError::TransactionNotFound(id));
            }
            if !response.status().is_success() {
                return Err(BankError::UnexpectedStatus(response.status().as_u16()));
            }
            let status = response.json::<TransactionStatusResponse>().await?;
            Ok(status.into_report())
        })
        .await
    }
}
