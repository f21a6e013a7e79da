#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use idx_issuer::clock::ManualClock;
use idx_issuer::config::LifecyclePolicy;
use idx_issuer::domain::{BankStatus, ConsumerAttributes};
use idx_issuer::ports::{
    BankClient, BankError, BankIssuer, CredentialIssuer, IssuanceError, IssuanceRequest,
    IssuanceSession, StartRequest, StartedTransaction, StatusReport,
};
use idx_issuer::services::{ManagerSettings, TransactionManager, TransactionStore};

/// Scripted bank: every status call answers with whatever was set last.
pub struct FakeBank {
    status: Mutex<Option<BankStatus>>,
    started: Mutex<Vec<StartRequest>>,
    issuers: Mutex<Vec<BankIssuer>>,
    next_id: AtomicUsize,
    status_calls: AtomicUsize,
    fail_start: AtomicBool,
    delete_from: Mutex<Option<TransactionStore>>,
}

impl FakeBank {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(Some(BankStatus::Open)),
            started: Mutex::new(Vec::new()),
            issuers: Mutex::new(vec![BankIssuer {
                issuer_id: "INGBNL2A".to_string(),
                issuer_name: "ING".to_string(),
                country: "Nederland".to_string(),
            }]),
            next_id: AtomicUsize::new(1),
            status_calls: AtomicUsize::new(0),
            fail_start: AtomicBool::new(false),
            delete_from: Mutex::new(None),
        }
    }

    pub fn set_status(&self, status: BankStatus) {
        *self.status.lock().unwrap() = Some(status);
    }

    /// Makes status calls fail with a transport-level error.
    pub fn set_unreachable(&self) {
        *self.status.lock().unwrap() = None;
    }

    pub fn fail_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    /// Removes the polled transaction from `store` while the status call is
    /// in flight, as a concurrent delete or eviction would.
    pub fn delete_during_status(&self, store: TransactionStore) {
        *self.delete_from.lock().unwrap() = Some(store);
    }

    pub fn set_issuers(&self, issuers: Vec<BankIssuer>) {
        *self.issuers.lock().unwrap() = issuers;
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn last_start(&self) -> StartRequest {
        self.started.lock().unwrap().last().cloned().expect("no transaction started")
    }

    pub fn start_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }
}

pub fn consumer() -> ConsumerAttributes {
    ConsumerAttributes {
        name: "J. Jansen".to_string(),
        iban: "NL91ABNA0417164300".to_string(),
        bic: "ABNANL2A".to_string(),
        identity: BTreeMap::from([
            ("urn:nl:bvn:bankid:1.0:consumer.initials".to_string(), "J".to_string()),
            (
                "urn:nl:bvn:bankid:1.0:consumer.legallastname".to_string(),
                "Jansen".to_string(),
            ),
            (
                "urn:nl:bvn:bankid:1.0:consumer.dateofbirth".to_string(),
                "19800102".to_string(),
            ),
            ("urn:nl:bvn:bankid:1.0:consumer.gender".to_string(), "2".to_string()),
        ]),
    }
}

#[async_trait]
impl BankClient for FakeBank {
    async fn directory(&self) -> Result<Vec<BankIssuer>, BankError> {
        Ok(self.issuers.lock().unwrap().clone())
    }

    async fn start_transaction(
        &self,
        request: &StartRequest,
    ) -> Result<StartedTransaction, BankError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(BankError::UnexpectedStatus(500));
        }
        let id = format!("trx-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.started.lock().unwrap().push(request.clone());
        Ok(StartedTransaction {
            issuer_authentication_url: format!("https://bank.example.nl/auth/{}", id),
            transaction_id: id,
        })
    }

    async fn transaction_status(&self, transaction_id: &str) -> Result<StatusReport, BankError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let store = self.delete_from.lock().unwrap().clone();
        if let Some(store) = store {
            store.delete(transaction_id).await;
        }
        // Let concurrent callers interleave with this call.
        tokio::task::yield_now().await;

        let status = *self.status.lock().unwrap();
        match status {
            Some(status) => Ok(StatusReport {
                status,
                consumer: (status == BankStatus::Success).then(consumer),
            }),
            None => Err(BankError::InvalidResponse("connection reset".to_string())),
        }
    }
}

#[derive(Default)]
pub struct FakeIssuer {
    fail: AtomicBool,
    requests: Mutex<Vec<IssuanceRequest>>,
}

impl FakeIssuer {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<IssuanceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialIssuer for FakeIssuer {
    async fn start_issuance(
        &self,
        request: &IssuanceRequest,
    ) -> Result<IssuanceSession, IssuanceError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(IssuanceError::UnexpectedStatus(502));
        }
        Ok(IssuanceSession {
            session_pointer: serde_json::json!({
                "u": "https://irma.example.nl/irma/session/abc",
                "irmaqr": "issuing"
            }),
            token: "session-token".to_string(),
        })
    }
}

pub struct Fixture {
    pub manager: Arc<TransactionManager>,
    pub bank: Arc<FakeBank>,
    pub issuer: Arc<FakeIssuer>,
    pub clock: Arc<ManualClock>,
}

pub fn settings() -> ManagerSettings {
    ManagerSettings {
        credential_id: "pbdf.pbdf.ideal".to_string(),
        payment_amounts: vec!["1".to_string()],
        donation_amounts: vec!["5".to_string(), "10".to_string()],
        message: "iDEAL authentication".to_string(),
        donation_message: "Donation".to_string(),
    }
}

pub fn fixture() -> Fixture {
    fixture_with(settings())
}

pub fn fixture_with(settings: ManagerSettings) -> Fixture {
    build(settings, LifecyclePolicy::default())
}

pub fn fixture_with_policy(policy: LifecyclePolicy) -> Fixture {
    build(settings(), policy)
}

fn build(settings: ManagerSettings, policy: LifecyclePolicy) -> Fixture {
    let bank = Arc::new(FakeBank::new());
    let issuer = Arc::new(FakeIssuer::default());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
    ));
    let manager = Arc::new(TransactionManager::new(
        bank.clone(),
        issuer.clone(),
        clock.clone(),
        settings,
    )
    .with_policy(policy));

    Fixture {
        manager,
        bank,
        issuer,
        clock,
    }
}
