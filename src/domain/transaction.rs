//! Transaction domain entity.
//! Framework-agnostic representation of a bank transaction tracked by the
//! lifecycle manager.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use subtle::ConstantTimeEq;

pub type TransactionId = String;

/// What a finished transaction is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// iDEAL payment that results in a credential.
    Authentication,
    /// iDEAL payment without credential issuance.
    Donation,
    /// iDIN identity assertion that results in a credential.
    Identity,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Authentication => "authentication",
            Purpose::Donation => "donation",
            Purpose::Identity => "identity",
        }
    }

    pub fn issues_credential(&self) -> bool {
        !matches!(self, Purpose::Donation)
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last known status of a tracked transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Unknown,
    Open,
    Success,
    Cancelled,
    Expired,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Success | TransactionStatus::Cancelled | TransactionStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Unknown => "unknown",
            TransactionStatus::Open => "open",
            TransactionStatus::Success => "success",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status as reported by the bank. `Failure` means the bank could not give
/// a definitive answer and never changes a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankStatus {
    Open,
    Success,
    Cancelled,
    Expired,
    Failure,
}

impl BankStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankStatus::Open => "open",
            BankStatus::Success => "success",
            BankStatus::Cancelled => "cancelled",
            BankStatus::Expired => "expired",
            BankStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for BankStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consumer data released by the bank on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerAttributes {
    pub name: String,
    pub iban: String,
    pub bic: String,
    /// Raw identity attributes (iDIN), keyed by SAML attribute name.
    pub identity: BTreeMap<String, String>,
}

/// Secret handed to the browser that started a transaction. Whoever holds it
/// may read the transaction's result.
#[derive(Clone)]
pub struct EntranceCode(String);

impl EntranceCode {
    pub fn new(code: String) -> Self {
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full-length comparison whose timing does not depend on the position
    /// of the first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl fmt::Debug for EntranceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EntranceCode(..)")
    }
}

/// One bank transaction started by the merchant.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    transaction_id: TransactionId,
    entrance_code: EntranceCode,
    purpose: Purpose,
    started_at: DateTime<Utc>,
    last_status_check_at: Option<DateTime<Utc>>,
    recheck_not_before: DateTime<Utc>,
    status: TransactionStatus,
    consumer: Option<ConsumerAttributes>,
}

impl TransactionRecord {
    pub fn new(
        transaction_id: TransactionId,
        entrance_code: EntranceCode,
        purpose: Purpose,
        started_at: DateTime<Utc>,
        recheck_not_before: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            entrance_code,
            purpose,
            started_at,
            last_status_check_at: None,
            recheck_not_before,
            status: TransactionStatus::Unknown,
            consumer: None,
        }
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn entrance_code(&self) -> &EntranceCode {
        &self.entrance_code
    }

    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_status_check_at(&self) -> Option<DateTime<Utc>> {
        self.last_status_check_at
    }

    pub fn recheck_not_before(&self) -> DateTime<Utc> {
        self.recheck_not_before
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn consumer(&self) -> Option<&ConsumerAttributes> {
        self.consumer.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn stamp_status_check(&mut self, at: DateTime<Utc>) {
        self.last_status_check_at = Some(at);
    }

    pub fn set_recheck_not_before(&mut self, at: DateTime<Utc>) {
        self.recheck_not_before = at;
    }

    /// Moves the recheck deadline forward to `at`, never backward.
    pub fn extend_recheck_not_before(&mut self, at: DateTime<Utc>) {
        if at > self.recheck_not_before {
            self.recheck_not_before = at;
        }
    }

    /// Applies a bank report. Returns whether the status changed.
    ///
    /// Terminal statuses are final and `Failure` carries no information, so
    /// both leave the record untouched.
    pub fn observe(&mut self, report: BankStatus, consumer: Option<ConsumerAttributes>) -> bool {
        let next = match report {
            BankStatus::Open => TransactionStatus::Open,
            BankStatus::Success => TransactionStatus::Success,
            BankStatus::Cancelled => TransactionStatus::Cancelled,
            BankStatus::Expired => TransactionStatus::Expired,
            BankStatus::Failure => return false,
        };

        if self.status.is_terminal() || next == self.status {
            return false;
        }

        self.status = next;
        if next == TransactionStatus::Success {
            self.consumer = Some(consumer.unwrap_or_default());
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> TransactionRecord {
        let now = Utc::now();
        TransactionRecord::new(
            "0030000123456789".to_string(),
            EntranceCode::new("a".repeat(40)),
            Purpose::Authentication,
            now,
            now + Duration::hours(12),
        )
    }

    #[test]
    fn test_new_record_is_unknown_and_unchecked() {
        let rec = record();
        assert_eq!(rec.status(), TransactionStatus::Unknown);
        assert!(rec.last_status_check_at().is_none());
        assert!(rec.consumer().is_none());
    }

    #[test]
    fn test_unknown_moves_to_open_then_success() {
        let mut rec = record();
        assert!(rec.observe(BankStatus::Open, None));
        assert_eq!(rec.status(), TransactionStatus::Open);
        assert!(!rec.observe(BankStatus::Open, None));

        let consumer = ConsumerAttributes {
            name: "J. Jansen".to_string(),
            ..Default::default()
        };
        assert!(rec.observe(BankStatus::Success, Some(consumer)));
        assert_eq!(rec.status(), TransactionStatus::Success);
        assert_eq!(rec.consumer().map(|c| c.name.as_str()), Some("J. Jansen"));
    }

    #[test]
    fn test_terminal_status_never_regresses() {
        for terminal in [BankStatus::Success, BankStatus::Cancelled, BankStatus::Expired] {
            let mut rec = record();
            assert!(rec.observe(terminal, None));
            let settled = rec.status();

            for report in [
                BankStatus::Open,
                BankStatus::Success,
                BankStatus::Cancelled,
                BankStatus::Expired,
                BankStatus::Failure,
            ] {
                assert!(!rec.observe(report, None));
                assert_eq!(rec.status(), settled);
            }
        }
    }

    #[test]
    fn test_failure_report_leaves_status_alone() {
        let mut rec = record();
        assert!(!rec.observe(BankStatus::Failure, None));
        assert_eq!(rec.status(), TransactionStatus::Unknown);
    }

    #[test]
    fn test_extend_recheck_never_moves_backward() {
        let mut rec = record();
        let original = rec.recheck_not_before();
        rec.extend_recheck_not_before(original - Duration::hours(1));
        assert_eq!(rec.recheck_not_before(), original);
        rec.extend_recheck_not_before(original + Duration::hours(1));
        assert_eq!(rec.recheck_not_before(), original + Duration::hours(1));
    }

    #[test]
    fn test_entrance_code_full_comparison() {
        let code = EntranceCode::new("abcdefghij".to_string());
        assert!(code.matches("abcdefghij"));
        assert!(!code.matches("abcdefghik"));
        assert!(!code.matches("abcdefghi"));
        assert!(!code.matches("abcdefghijk"));
        assert!(!code.matches(""));
    }

    #[test]
    fn test_entrance_code_debug_is_redacted() {
        let code = EntranceCode::new("super-secret".to_string());
        assert!(!format!("{:?}", code).contains("super-secret"));
    }
}
