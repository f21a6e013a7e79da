pub mod credential;
pub mod transaction;

pub use credential::{attributes_for, credential_validity};
pub use transaction::{
    BankStatus, ConsumerAttributes, EntranceCode, Purpose, TransactionId, TransactionRecord,
    TransactionStatus,
};
