pub mod issuer_directory;
pub mod rate_limiter;
pub mod sweeper;
pub mod transaction_store;
pub mod transactions;

pub use issuer_directory::IssuerDirectory;
pub use rate_limiter::RateLimiter;
pub use sweeper::{SweepStats, Sweeper};
pub use transaction_store::{SharedRecord, TransactionStore};
pub use transactions::{ManagerSettings, ReturnOutcome, TransactionError, TransactionManager};
