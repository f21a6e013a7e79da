pub mod bank_gateway;
pub mod irma;

pub use bank_gateway::BankGatewayClient;
pub use irma::IrmaIssuer;
