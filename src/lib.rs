pub mod adapters;
pub mod cli;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod startup;
pub mod utils;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::adapters::{BankGatewayClient, IrmaIssuer};
use crate::clock::Clock;
use crate::config::Config;
use crate::handlers::ProductState;
use crate::ports::CredentialIssuer;
use crate::services::{IssuerDirectory, ManagerSettings, TransactionManager};

#[derive(Clone, Default)]
pub struct AppState {
    pub ideal: Option<ProductState>,
    pub idin: Option<ProductState>,
}

impl AppState {
    /// Wires the enabled products to their bank gateways and the shared
    /// IRMA server.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let issuer: Arc<dyn CredentialIssuer> = Arc::new(IrmaIssuer::new(
            config.irma_server_url.clone(),
            config.irma_server_token.clone(),
        ));

        let ideal = config.ideal.as_ref().map(|ideal| {
            let bank = Arc::new(BankGatewayClient::new(ideal.gateway_url.clone()));
            let manager = TransactionManager::new(
                bank,
                issuer.clone(),
                clock.clone(),
                ManagerSettings {
                    credential_id: ideal.credential_id.clone(),
                    payment_amounts: ideal.payment_amounts.clone(),
                    donation_amounts: ideal.donation_amounts.clone(),
                    message: ideal.payment_message.clone(),
                    donation_message: ideal.donation_message.clone(),
                },
            );
            ProductState {
                name: "iDEAL",
                prefix: ideal.path_prefix.clone(),
                manager: Arc::new(manager),
                directory: Arc::new(IssuerDirectory::new("iDEAL")),
                redirect_url: ideal.redirect_url.clone(),
            }
        });

        let idin = config.idin.as_ref().map(|idin| {
            let bank = Arc::new(BankGatewayClient::new(idin.gateway_url.clone()));
            let manager = TransactionManager::new(
                bank,
                issuer.clone(),
                clock.clone(),
                ManagerSettings {
                    credential_id: idin.credential_id.clone(),
                    message: idin.message.clone(),
                    ..ManagerSettings::default()
                },
            );
            ProductState {
                name: "iDIN",
                prefix: idin.path_prefix.clone(),
                manager: Arc::new(manager),
                directory: Arc::new(IssuerDirectory::new("iDIN")),
                redirect_url: None,
            }
        });

        Self { ideal, idin }
    }

    pub fn products(&self) -> impl Iterator<Item = &ProductState> {
        self.ideal.iter().chain(self.idin.iter())
    }
}

pub fn create_app(state: AppState, static_dir: Option<&str>) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .with_state(state.clone());

    if let Some(ideal) = state.ideal {
        let prefix = ideal.prefix.clone();
        app = mount(app, &prefix, handlers::ideal::router(ideal));
    }
    if let Some(idin) = state.idin {
        let prefix = idin.prefix.clone();
        app = mount(app, &prefix, handlers::idin::router(idin));
    }

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(axum::middleware::from_fn(
        middleware::request_logger::request_logger_middleware,
    ))
    .layer(CorsLayer::new().allow_origin(Any))
}

// Router::nest rejects the root path.
fn mount(app: Router, prefix: &str, product: Router) -> Router {
    if prefix == "/" {
        app.merge(product)
    } else {
        app.nest(prefix, product)
    }
}
