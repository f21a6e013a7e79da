pub mod ideal;
pub mod idin;
pub mod transactions;

use std::sync::Arc;

use crate::services::{IssuerDirectory, TransactionManager};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// Everything a product's routes need: its transactions and its bank list.
#[derive(Clone)]
pub struct ProductState {
    pub name: &'static str,
    pub prefix: String,
    pub manager: Arc<TransactionManager>,
    pub directory: Arc<IssuerDirectory>,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub products: Vec<ProductHealth>,
}

#[derive(Debug, Serialize)]
pub struct ProductHealth {
    pub name: String,
    pub transactions: usize,
    pub issuers: usize,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut products = Vec::new();
    let mut all_loaded = true;
    for product in state.products() {
        all_loaded &= product.directory.is_loaded();
        products.push(ProductHealth {
            name: product.name.to_string(),
            transactions: product.manager.store().len().await,
            issuers: product.directory.issuers().len(),
        });
    }

    // A product without banks cannot start transactions, but returns still work.
    let status = if all_loaded {
        "healthy"
    } else {
        "degraded"
    };

    let health_response = HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        products,
    };

    (StatusCode::OK, Json(health_response))
}
