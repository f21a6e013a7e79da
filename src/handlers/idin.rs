use axum::{
    extract::{rejection::FormRejection, State},
    routing::{get, post},
    Form, Router,
};

use crate::domain::Purpose;
use crate::error::AppError;
use crate::handlers::transactions::{self, parse_form, StartForm};
use crate::handlers::ProductState;

/// iDIN identity routes, relative to the product prefix.
pub fn router(state: ProductState) -> Router {
    Router::new()
        .route("/banks", get(transactions::banks))
        .route("/start", post(start))
        .route("/return", post(transactions::return_transaction))
        .route("/delete", post(transactions::delete_transaction))
        .with_state(state)
}

pub async fn start(
    State(state): State<ProductState>,
    form: Result<Form<StartForm>, FormRejection>,
) -> Result<String, AppError> {
    let form = parse_form(form)?;
    let url = state
        .manager
        .start_transaction(&form.bank, None, Purpose::Identity)
        .await?;
    Ok(url)
}
