use axum::{
    extract::{rejection::FormRejection, RawQuery, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};

use crate::domain::Purpose;
use crate::error::AppError;
use crate::handlers::transactions::{self, parse_form, StartForm};
use crate::handlers::ProductState;

/// iDEAL payment routes, relative to the product prefix.
pub fn router(state: ProductState) -> Router {
    let mut router = Router::new()
        .route("/banks", get(transactions::banks))
        .route("/amounts", get(amounts))
        .route("/start", post(start))
        .route("/donate", post(donate))
        .route("/return", post(transactions::return_transaction))
        .route("/delete", post(transactions::delete_transaction));

    if state.redirect_url.is_some() {
        router = router.route("/redirect", get(redirect));
    }

    router.with_state(state)
}

pub async fn amounts(State(state): State<ProductState>) -> Json<Vec<String>> {
    Json(state.manager.payment_amounts().to_vec())
}

pub async fn start(
    State(state): State<ProductState>,
    form: Result<Form<StartForm>, FormRejection>,
) -> Result<String, AppError> {
    start_payment(state, form, Purpose::Authentication).await
}

pub async fn donate(
    State(state): State<ProductState>,
    form: Result<Form<StartForm>, FormRejection>,
) -> Result<String, AppError> {
    start_payment(state, form, Purpose::Donation).await
}

async fn start_payment(
    state: ProductState,
    form: Result<Form<StartForm>, FormRejection>,
    purpose: Purpose,
) -> Result<String, AppError> {
    let form = parse_form(form)?;
    let url = state
        .manager
        .start_transaction(&form.bank, form.amount.as_deref(), purpose)
        .await?;
    Ok(url)
}

/// Forwards the bank's return redirect to the front end, keeping the query
/// string (transaction id and entrance code) intact.
pub async fn redirect(
    State(state): State<ProductState>,
    RawQuery(query): RawQuery,
) -> Result<impl IntoResponse, AppError> {
    let target = state
        .redirect_url
        .as_deref()
        .ok_or(AppError::NotFound("no-redirect"))?;

    let location = match query.filter(|q| !q.is_empty()) {
        Some(query) => {
            let separator = if target.contains('?') { '&' } else { '?' };
            format!("{}{}{}", target, separator, query)
        }
        None => target.to_string(),
    };

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]))
}
