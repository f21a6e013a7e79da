//! Handlers shared by every bank product: bank list, return and delete.

use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::handlers::ProductState;
use crate::ports::BankIssuer;
use crate::services::ReturnOutcome;

#[derive(Debug, Deserialize)]
pub struct StartForm {
    pub bank: String,
    #[serde(default)]
    pub amount: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionForm {
    pub trxid: String,
    pub ec: String,
}

pub(crate) fn parse_form<T>(form: Result<Form<T>, FormRejection>) -> Result<T, AppError> {
    form.map(|Form(inner)| inner)
        .map_err(|_| AppError::BadRequest("no-params"))
}

pub async fn banks(State(state): State<ProductState>) -> Result<Json<Vec<BankIssuer>>, AppError> {
    let issuers = state.directory.issuers();
    if issuers.is_empty() {
        return Err(AppError::NotFound("no-issuers-loaded"));
    }
    Ok(Json(issuers.as_ref().clone()))
}

pub async fn return_transaction(
    State(state): State<ProductState>,
    form: Result<Form<TransactionForm>, FormRejection>,
) -> Result<Response, AppError> {
    let form = parse_form(form)?;

    match state.manager.return_transaction(&form.trxid, &form.ec).await? {
        ReturnOutcome::Donated => Ok(StatusCode::NO_CONTENT.into_response()),
        ReturnOutcome::Issuance(session) => Ok(Json(session).into_response()),
    }
}

pub async fn delete_transaction(
    State(state): State<ProductState>,
    form: Result<Form<TransactionForm>, FormRejection>,
) -> Result<StatusCode, AppError> {
    let form = parse_form(form)?;
    state
        .manager
        .delete_transaction(&form.trxid, &form.ec)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
