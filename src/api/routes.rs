//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{
    Account, HistoryFilter, HistoryRow, OperationContext, Transaction, ValidationError,
};
use crate::error::AppError;
use crate::handlers::validation::parse_date;
use crate::handlers::{
    AccountHandler, HistoryHandler, OpenAccountPayload, TransactionHandler, TransactionPayload,
    TransferHandler, TransferPayload,
};
use crate::ledger::{ReplayReport, TransferReceipt};
use crate::store::LedgerStore;

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

/// Success envelope shared by every route
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    pub fn with_message(message: &'static str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message),
            data,
        })
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(payload)| payload)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

fn path_id(raw: &str) -> Result<i64, AppError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationError::NotAnId("id").into()),
    }
}

fn path_date(raw: &str) -> Result<NaiveDate, AppError> {
    parse_date(raw.trim()).ok_or_else(|| ValidationError::InvalidDate("date").into())
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router<S: LedgerStore>() -> Router<AppState<S>> {
    Router::new()
        // Ledger transactions
        .route("/transactions", post(create_transaction::<S>))
        .route("/transactions/info/:id", get(transaction_info::<S>))
        .route("/transactions/:id", delete(delete_transaction::<S>))
        // Ledger history
        .route("/transactions/historiques", get(history_all::<S>))
        .route(
            "/transactions/historiques/between-two-dates/:start/:end",
            get(history_between::<S>),
        )
        .route(
            "/transactions/historiques/par-compte/:id",
            get(history_by_account::<S>),
        )
        .route(
            "/transactions/historiques/par-compte-avant-date/:id/:date",
            get(history_by_account_before::<S>),
        )
        .route(
            "/transactions/historiques/par-compte-apres-date/:id/:date",
            get(history_by_account_after::<S>),
        )
        .route(
            "/transactions/historiques/par-client/:id",
            get(history_by_client::<S>),
        )
        .route(
            "/transactions/historiques/par-client-avant-date/:id/:date",
            get(history_by_client_before::<S>),
        )
        .route(
            "/transactions/historiques/par-client-apres-date/:id/:date",
            get(history_by_client_after::<S>),
        )
        .route(
            "/transactions/historiques/verification/:id",
            get(verify_account::<S>),
        )
        // Transfers
        .route("/transferts", post(transfer::<S>))
        // Accounts
        .route("/comptes", post(open_account::<S>))
        .route("/comptes/:id", get(get_account::<S>))
        .route("/comptes/active/:id", put(activate_account::<S>))
        .route("/comptes/tag/:id", put(tag_account::<S>))
}

// =========================================================================
// Transactions
// =========================================================================

/// POST /transactions
async fn create_transaction<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    payload: Result<Json<TransactionPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Transaction>>), AppError> {
    let payload = body(payload)?;
    let handler = TransactionHandler::new(state.engine);

    let transaction = handler.execute(&payload, &context).await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(transaction)))
}

/// GET /transactions/info/:id
async fn transaction_info<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> ApiResult<HistoryRow> {
    let handler = HistoryHandler::new(state.engine);
    let row = handler.find(path_id(&id)?, &context).await?;
    Ok(ApiResponse::ok(row))
}

/// DELETE /transactions/:id
async fn delete_transaction<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    let handler = TransactionHandler::new(state.engine);
    let deleted = handler.delete(path_id(&id)?, &context).await?;
    Ok(ApiResponse::with_message("TRANSACTION_DELETED_SUCCESSFULLY", deleted))
}

// =========================================================================
// History
// =========================================================================

async fn history<S: LedgerStore>(
    state: AppState<S>,
    context: &OperationContext,
    filter: HistoryFilter,
) -> ApiResult<Vec<HistoryRow>> {
    let rows = HistoryHandler::new(state.engine).list(filter, context).await?;
    Ok(ApiResponse::ok(rows))
}

/// GET /transactions/historiques
async fn history_all<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
) -> ApiResult<Vec<HistoryRow>> {
    history(state, &context, HistoryFilter::all()).await
}

/// GET /transactions/historiques/between-two-dates/:start/:end
async fn history_between<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path((start, end)): Path<(String, String)>,
) -> ApiResult<Vec<HistoryRow>> {
    let filter = HistoryFilter::all()
        .since(path_date(&start)?)
        .until(path_date(&end)?);
    history(state, &context, filter).await
}

/// GET /transactions/historiques/par-compte/:id
async fn history_by_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> ApiResult<Vec<HistoryRow>> {
    history(state, &context, HistoryFilter::for_account(path_id(&id)?)).await
}

/// GET /transactions/historiques/par-compte-avant-date/:id/:date
async fn history_by_account_before<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path((id, date)): Path<(String, String)>,
) -> ApiResult<Vec<HistoryRow>> {
    let filter = HistoryFilter::for_account(path_id(&id)?).until(path_date(&date)?);
    history(state, &context, filter).await
}

/// GET /transactions/historiques/par-compte-apres-date/:id/:date
async fn history_by_account_after<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path((id, date)): Path<(String, String)>,
) -> ApiResult<Vec<HistoryRow>> {
    let filter = HistoryFilter::for_account(path_id(&id)?).since(path_date(&date)?);
    history(state, &context, filter).await
}

/// GET /transactions/historiques/par-client/:id
async fn history_by_client<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> ApiResult<Vec<HistoryRow>> {
    history(state, &context, HistoryFilter::for_client(path_id(&id)?)).await
}

/// GET /transactions/historiques/par-client-avant-date/:id/:date
async fn history_by_client_before<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path((id, date)): Path<(String, String)>,
) -> ApiResult<Vec<HistoryRow>> {
    let filter = HistoryFilter::for_client(path_id(&id)?).until(path_date(&date)?);
    history(state, &context, filter).await
}

/// GET /transactions/historiques/par-client-apres-date/:id/:date
async fn history_by_client_after<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path((id, date)): Path<(String, String)>,
) -> ApiResult<Vec<HistoryRow>> {
    let filter = HistoryFilter::for_client(path_id(&id)?).since(path_date(&date)?);
    history(state, &context, filter).await
}

/// GET /transactions/historiques/verification/:id
async fn verify_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> ApiResult<ReplayReport> {
    let handler = HistoryHandler::new(state.engine);
    let report = handler.verify(path_id(&id)?, &context).await?;
    Ok(ApiResponse::ok(report))
}

// =========================================================================
// Transfers
// =========================================================================

/// POST /transferts
async fn transfer<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    payload: Result<Json<TransferPayload>, JsonRejection>,
) -> ApiResult<TransferReceipt> {
    let payload = body(payload)?;
    let handler = TransferHandler::new(state.engine);

    let receipt = handler.execute(&payload, &context).await?;

    Ok(ApiResponse::with_message("Transfert effectué avec succès", receipt))
}

// =========================================================================
// Accounts
// =========================================================================

/// POST /comptes
async fn open_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    payload: Result<Json<OpenAccountPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Account>>), AppError> {
    let payload = body(payload)?;
    let handler = AccountHandler::new(state.engine, state.guard);

    let account = handler.open(&payload, &context).await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(account)))
}

/// GET /comptes/:id
async fn get_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> ApiResult<Account> {
    let handler = AccountHandler::new(state.engine, state.guard);
    let account = handler.get(path_id(&id)?, &context).await?;
    Ok(ApiResponse::ok(account))
}

/// PUT /comptes/active/:id
async fn activate_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> ApiResult<Account> {
    let handler = AccountHandler::new(state.engine, state.guard);
    let account = handler.activate(path_id(&id)?, &context).await?;
    Ok(ApiResponse::with_message("COMPTE_ACTIVATED", account))
}

/// PUT /comptes/tag/:id
async fn tag_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<String>,
) -> ApiResult<Option<()>> {
    let handler = AccountHandler::new(state.engine, state.guard);
    handler.soft_delete(path_id(&id)?, &context).await?;
    Ok(ApiResponse::with_message("COMPTE_TAGGED", None))
}
