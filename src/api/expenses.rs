use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use outlay_core::{summarize, validation::parse_filter, Expense, ExpenseId, ExpenseSummary};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{payload, payload::JsonObject, users::MessageResponse, AppState};
use crate::{auth::Caller, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseQuery {
    pub category: Option<String>,
    pub month: Option<String>,
}

#[derive(Serialize)]
pub struct ExpenseListResponse {
    success: bool,
    expenses: Vec<Expense>,
}

#[derive(Serialize)]
pub struct ExpenseResponse {
    success: bool,
    expense: Expense,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    success: bool,
    summary: ExpenseSummary,
}

fn parse_expense_id(raw: &str) -> Result<ExpenseId, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::InvalidExpenseId)
}

fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ExpenseQuery>,
) -> Result<Json<ExpenseListResponse>, ApiError> {
    let filter = parse_filter(query.category.as_deref(), query.month.as_deref())?;
    let expenses = state.storage.list_expenses(caller.user_id, &filter)?;
    Ok(Json(ExpenseListResponse {
        success: true,
        expenses,
    }))
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ExpenseQuery>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let filter = parse_filter(query.category.as_deref(), query.month.as_deref())?;
    let expenses = state.storage.list_expenses(caller.user_id, &filter)?;
    Ok(Json(SummaryResponse {
        success: true,
        summary: summarize(&expenses, filter.month)?,
    }))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<JsonObject>, JsonRejection>,
) -> Result<(StatusCode, Json<ExpenseResponse>), ApiError> {
    let Json(body) = body.map_err(|_| ApiError::InvalidBody)?;
    let new_expense = payload::new_expense(&body, today())?;

    let expense = state.storage.create_expense(caller.user_id, &new_expense)?;
    tracing::info!(expense_id = %expense.id, user_id = %caller.user_id, "Expense created");

    Ok((
        StatusCode::CREATED,
        Json(ExpenseResponse {
            success: true,
            expense,
        }),
    ))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<ExpenseResponse>, ApiError> {
    let id = parse_expense_id(&id)?;
    let expense = state.storage.get_expense(caller.user_id, id)?;
    Ok(Json(ExpenseResponse {
        success: true,
        expense,
    }))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    body: Result<Json<JsonObject>, JsonRejection>,
) -> Result<Json<ExpenseResponse>, ApiError> {
    let id = parse_expense_id(&id)?;
    // 404 for a foreign expense takes precedence over body errors.
    state.storage.get_expense(caller.user_id, id)?;

    let Json(body) = body.map_err(|_| ApiError::InvalidBody)?;
    let patch = payload::expense_patch(&body, today())?;

    let expense = state.storage.update_expense(caller.user_id, id, &patch)?;
    tracing::info!(expense_id = %expense.id, user_id = %caller.user_id, "Expense updated");

    Ok(Json(ExpenseResponse {
        success: true,
        expense,
    }))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_expense_id(&id)?;
    state.storage.delete_expense(caller.user_id, id)?;
    tracing::info!(expense_id = %id, user_id = %caller.user_id, "Expense deleted");

    Ok(Json(MessageResponse::new("Expense deleted successfully")))
}
