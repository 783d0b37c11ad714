//! Turns loosely typed JSON bodies into validated domain commands.
//!
//! Bodies are read as JSON objects rather than typed structs so that a
//! field sent as `null` can be told apart from a field left out, which
//! matters for partial updates.

use std::str::FromStr;

use outlay_core::{
    validation::{
        normalize_description, parse_amount, parse_category, parse_date, ValidationError,
    },
    Category, ExpensePatch, NewExpense,
};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use time::Date;

pub type JsonObject = Map<String, Value>;

const REQUIRED_EXPENSE_FIELDS: &str = "Amount, category, and date are required";

/// `null`, `""` and absent all count as "not provided".
fn provided<'a>(body: &'a JsonObject, key: &str) -> Option<&'a Value> {
    match body.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(value) => Some(value),
    }
}

fn json_decimal(n: &Number) -> Option<Decimal> {
    let text = n.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn amount_from(value: &Value) -> Result<Decimal, ValidationError> {
    match value {
        Value::Number(n) => match json_decimal(n) {
            Some(raw) => parse_amount(raw),
            // Beyond the decimal range.
            None if n.as_f64().map_or(false, |f| f > 0.0) => Err(ValidationError::AmountTooLarge),
            None => Err(ValidationError::AmountNotPositive),
        },
        _ => Err(ValidationError::AmountNotPositive),
    }
}

fn category_from(value: &Value) -> Result<Category, ValidationError> {
    match value {
        Value::String(s) => parse_category(s),
        _ => Err(ValidationError::InvalidCategory),
    }
}

fn date_from(value: &Value, today: Date) -> Result<Date, ValidationError> {
    match value {
        Value::String(s) => parse_date(s, today),
        _ => Err(ValidationError::InvalidDate),
    }
}

fn description_from(value: Option<&Value>) -> Result<String, ValidationError> {
    match value {
        None | Some(Value::Null) => normalize_description(None),
        Some(Value::String(s)) => normalize_description(Some(s)),
        Some(_) => Err(ValidationError::InvalidDescription),
    }
}

pub fn new_expense(body: &JsonObject, today: Date) -> Result<NewExpense, ValidationError> {
    let (Some(amount), Some(category), Some(date)) = (
        provided(body, "amount"),
        provided(body, "category"),
        provided(body, "date"),
    ) else {
        return Err(ValidationError::MissingFields(REQUIRED_EXPENSE_FIELDS));
    };

    Ok(NewExpense {
        amount: amount_from(amount)?,
        category: category_from(category)?,
        date: date_from(date, today)?,
        description: description_from(body.get("description"))?,
    })
}

/// Only keys present in the body are validated and applied. An explicit
/// `null` description clears it; `null` anywhere else is rejected.
pub fn expense_patch(body: &JsonObject, today: Date) -> Result<ExpensePatch, ValidationError> {
    let mut patch = ExpensePatch::default();
    if let Some(amount) = body.get("amount") {
        patch.amount = Some(amount_from(amount)?);
    }
    if let Some(category) = body.get("category") {
        patch.category = Some(category_from(category)?);
    }
    if let Some(date) = body.get("date") {
        patch.date = Some(date_from(date, today)?);
    }
    if body.contains_key("description") {
        patch.description = Some(description_from(body.get("description"))?);
    }
    Ok(patch)
}
