//! Input rules shared by every entry point that creates users or expenses.
//!
//! The checks here are pure: the caller supplies "today" so that the
//! non-future date rule can be tested without a clock.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime, UtcOffset};

use crate::models::{Category, ExpenseFilter, YearMonth, DATE_FORMAT};

pub const MAX_DESCRIPTION_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// Largest accepted amount, 999,999,999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_215_752_191, 23, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0}")]
    MissingFields(&'static str),
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least 8 characters long")]
    PasswordTooShort,
    #[error("Amount must be a positive number")]
    AmountNotPositive,
    #[error("Amount must be greater than 0")]
    AmountTooSmall,
    #[error("Amount cannot be more than 999999999.99")]
    AmountTooLarge,
    #[error("Invalid category")]
    InvalidCategory,
    #[error("Invalid date format")]
    InvalidDate,
    #[error("Date cannot be in the future")]
    FutureDate,
    #[error("Description cannot be more than 255 characters")]
    DescriptionTooLong,
    #[error("Description must be a string")]
    InvalidDescription,
    #[error("Invalid month format, expected YYYY-MM")]
    InvalidMonth,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\S+@\S+\.\S+$").expect("static email pattern"))
}

/// Trims and lowercases an email after checking its shape.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim();
    if !email_pattern().is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email.to_lowercase())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Positive amounts up to [`MAX_AMOUNT`], rounded half away from zero to cents.
pub fn parse_amount(raw: Decimal) -> Result<Decimal, ValidationError> {
    if raw <= Decimal::ZERO {
        return Err(ValidationError::AmountNotPositive);
    }
    let rounded = raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded < Decimal::new(1, 2) {
        return Err(ValidationError::AmountTooSmall);
    }
    if rounded > MAX_AMOUNT {
        return Err(ValidationError::AmountTooLarge);
    }
    Ok(rounded)
}

pub fn parse_category(raw: &str) -> Result<Category, ValidationError> {
    raw.parse()
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp, whose UTC calendar date
/// is used. Years outside 1..=9999 and dates after `today` are rejected.
pub fn parse_date(raw: &str, today: Date) -> Result<Date, ValidationError> {
    let raw = raw.trim();
    let date = match Date::parse(raw, DATE_FORMAT) {
        Ok(date) => date,
        Err(_) => OffsetDateTime::parse(raw, &Rfc3339)
            .map(|ts| ts.to_offset(UtcOffset::UTC).date())
            .map_err(|_| ValidationError::InvalidDate)?,
    };
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(ValidationError::InvalidDate);
    }
    if date > today {
        return Err(ValidationError::FutureDate);
    }
    Ok(date)
}

/// Trims the description; absent descriptions are stored as empty strings.
pub fn normalize_description(raw: Option<&str>) -> Result<String, ValidationError> {
    let description = raw.map(str::trim).unwrap_or_default();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::DescriptionTooLong);
    }
    Ok(description.to_string())
}

/// Query-string filters. An absent or empty value, or the category `All`,
/// means "no restriction".
pub fn parse_filter(
    category: Option<&str>,
    month: Option<&str>,
) -> Result<ExpenseFilter, ValidationError> {
    let category = match category.map(str::trim) {
        None | Some("") | Some("All") => None,
        Some(raw) => Some(parse_category(raw)?),
    };
    let month = match month.map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<YearMonth>()?),
    };
    Ok(ExpenseFilter { category, month })
}
