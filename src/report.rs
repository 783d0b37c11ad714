//! Offline spending report for the `report` subcommand.

use outlay_core::{
    summarize,
    validation::{normalize_email, parse_filter},
    ExpenseSummary, StorageBackend, StorageError, SummaryOverflow, ValidationError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("no account registered for {0}")]
    UnknownUser(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Summary(#[from] SummaryOverflow),
}

pub fn run_report(
    storage: &dyn StorageBackend,
    email: &str,
    month: Option<&str>,
    category: Option<&str>,
) -> Result<ExpenseSummary, ReportError> {
    let email = normalize_email(email)?;
    let filter = parse_filter(category, month)?;
    let user = storage
        .find_user_by_email(&email)?
        .ok_or(ReportError::UnknownUser(email))?;

    let expenses = storage.list_expenses(user.id, &filter)?;
    tracing::debug!(user_id = %user.id, count = expenses.len(), "Report generated");
    Ok(summarize(&expenses, filter.month)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use outlay_core::{Category, NewExpense, NewUser};
    use outlay_memory::InMemoryStorage;
    use rust_decimal_macros::dec;
    use time::macros::date;

    fn seeded() -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        let user = storage
            .create_user(&NewUser {
                email: "sam@example.com".into(),
                name: "Sam".into(),
                password_hash: "x".into(),
            })
            .unwrap();
        for (amount, category, date) in [
            (dec!(10.50), Category::Food, date!(2024 - 01 - 05)),
            (dec!(4.50), Category::Food, date!(2024 - 01 - 20)),
            (dec!(99), Category::Travel, date!(2024 - 02 - 01)),
        ] {
            storage
                .create_expense(
                    user.id,
                    &NewExpense {
                        amount,
                        category,
                        date,
                        description: String::new(),
                    },
                )
                .unwrap();
        }
        storage
    }

    #[test]
    fn report_for_month() {
        let storage = seeded();
        let summary = run_report(&storage, "SAM@example.com", Some("2024-01"), None).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total, dec!(15.00));
        assert_eq!(summary.by_category.get(&Category::Food), Some(&dec!(15.00)));
        assert!(summary.to_string().contains("2024-01"));
    }

    #[test]
    fn report_by_category() {
        let storage = seeded();
        let summary = run_report(&storage, "sam@example.com", None, Some("Travel")).unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.total, dec!(99));
    }

    #[test]
    fn unknown_user_and_bad_filters() {
        let storage = seeded();
        assert!(matches!(
            run_report(&storage, "nobody@example.com", None, None),
            Err(ReportError::UnknownUser(_))
        ));
        assert!(matches!(
            run_report(&storage, "sam@example.com", Some("January"), None),
            Err(ReportError::Validation(ValidationError::InvalidMonth))
        ));
    }
}
