//! Core types and traits for Outlay storage backends.
//!
//! This crate provides the `StorageBackend` trait, the expense and user
//! models, the input validation rules and the summary reduction, so that
//! storage implementations can live in separate crates.

pub mod models;
pub mod storage;
pub mod summary;
pub mod validation;

// Re-export key types at crate root for convenience
pub use models::{Category, Expense, ExpenseFilter, ExpenseId, User, UserId, UserProfile, YearMonth};
pub use models::write::{ExpensePatch, NewExpense, NewUser};
pub use storage::{StorageBackend, StorageError};
pub use summary::{summarize, ExpenseSummary, SummaryOverflow};
pub use validation::ValidationError;
