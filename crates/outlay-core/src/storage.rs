use crate::models::{
    write::{ExpensePatch, NewExpense, NewUser},
    Expense, ExpenseFilter, ExpenseId, User, UserId,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    Other(String),
    #[error("email already registered: {0}")]
    EmailTaken(String),
    #[error("user not found: {0}")]
    UserNotFound(UserId),
    #[error("expense not found: {0}")]
    ExpenseNotFound(ExpenseId),
}

/// Persistence for users and their expenses.
///
/// Every expense operation takes the owner's id. Implementations must treat
/// an expense owned by someone else exactly like a missing one and return
/// `ExpenseNotFound`, so callers cannot probe for other users' records.
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn ping(&self) -> Result<(), StorageError>;

    // Users
    fn create_user(&self, user: &NewUser) -> Result<User, StorageError>;
    fn get_user(&self, id: UserId) -> Result<User, StorageError>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;

    // Expenses, always scoped by owner
    fn create_expense(&self, owner: UserId, expense: &NewExpense) -> Result<Expense, StorageError>;
    fn get_expense(&self, owner: UserId, id: ExpenseId) -> Result<Expense, StorageError>;
    fn list_expenses(&self, owner: UserId, filter: &ExpenseFilter) -> Result<Vec<Expense>, StorageError>;
    fn update_expense(&self, owner: UserId, id: ExpenseId, patch: &ExpensePatch) -> Result<Expense, StorageError>;
    fn delete_expense(&self, owner: UserId, id: ExpenseId) -> Result<(), StorageError>;
}
