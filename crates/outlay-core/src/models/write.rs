use rust_decimal::Decimal;
use time::Date;

use super::{Category, Expense};

/// Registration data after validation. `email` is already normalized and
/// `password_hash` is a PHC string, never the plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
    pub amount: Decimal,
    pub category: Category,
    pub date: Date,
    pub description: String,
}

/// Field-wise update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpensePatch {
    pub amount: Option<Decimal>,
    pub category: Option<Category>,
    pub date: Option<Date>,
    pub description: Option<String>,
}

impl ExpensePatch {
    /// Applies the patch in place. Timestamps are the caller's concern.
    pub fn apply(&self, expense: &mut Expense) {
        if let Some(amount) = self.amount {
            expense.amount = amount;
        }
        if let Some(category) = self.category {
            expense.category = category;
        }
        if let Some(date) = self.date {
            expense.date = date;
        }
        if let Some(description) = &self.description {
            expense.description = description.clone();
        }
    }
}
