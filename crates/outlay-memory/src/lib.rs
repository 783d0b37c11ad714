//! In-memory storage backend for Outlay.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use outlay_core::{
    Expense, ExpenseFilter, ExpenseId, ExpensePatch, NewExpense, NewUser, StorageBackend,
    StorageError, User, UserId,
};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone)]
struct StoredExpense {
    sequence: u64,
    expense: Expense,
}

/// Expenses are bucketed per owner, so an owner-scoped lookup never sees
/// another user's records.
#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    users_by_email: HashMap<String, UserId>,
    expenses: HashMap<UserId, BTreeMap<ExpenseId, StoredExpense>>,
}

pub struct InMemoryStorage {
    tables: RwLock<Tables>,
    sequence_counter: AtomicU64,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            sequence_counter: AtomicU64::new(1),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables
            .read()
            .map_err(|_| StorageError::Other("storage lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables
            .write()
            .map_err(|_| StorageError::Other("storage lock poisoned".to_string()))
    }
}

impl StorageBackend for InMemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn ping(&self) -> Result<(), StorageError> {
        self.read().map(|_| ())
    }

    fn create_user(&self, user: &NewUser) -> Result<User, StorageError> {
        let mut tables = self.write()?;
        if tables.users_by_email.contains_key(&user.email) {
            return Err(StorageError::EmailTaken(user.email.clone()));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users_by_email.insert(created.email.clone(), created.id);
        tables.users.insert(created.id, created.clone());
        tracing::debug!(user_id = %created.id, "User created");
        Ok(created)
    }

    fn get_user(&self, id: UserId) -> Result<User, StorageError> {
        self.read()?
            .users
            .get(&id)
            .cloned()
            .ok_or(StorageError::UserNotFound(id))
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let tables = self.read()?;
        Ok(tables
            .users_by_email
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    fn create_expense(&self, owner: UserId, expense: &NewExpense) -> Result<Expense, StorageError> {
        let now = OffsetDateTime::now_utc();
        let created = Expense {
            id: Uuid::new_v4(),
            user_id: owner,
            amount: expense.amount,
            category: expense.category,
            date: expense.date,
            description: expense.description.clone(),
            created_at: now,
            updated_at: now,
        };
        let sequence = self.next_sequence();

        let mut tables = self.write()?;
        if !tables.users.contains_key(&owner) {
            return Err(StorageError::UserNotFound(owner));
        }
        tables.expenses.entry(owner).or_default().insert(
            created.id,
            StoredExpense {
                sequence,
                expense: created.clone(),
            },
        );
        tracing::debug!(expense_id = %created.id, user_id = %owner, "Expense created");
        Ok(created)
    }

    fn get_expense(&self, owner: UserId, id: ExpenseId) -> Result<Expense, StorageError> {
        self.read()?
            .expenses
            .get(&owner)
            .and_then(|owned| owned.get(&id))
            .map(|stored| stored.expense.clone())
            .ok_or(StorageError::ExpenseNotFound(id))
    }

    fn list_expenses(&self, owner: UserId, filter: &ExpenseFilter) -> Result<Vec<Expense>, StorageError> {
        let tables = self.read()?;
        let mut matching: Vec<&StoredExpense> = match tables.expenses.get(&owner) {
            Some(owned) => owned
                .values()
                .filter(|stored| filter.matches(&stored.expense))
                .collect(),
            None => Vec::new(),
        };
        matching.sort_by_key(|stored| {
            Reverse((stored.expense.date, stored.expense.created_at, stored.sequence))
        });
        Ok(matching.into_iter().map(|stored| stored.expense.clone()).collect())
    }

    fn update_expense(&self, owner: UserId, id: ExpenseId, patch: &ExpensePatch) -> Result<Expense, StorageError> {
        let mut tables = self.write()?;
        let stored = tables
            .expenses
            .get_mut(&owner)
            .and_then(|owned| owned.get_mut(&id))
            .ok_or(StorageError::ExpenseNotFound(id))?;
        patch.apply(&mut stored.expense);
        stored.expense.updated_at = OffsetDateTime::now_utc();
        tracing::debug!(expense_id = %id, user_id = %owner, "Expense updated");
        Ok(stored.expense.clone())
    }

    fn delete_expense(&self, owner: UserId, id: ExpenseId) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        tables
            .expenses
            .get_mut(&owner)
            .and_then(|owned| owned.remove(&id))
            .ok_or(StorageError::ExpenseNotFound(id))?;
        tracing::debug!(expense_id = %id, user_id = %owner, "Expense deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outlay_core::{Category, YearMonth};
    use rust_decimal_macros::dec;
    use time::{Date, Month};

    fn storage_with_user(email: &str) -> (InMemoryStorage, UserId) {
        let storage = InMemoryStorage::new();
        let user = storage
            .create_user(&NewUser {
                email: email.to_string(),
                name: "Test".to_string(),
                password_hash: "hash".to_string(),
            })
            .unwrap();
        (storage, user.id)
    }

    fn new_expense(day: u8, month: Month, category: Category) -> NewExpense {
        NewExpense {
            amount: dec!(10.00),
            category,
            date: Date::from_calendar_date(2024, month, day).unwrap(),
            description: String::new(),
        }
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let (storage, _) = storage_with_user("a@example.com");
        let err = storage
            .create_user(&NewUser {
                email: "a@example.com".to_string(),
                name: "Other".to_string(),
                password_hash: "hash".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::EmailTaken(_)));
    }

    #[test]
    fn expenses_are_invisible_to_other_owners() {
        let (storage, alice) = storage_with_user("alice@example.com");
        let bob = storage
            .create_user(&NewUser {
                email: "bob@example.com".to_string(),
                name: "Bob".to_string(),
                password_hash: "hash".to_string(),
            })
            .unwrap()
            .id;

        let expense = storage
            .create_expense(alice, &new_expense(1, Month::January, Category::Food))
            .unwrap();

        assert!(matches!(storage.get_expense(bob, expense.id), Err(StorageError::ExpenseNotFound(_))));
        assert!(storage.list_expenses(bob, &ExpenseFilter::default()).unwrap().is_empty());
        assert!(matches!(
            storage.update_expense(bob, expense.id, &ExpensePatch::default()),
            Err(StorageError::ExpenseNotFound(_))
        ));
        assert!(matches!(storage.delete_expense(bob, expense.id), Err(StorageError::ExpenseNotFound(_))));
        assert!(storage.get_expense(alice, expense.id).is_ok());
    }

    #[test]
    fn list_is_filtered_and_newest_first() {
        let (storage, owner) = storage_with_user("a@example.com");
        storage.create_expense(owner, &new_expense(5, Month::January, Category::Food)).unwrap();
        storage.create_expense(owner, &new_expense(20, Month::January, Category::Bills)).unwrap();
        storage.create_expense(owner, &new_expense(3, Month::February, Category::Food)).unwrap();
        let same_day = storage.create_expense(owner, &new_expense(20, Month::January, Category::Food)).unwrap();

        let all = storage.list_expenses(owner, &ExpenseFilter::default()).unwrap();
        let days: Vec<u8> = all.iter().map(|e| e.date.day()).collect();
        assert_eq!(days, vec![3, 20, 20, 5]);
        // Same date: the later insert comes first.
        assert_eq!(all[1].id, same_day.id);

        let january_food = storage
            .list_expenses(
                owner,
                &ExpenseFilter {
                    category: Some(Category::Food),
                    month: Some(YearMonth::new(2024, Month::January)),
                },
            )
            .unwrap();
        assert_eq!(january_food.len(), 2);
        assert!(january_food.iter().all(|e| e.category == Category::Food));
    }

    #[test]
    fn update_applies_patch_and_touches_timestamp() {
        let (storage, owner) = storage_with_user("a@example.com");
        let created = storage.create_expense(owner, &new_expense(5, Month::January, Category::Food)).unwrap();

        let updated = storage
            .update_expense(
                owner,
                created.id,
                &ExpensePatch {
                    amount: Some(dec!(42.10)),
                    description: Some("groceries".to_string()),
                    ..ExpensePatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.amount, dec!(42.10));
        assert_eq!(updated.description, "groceries");
        assert_eq!(updated.category, Category::Food);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn delete_removes_expense() {
        let (storage, owner) = storage_with_user("a@example.com");
        let created = storage.create_expense(owner, &new_expense(5, Month::January, Category::Food)).unwrap();
        storage.delete_expense(owner, created.id).unwrap();
        assert!(matches!(storage.get_expense(owner, created.id), Err(StorageError::ExpenseNotFound(_))));
        assert!(matches!(storage.delete_expense(owner, created.id), Err(StorageError::ExpenseNotFound(_))));
    }
}
