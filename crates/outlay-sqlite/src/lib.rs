//! SQLite storage backend for Outlay.

use std::{
    str::FromStr,
    sync::{Mutex, MutexGuard},
};

use outlay_core::{
    models::{format_date, parse_stored_date},
    Category, Expense, ExpenseFilter, ExpenseId, ExpensePatch, NewExpense,
    NewUser, StorageBackend, StorageError, User, UserId,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| StorageError::Other(e.to_string()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        tracing::info!(path, "SQLite storage opened");
        Ok(storage)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Other("sqlite connection lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS expenses (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount TEXT NOT NULL,
                category TEXT NOT NULL,
                date TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_expenses_user_date
                ON expenses(user_id, date DESC);

            CREATE INDEX IF NOT EXISTS idx_expenses_user_category
                ON expenses(user_id, category);
            ",
        )
        .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(())
    }
}

fn date_to_sql(date: Date) -> Result<String, StorageError> {
    format_date(date).map_err(|e| StorageError::Other(format!("Unstorable date {}: {}", date, e)))
}

fn date_from_sql(raw: &str) -> Result<Date, StorageError> {
    parse_stored_date(raw).map_err(|e| StorageError::Other(format!("Invalid stored date {}: {}", raw, e)))
}

fn timestamp_to_nanos(ts: OffsetDateTime) -> i64 {
    // i64 nanoseconds cover dates up to the year 2262.
    ts.unix_timestamp_nanos() as i64
}

fn nanos_to_timestamp(nanos: i64) -> Result<OffsetDateTime, StorageError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map_err(|e| StorageError::Other(format!("Invalid stored timestamp: {}", e)))
}

fn parse_uuid(s: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(s).map_err(|e| StorageError::Other(format!("Invalid stored id {}: {}", s, e)))
}

const USER_COLUMNS: &str = "id, email, name, password_hash, created_at";
const EXPENSE_COLUMNS: &str =
    "id, user_id, amount, category, date, description, created_at, updated_at";

type UserRow = (String, String, String, String, i64);
type ExpenseRow = (String, String, String, String, String, String, i64, i64);

fn user_row(row: &rusqlite::Row) -> rusqlite::Result<UserRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn expense_row(row: &rusqlite::Row) -> rusqlite::Result<ExpenseRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn user_from_row(row: UserRow) -> Result<User, StorageError> {
    let (id, email, name, password_hash, created_at) = row;
    Ok(User {
        id: parse_uuid(&id)?,
        email,
        name,
        password_hash,
        created_at: nanos_to_timestamp(created_at)?,
    })
}

fn expense_from_row(row: ExpenseRow) -> Result<Expense, StorageError> {
    let (id, user_id, amount, category, date, description, created_at, updated_at) = row;
    Ok(Expense {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        amount: Decimal::from_str(&amount)
            .map_err(|e| StorageError::Other(format!("Invalid decimal: {}", e)))?,
        category: Category::from_str(&category)
            .map_err(|_| StorageError::Other(format!("Invalid stored category: {}", category)))?,
        date: date_from_sql(&date)?,
        description,
        created_at: nanos_to_timestamp(created_at)?,
        updated_at: nanos_to_timestamp(updated_at)?,
    })
}

fn fetch_expense(conn: &Connection, owner: UserId, id: ExpenseId) -> Result<Expense, StorageError> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM expenses WHERE id = ?1 AND user_id = ?2", EXPENSE_COLUMNS),
            params![id.to_string(), owner.to_string()],
            expense_row,
        )
        .optional()
        .map_err(|e| StorageError::Other(e.to_string()))?;
    match row {
        Some(row) => expense_from_row(row),
        None => Err(StorageError::ExpenseNotFound(id)),
    }
}

impl StorageBackend for SqliteStorage {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn ping(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(())
    }

    fn create_user(&self, user: &NewUser) -> Result<User, StorageError> {
        let conn = self.conn()?;

        let taken: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
                params![user.email],
                |row| row.get(0),
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;
        if taken {
            return Err(StorageError::EmailTaken(user.email.clone()));
        }

        let created = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            name: user.name.clone(),
            password_hash: user.password_hash.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        conn.execute(
            "INSERT INTO users (id, email, name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                created.id.to_string(),
                created.email,
                created.name,
                created.password_hash,
                timestamp_to_nanos(created.created_at)
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::EmailTaken(user.email.clone())
            }
            _ => StorageError::Other(e.to_string()),
        })?;

        tracing::debug!(user_id = %created.id, "User created");
        Ok(created)
    }

    fn get_user(&self, id: UserId) -> Result<User, StorageError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id.to_string()],
                user_row,
            )
            .optional()
            .map_err(|e| StorageError::Other(e.to_string()))?;
        match row {
            Some(row) => user_from_row(row),
            None => Err(StorageError::UserNotFound(id)),
        }
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email],
                user_row,
            )
            .optional()
            .map_err(|e| StorageError::Other(e.to_string()))?;
        row.map(user_from_row).transpose()
    }

    fn create_expense(&self, owner: UserId, expense: &NewExpense) -> Result<Expense, StorageError> {
        let conn = self.conn()?;
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

        conn.execute(
            "INSERT INTO expenses (id, user_id, amount, category, date, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                created.id.to_string(),
                owner.to_string(),
                created.amount.to_string(),
                created.category.as_str(),
                date_to_sql(created.date)?,
                created.description,
                timestamp_to_nanos(created.created_at),
                timestamp_to_nanos(created.updated_at)
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::UserNotFound(owner)
            }
            _ => StorageError::Other(e.to_string()),
        })?;

        tracing::debug!(expense_id = %created.id, user_id = %owner, "Expense created");
        Ok(created)
    }

    fn get_expense(&self, owner: UserId, id: ExpenseId) -> Result<Expense, StorageError> {
        let conn = self.conn()?;
        fetch_expense(&conn, owner, id)
    }

    fn list_expenses(&self, owner: UserId, filter: &ExpenseFilter) -> Result<Vec<Expense>, StorageError> {
        let conn = self.conn()?;

        let mut query = format!("SELECT {} FROM expenses WHERE user_id = ?1", EXPENSE_COLUMNS);
        let mut values = vec![owner.to_string()];

        if let Some(category) = filter.category {
            values.push(category.as_str().to_string());
            query.push_str(&format!(" AND category = ?{}", values.len()));
        }
        if let Some((from, to)) = filter.date_range() {
            values.push(date_to_sql(from)?);
            query.push_str(&format!(" AND date >= ?{}", values.len()));
            values.push(date_to_sql(to)?);
            query.push_str(&format!(" AND date <= ?{}", values.len()));
        }
        query.push_str(" ORDER BY date DESC, created_at DESC, rowid DESC");

        let mut stmt = conn.prepare(&query).map_err(|e| StorageError::Other(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), expense_row)
            .map_err(|e| StorageError::Other(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Other(e.to_string()))?;

        rows.into_iter().map(expense_from_row).collect()
    }

    fn update_expense(&self, owner: UserId, id: ExpenseId, patch: &ExpensePatch) -> Result<Expense, StorageError> {
        let conn = self.conn()?;
        let mut expense = fetch_expense(&conn, owner, id)?;
        patch.apply(&mut expense);
        expense.updated_at = OffsetDateTime::now_utc();

        conn.execute(
            "UPDATE expenses
             SET amount = ?1, category = ?2, date = ?3, description = ?4, updated_at = ?5
             WHERE id = ?6 AND user_id = ?7",
            params![
                expense.amount.to_string(),
                expense.category.as_str(),
                date_to_sql(expense.date)?,
                expense.description,
                timestamp_to_nanos(expense.updated_at),
                id.to_string(),
                owner.to_string()
            ],
        )
        .map_err(|e| StorageError::Other(e.to_string()))?;

        tracing::debug!(expense_id = %id, user_id = %owner, "Expense updated");
        Ok(expense)
    }

    fn delete_expense(&self, owner: UserId, id: ExpenseId) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM expenses WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), owner.to_string()],
            )
            .map_err(|e| StorageError::Other(e.to_string()))?;
        if deleted == 0 {
            return Err(StorageError::ExpenseNotFound(id));
        }
        tracing::debug!(expense_id = %id, user_id = %owner, "Expense deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outlay_core::YearMonth;
    use time::Month;
    use rust_decimal_macros::dec;

    fn register(storage: &SqliteStorage, email: &str) -> UserId {
        storage
            .create_user(&NewUser {
                email: email.to_string(),
                name: "Test".to_string(),
                password_hash: "$argon2id$stub".to_string(),
            })
            .unwrap()
            .id
    }

    fn new_expense(amount: Decimal, date: Date, category: Category) -> NewExpense {
        NewExpense {
            amount,
            category,
            date,
            description: "note".to_string(),
        }
    }

    fn date(year: i32, month: Month, day: u8) -> Date {
        Date::from_calendar_date(year, month, day).unwrap()
    }

    #[test]
    fn test_sqlite_user_roundtrip() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        let id = register(&storage, "alice@example.com");

        let user = storage.get_user(id).unwrap();
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.password_hash, "$argon2id$stub");

        let found = storage.find_user_by_email("alice@example.com").unwrap();
        assert_eq!(found.map(|u| u.id), Some(id));
        assert!(storage.find_user_by_email("nobody@example.com").unwrap().is_none());
        assert!(matches!(storage.get_user(Uuid::new_v4()), Err(StorageError::UserNotFound(_))));
    }

    #[test]
    fn test_sqlite_duplicate_email() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        register(&storage, "alice@example.com");
        let err = storage
            .create_user(&NewUser {
                email: "alice@example.com".to_string(),
                name: "Again".to_string(),
                password_hash: "x".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, StorageError::EmailTaken(_)));
    }

    #[test]
    fn test_sqlite_expense_crud() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        let owner = register(&storage, "alice@example.com");

        let created = storage
            .create_expense(owner, &new_expense(dec!(12.34), date(2024, Month::March, 2), Category::Food))
            .unwrap();
        let fetched = storage.get_expense(owner, created.id).unwrap();
        assert_eq!(fetched, created);

        let updated = storage
            .update_expense(
                owner,
                created.id,
                &ExpensePatch {
                    category: Some(Category::Shopping),
                    description: Some(String::new()),
                    ..ExpensePatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.category, Category::Shopping);
        assert_eq!(updated.description, "");
        assert_eq!(updated.amount, dec!(12.34));
        assert_eq!(storage.get_expense(owner, created.id).unwrap(), updated);

        storage.delete_expense(owner, created.id).unwrap();
        assert!(matches!(
            storage.get_expense(owner, created.id),
            Err(StorageError::ExpenseNotFound(_))
        ));
    }

    #[test]
    fn test_sqlite_owner_scoping() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        let alice = register(&storage, "alice@example.com");
        let bob = register(&storage, "bob@example.com");

        let expense = storage
            .create_expense(alice, &new_expense(dec!(5), date(2024, Month::March, 2), Category::Bills))
            .unwrap();

        assert!(matches!(storage.get_expense(bob, expense.id), Err(StorageError::ExpenseNotFound(_))));
        assert!(matches!(
            storage.update_expense(bob, expense.id, &ExpensePatch { amount: Some(dec!(1)), ..ExpensePatch::default() }),
            Err(StorageError::ExpenseNotFound(_))
        ));
        assert!(matches!(storage.delete_expense(bob, expense.id), Err(StorageError::ExpenseNotFound(_))));
        assert!(storage.list_expenses(bob, &ExpenseFilter::default()).unwrap().is_empty());
        assert_eq!(storage.get_expense(alice, expense.id).unwrap().amount, dec!(5));
    }

    #[test]
    fn test_sqlite_list_filters_and_order() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        let owner = register(&storage, "alice@example.com");

        storage.create_expense(owner, &new_expense(dec!(1), date(2024, Month::January, 31), Category::Food)).unwrap();
        storage.create_expense(owner, &new_expense(dec!(2), date(2024, Month::February, 1), Category::Food)).unwrap();
        storage.create_expense(owner, &new_expense(dec!(3), date(2024, Month::February, 29), Category::Travel)).unwrap();
        storage.create_expense(owner, &new_expense(dec!(4), date(2024, Month::March, 1), Category::Food)).unwrap();

        let all = storage.list_expenses(owner, &ExpenseFilter::default()).unwrap();
        let amounts: Vec<Decimal> = all.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![dec!(4), dec!(3), dec!(2), dec!(1)]);

        let february = ExpenseFilter {
            category: None,
            month: Some(YearMonth::new(2024, Month::February)),
        };
        let amounts: Vec<Decimal> = storage
            .list_expenses(owner, &february)
            .unwrap()
            .iter()
            .map(|e| e.amount)
            .collect();
        assert_eq!(amounts, vec![dec!(3), dec!(2)]);

        let february_food = ExpenseFilter {
            category: Some(Category::Food),
            ..february
        };
        let only = storage.list_expenses(owner, &february_food).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].amount, dec!(2));
    }

    #[test]
    fn test_sqlite_extreme_years_round_trip() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        let owner = register(&storage, "alice@example.com");
        for day in [date(1, Month::January, 1), date(9999, Month::December, 31)] {
            storage
                .create_expense(owner, &new_expense(dec!(1), day, Category::Other))
                .unwrap();
        }

        let dates: Vec<Date> = storage
            .list_expenses(owner, &ExpenseFilter::default())
            .unwrap()
            .iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec![date(9999, Month::December, 31), date(1, Month::January, 1)]);

        let stored: String = storage
            .conn()
            .unwrap()
            .query_row("SELECT date FROM expenses ORDER BY date LIMIT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, "0001-01-01");
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outlay.db");
        let path = path.to_str().unwrap();

        let (owner, id) = {
            let storage = SqliteStorage::new(path).unwrap();
            let owner = register(&storage, "alice@example.com");
            let expense = storage
                .create_expense(owner, &new_expense(dec!(9.99), date(2024, Month::May, 5), Category::Other))
                .unwrap();
            (owner, expense.id)
        };

        let reopened = SqliteStorage::new(path).unwrap();
        let expense = reopened.get_expense(owner, id).unwrap();
        assert_eq!(expense.amount, dec!(9.99));
        assert_eq!(expense.category, Category::Other);
        reopened.ping().unwrap();
    }
}
