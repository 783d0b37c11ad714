use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use time::{
    format_description::FormatItem, macros::format_description, Date, Month, OffsetDateTime,
};
use uuid::Uuid;

use crate::validation::ValidationError;

pub mod write;

pub type UserId = Uuid;
pub type ExpenseId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    Food,
    Travel,
    Bills,
    Shopping,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Food,
        Category::Travel,
        Category::Bills,
        Category::Shopping,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Travel => "Travel",
            Category::Bills => "Bills",
            Category::Shopping => "Shopping",
            Category::Other => "Other",
        }
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    /// Category names are matched exactly; `food` is not `Food`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or(ValidationError::InvalidCategory)
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered account. The password hash never leaves the server; use
/// [`User::profile`] for anything that is serialized to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: ExpenseId,
    pub user_id: UserId,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub category: Category,
    #[serde(serialize_with = "serialize_date")]
    pub date: Date,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// `YYYY-MM-DD`, the form used on the wire and in storage.
pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn format_date(date: Date) -> Result<String, time::error::Format> {
    date.format(DATE_FORMAT)
}

pub fn parse_stored_date(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw, DATE_FORMAT)
}

fn serialize_date<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    let formatted = format_date(*date).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&formatted)
}

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    pub year: i32,
    pub month: Month,
}

impl YearMonth {
    pub fn new(year: i32, month: Month) -> Self {
        Self { year, month }
    }

    pub fn first_day(&self) -> Date {
        // Day 1 exists in every month of every representable year.
        Date::from_calendar_date(self.year, self.month, 1).unwrap_or(Date::MIN)
    }

    pub fn last_day(&self) -> Date {
        let days = time::util::days_in_year_month(self.year, self.month);
        Date::from_calendar_date(self.year, self.month, days).unwrap_or(Date::MAX)
    }

    pub fn contains(&self, date: Date) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for YearMonth {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s.split_once('-').ok_or(ValidationError::InvalidMonth)?;
        let digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(year, 4) || !digits(month, 2) {
            return Err(ValidationError::InvalidMonth);
        }
        let year = year.parse::<i32>().map_err(|_| ValidationError::InvalidMonth)?;
        let month = month.parse::<u8>().map_err(|_| ValidationError::InvalidMonth)?;
        let month = Month::try_from(month).map_err(|_| ValidationError::InvalidMonth)?;
        Ok(Self::new(year, month))
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month as u8)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Optional predicates applied to an owner's expenses. The owner itself is
/// never part of the filter; storage operations take it separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpenseFilter {
    pub category: Option<Category>,
    pub month: Option<YearMonth>,
}

impl ExpenseFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        if let Some(category) = self.category {
            if expense.category != category {
                return false;
            }
        }
        match self.month {
            Some(month) => month.contains(expense.date),
            None => true,
        }
    }

    /// Inclusive date bounds implied by the month filter.
    pub fn date_range(&self) -> Option<(Date, Date)> {
        self.month.map(|m| (m.first_day(), m.last_day()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parsing_is_exact() {
        assert_eq!("Food".parse::<Category>().unwrap(), Category::Food);
        assert_eq!("Shopping".parse::<Category>().unwrap(), Category::Shopping);
        assert!("food".parse::<Category>().is_err());
        assert!("All".parse::<Category>().is_err());
        assert!("".parse::<Category>().is_err());
    }

    #[test]
    fn year_month_bounds() {
        let feb: YearMonth = "2024-02".parse().unwrap();
        assert_eq!(format_date(feb.first_day()).unwrap(), "2024-02-01");
        assert_eq!(format_date(feb.last_day()).unwrap(), "2024-02-29");

        let dec: YearMonth = "2023-12".parse().unwrap();
        assert_eq!(format_date(dec.last_day()).unwrap(), "2023-12-31");
        assert_eq!(dec.to_string(), "2023-12");
    }

    #[test]
    fn dates_use_one_padded_codec() {
        let early = Date::from_calendar_date(1, Month::March, 7).unwrap();
        assert_eq!(format_date(early).unwrap(), "0001-03-07");
        assert_eq!(parse_stored_date("0001-03-07").unwrap(), early);

        let late = Date::from_calendar_date(9999, Month::December, 31).unwrap();
        assert_eq!(parse_stored_date(&format_date(late).unwrap()).unwrap(), late);
        assert!(parse_stored_date("2024-3-7").is_err());
    }

    #[test]
    fn year_month_rejects_garbage() {
        for input in ["2024", "2024-13", "2024-00", "24-01", "2024-1", "abcd-ef", "2024-01-05", "+024-01", "2024-+1"] {
            assert!(input.parse::<YearMonth>().is_err(), "{input} should be rejected");
        }
    }
}
