use std::{collections::BTreeMap, fmt::Display};

use prettytable::{row, Table};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::models::{Category, Expense, YearMonth};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub count: usize,
    /// Only categories with at least one expense appear.
    #[serde(serialize_with = "serialize_totals")]
    pub by_category: BTreeMap<Category, Decimal>,
    pub month: Option<YearMonth>,
}

fn serialize_totals<S: Serializer>(
    totals: &BTreeMap<Category, Decimal>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(
        totals
            .iter()
            .map(|(category, amount)| (category.as_str(), amount.to_f64().unwrap_or_default())),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expense total exceeds the representable range")]
pub struct SummaryOverflow;

/// Total and per-category breakdown of an already filtered list.
pub fn summarize(
    expenses: &[Expense],
    month: Option<YearMonth>,
) -> Result<ExpenseSummary, SummaryOverflow> {
    let mut total = Decimal::ZERO;
    let mut by_category = BTreeMap::new();
    for expense in expenses {
        total = total.checked_add(expense.amount).ok_or(SummaryOverflow)?;
        let subtotal = by_category.entry(expense.category).or_insert(Decimal::ZERO);
        *subtotal = subtotal.checked_add(expense.amount).ok_or(SummaryOverflow)?;
    }
    Ok(ExpenseSummary {
        total,
        count: expenses.len(),
        by_category,
        month,
    })
}

impl Display for ExpenseSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let period = match self.month {
            Some(month) => month.to_string(),
            None => "all time".to_string(),
        };

        let mut table = Table::new();
        table.add_row(row!["Category", "Amount"]);
        table.add_empty_row();

        if self.by_category.is_empty() {
            table.add_row(row!["No expenses for this period", ""]);
        }
        for (category, amount) in &self.by_category {
            table.add_row(row![category, format!("{:.2}", amount)]);
        }

        table.add_empty_row();
        table.add_row(row!["Total", format!("{:.2}", self.total)]);
        table.add_row(row!["Count", self.count]);

        write!(f, "\nSummary for {}\n{}\n", period, table)
    }
}
