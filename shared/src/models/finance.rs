//! Financial ledger models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ParseError;

/// One income or expense line in the farm ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub amount: Decimal,
    pub entry_type: EntryType,
    pub date: NaiveDate,
    pub category: Option<String>,
    pub description: Option<String>,
}

impl LedgerEntry {
    pub fn new(entry_type: EntryType, amount: Decimal, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            entry_type,
            date,
            category: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Income,
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
        }
    }
}

impl std::str::FromStr for EntryType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(EntryType::Income),
            "expense" => Ok(EntryType::Expense),
            other => Err(ParseError::new("ledger entry type", other)),
        }
    }
}

/// Income and expense totals for one calendar month
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyCashflow {
    pub year: i32,
    pub month: u32,
    pub income: Decimal,
    pub expenses: Decimal,
}

impl MonthlyCashflow {
    pub fn net(&self) -> Decimal {
        self.income - self.expenses
    }

    pub fn is_negative(&self) -> bool {
        self.expenses > self.income
    }

    /// Month label in `YYYY-MM` form
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}
