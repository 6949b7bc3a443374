//! Finance payloads cached as JSON

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query::CategoryFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TransactionType> for CategoryFilter {
    fn from(kind: TransactionType) -> Self {
        match kind {
            TransactionType::Income => CategoryFilter::Income,
            TransactionType::Expense => CategoryFilter::Expense,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub icon: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub icon: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    pub category_icon: String,
}

/// Fields accepted when recording a transaction; the category is referenced by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceStats {
    pub income: f64,
    pub expense: f64,
}

impl BalanceStats {
    pub fn balance(&self) -> f64 {
        self.income - self.expense
    }
}

/// Total amount spent or earned in one category over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    pub category_icon: String,
    pub amount: f64,
}

/// One bar of the history chart: a month of a year, or a day of a month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub year: i32,
    pub month: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
    pub income: f64,
    pub expense: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_category_wire_format() {
        let category = Category {
            id: "c1".to_owned(),
            user_id: "u1".to_owned(),
            name: "Food".to_owned(),
            icon: "🍔".to_owned(),
            kind: TransactionType::Expense,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let json = serde_json::to_value(&category).unwrap();
        assert_eq!(json["type"], "expense");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["createdAt"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_yearly_history_entry_omits_day() {
        let entry = HistoryEntry {
            year: 2024,
            month: 3,
            day: None,
            income: 10.0,
            expense: 4.5,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"year":2024,"month":3,"income":10.0,"expense":4.5}"#);
    }

    #[test]
    fn test_balance() {
        let stats = BalanceStats {
            income: 500.0,
            expense: 200.0,
        };
        assert_eq!(stats.balance(), 300.0);
    }
}
