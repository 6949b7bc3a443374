//! Typed query parameters
//!
//! Every cached read is described by a [`Query`]. Each variant carries exactly the
//! parameters that change the result of the underlying query, so a parameter can not be
//! left out of the cache key by accident. Constructors validate their input; anything
//! that reaches the cache layer is assumed well-formed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::keys::ResourceKind;

/// Largest accepted page size for paginated transactions.
pub const MAX_PAGE_SIZE: u32 = 100;

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 3000;

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, QueryError> {
        if from > to {
            return Err(QueryError::ReversedRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(Self { from, to })
    }

    /// Build a range from timestamps, keeping only their UTC calendar date.
    ///
    /// Two requests for the same days at different times of day share one cache entry.
    pub fn from_datetimes(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, QueryError> {
        Self::new(from.date_naive(), to.date_naive())
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }
}

/// 1-based pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Page {
    page: u32,
    page_size: u32,
}

impl Page {
    pub fn new(page: u32, page_size: u32) -> Result<Self, QueryError> {
        if page == 0 {
            return Err(QueryError::ZeroPage);
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(QueryError::PageSize {
                got: page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        Ok(Self { page, page_size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of rows to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

/// Category list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    Income,
    Expense,
    All,
}

impl CategoryFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::All => "all",
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryFilter {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "all" => Ok(Self::All),
            other => Err(QueryError::Unknown(other.to_owned())),
        }
    }
}

/// Period shown by the history chart. Months are 0-based (January is 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryPeriod {
    Month { year: i32, month: u32 },
    Year { year: i32 },
}

impl HistoryPeriod {
    pub fn month(year: i32, month: u32) -> Result<Self, QueryError> {
        check_year(year)?;
        if month > 11 {
            return Err(QueryError::Month(month));
        }
        Ok(Self::Month { year, month })
    }

    pub fn year(year: i32) -> Result<Self, QueryError> {
        check_year(year)?;
        Ok(Self::Year { year })
    }
}

fn check_year(year: i32) -> Result<(), QueryError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(QueryError::Year(year))
    }
}

/// A cacheable read together with every parameter that shapes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    Categories { filter: CategoryFilter },
    Transactions { range: DateRange, page: Page },
    TransactionsHistory { range: DateRange },
    HistoryData { period: HistoryPeriod },
    HistoryPeriods,
    StatsBalance { range: DateRange },
    StatsCategories { range: DateRange },
}

impl Query {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Categories { .. } => ResourceKind::Categories,
            Self::Transactions { .. } => ResourceKind::Transactions,
            Self::TransactionsHistory { .. } => ResourceKind::TransactionsHistory,
            Self::HistoryData { .. } => ResourceKind::HistoryData,
            Self::HistoryPeriods => ResourceKind::HistoryPeriods,
            Self::StatsBalance { .. } => ResourceKind::StatsBalance,
            Self::StatsCategories { .. } => ResourceKind::StatsCategories,
        }
    }
}
