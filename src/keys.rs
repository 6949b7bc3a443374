//! Cache key construction
//!
//! Keys have the shape `{kind}:{user}:{version}[:{params}]`. The version segment is the
//! generation of the kind's [`Domain`] for that user, so bumping the domain counter moves
//! every later read onto a fresh, empty set of keys.

use std::borrow::Cow;
use std::fmt;

use crate::query::{DateRange, HistoryPeriod, Query};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Group of resource kinds sharing one invalidation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Categories,
    Transactions,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Categories, Domain::Transactions];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Transactions => "transactions",
        }
    }

    /// Resource kinds whose results depend on this domain's data.
    pub fn kinds(&self) -> &'static [ResourceKind] {
        match self {
            Self::Categories => &[ResourceKind::Categories],
            Self::Transactions => &[
                ResourceKind::Transactions,
                ResourceKind::TransactionsHistory,
                ResourceKind::HistoryData,
                ResourceKind::HistoryPeriods,
                ResourceKind::StatsBalance,
                ResourceKind::StatsCategories,
            ],
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical resource served through the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Categories,
    Transactions,
    TransactionsHistory,
    HistoryData,
    HistoryPeriods,
    StatsBalance,
    StatsCategories,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Transactions => "transactions",
            Self::TransactionsHistory => "transactionsHistory",
            Self::HistoryData => "historyData",
            Self::HistoryPeriods => "historyPeriods",
            Self::StatsBalance => "statsBalance",
            Self::StatsCategories => "statsCategories",
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            Self::Categories => Domain::Categories,
            _ => Domain::Transactions,
        }
    }

    /// Whether keys of this kind carry a parameter suffix.
    pub fn has_params(&self) -> bool {
        !matches!(self, Self::HistoryPeriods)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something to delete when a generation is retired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeTarget {
    /// A single key.
    Key(String),
    /// Every key starting with this literal prefix.
    Prefix(String),
}

/// Builds cache and counter keys. All functions are pure.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Version-qualified key for `query` issued by `user_id` at generation `version`.
    pub fn build_key(query: &Query, user_id: &str, version: u64) -> String {
        let mut key = Self::generation_base(query.kind(), user_id, version);
        match query {
            Query::Categories { filter } => {
                push_segment(&mut key, filter.as_str());
            }
            Query::Transactions { range, page } => {
                push_range(&mut key, range);
                push_segment(&mut key, &page.page().to_string());
                push_segment(&mut key, &page.page_size().to_string());
            }
            Query::TransactionsHistory { range }
            | Query::StatsBalance { range }
            | Query::StatsCategories { range } => push_range(&mut key, range),
            Query::HistoryData { period } => match period {
                HistoryPeriod::Month { year, month } => {
                    push_segment(&mut key, "month");
                    push_segment(&mut key, &year.to_string());
                    push_segment(&mut key, &month.to_string());
                }
                HistoryPeriod::Year { year } => {
                    push_segment(&mut key, "year");
                    push_segment(&mut key, &year.to_string());
                }
            },
            Query::HistoryPeriods => {}
        }
        key
    }

    /// Key of the generation counter for `(user_id, domain)`.
    pub fn counter_key(user_id: &str, domain: Domain) -> String {
        format!("{}Version:{}", domain.as_str(), escape_component(user_id))
    }

    /// Everything that belongs to generation `version` of `domain` for `user_id`.
    pub fn generation_targets(domain: Domain, user_id: &str, version: u64) -> Vec<PurgeTarget> {
        domain
            .kinds()
            .iter()
            .map(|kind| {
                let base = Self::generation_base(*kind, user_id, version);
                if kind.has_params() {
                    // Trailing separator keeps generation 1 from matching generation 10.
                    PurgeTarget::Prefix(format!("{}:", base))
                } else {
                    PurgeTarget::Key(base)
                }
            })
            .collect()
    }

    fn generation_base(kind: ResourceKind, user_id: &str, version: u64) -> String {
        format!("{}:{}:{}", kind.as_str(), escape_component(user_id), version)
    }
}

fn push_segment(key: &mut String, segment: &str) {
    key.push(':');
    key.push_str(segment);
}

fn push_range(key: &mut String, range: &DateRange) {
    push_segment(key, &range.from().format(DATE_FORMAT).to_string());
    push_segment(key, &range.to().format(DATE_FORMAT).to_string());
}

/// Percent-escape the key separator so caller-provided ids stay inside one segment.
fn escape_component(raw: &str) -> Cow<'_, str> {
    if !raw.contains([':', '%']) {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len() + 4);
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}
