//! Cached finance queries
//!
//! [`FinanceCache`] puts a [`ReadThroughCache`] in front of every aggregate read of a
//! [`FinanceBackend`] and runs the matching [`InvalidationTrigger`] after every write.
//!
//! ## Domains
//!
//! - category writes retire the categories generation (category lists)
//! - transaction writes retire the transactions generation (transaction pages, history,
//!   history periods, balance and category stats)

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::keys::Domain;
use crate::models::{
    BalanceStats, Category, CategoryStat, HistoryEntry, NewCategory, NewTransaction,
    Transaction, TransactionPage, TransactionType,
};
use crate::query::{CategoryFilter, DateRange, HistoryPeriod, Page, Query};
use crate::{CacheConfig, CacheError, InvalidationTrigger, KeyStore, ReadThroughCache, RedisKeyStore};

/// The relational store behind the cache.
///
/// Reads must be pure functions of their arguments and the stored state. Writes must be
/// durably committed when they return `Ok`.
#[async_trait]
pub trait FinanceBackend: Send + Sync + 'static {
    async fn categories(
        &self,
        user_id: &str,
        filter: CategoryFilter,
    ) -> Result<Vec<Category>, BackendError>;

    async fn transactions(
        &self,
        user_id: &str,
        range: DateRange,
        page: Page,
    ) -> Result<TransactionPage, BackendError>;

    async fn transactions_history(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<Vec<Transaction>, BackendError>;

    async fn history_data(
        &self,
        user_id: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<HistoryEntry>, BackendError>;

    /// Years that have any recorded history.
    async fn history_periods(&self, user_id: &str) -> Result<Vec<i32>, BackendError>;

    async fn balance_stats(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<BalanceStats, BackendError>;

    async fn category_stats(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<Vec<CategoryStat>, BackendError>;

    async fn create_transaction(
        &self,
        user_id: &str,
        transaction: NewTransaction,
    ) -> Result<Transaction, BackendError>;

    async fn create_category(
        &self,
        user_id: &str,
        category: NewCategory,
    ) -> Result<Category, BackendError>;

    async fn update_category(
        &self,
        user_id: &str,
        id: &str,
        category: NewCategory,
    ) -> Result<Category, BackendError>;

    async fn delete_category(
        &self,
        user_id: &str,
        name: &str,
        kind: TransactionType,
    ) -> Result<Category, BackendError>;
}

/// Finance reads served through the versioned cache, and writes that invalidate it.
pub struct FinanceCache<B: FinanceBackend, S: KeyStore> {
    backend: Arc<B>,
    reads: ReadThroughCache<S>,
    invalidation: InvalidationTrigger<S>,
}

impl<B: FinanceBackend, S: KeyStore> Clone for FinanceCache<B, S> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            reads: self.reads.clone(),
            invalidation: self.invalidation.clone(),
        }
    }
}

impl<B: FinanceBackend> FinanceCache<B, RedisKeyStore> {
    /// Create a FinanceCache backed by Redis
    pub async fn connect(
        redis_client: redis::Client,
        backend: B,
        config: CacheConfig,
    ) -> Result<Self, CacheError> {
        let store = RedisKeyStore::connect(redis_client, &config).await?;
        Ok(Self::new(backend, Arc::new(store), config))
    }
}

impl<B: FinanceBackend, S: KeyStore> FinanceCache<B, S> {
    pub fn new(backend: B, store: Arc<S>, config: CacheConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            invalidation: InvalidationTrigger::new(Arc::clone(&store), &config),
            reads: ReadThroughCache::new(store, config),
        }
    }

    pub fn read_through(&self) -> &ReadThroughCache<S> {
        &self.reads
    }

    pub fn invalidation(&self) -> &InvalidationTrigger<S> {
        &self.invalidation
    }

    pub async fn categories(
        &self,
        user_id: &str,
        filter: CategoryFilter,
    ) -> Result<Vec<Category>, BackendError> {
        self.reads
            .get(user_id, &Query::Categories { filter }, || {
                self.backend.categories(user_id, filter)
            })
            .await
    }

    pub async fn transactions(
        &self,
        user_id: &str,
        range: DateRange,
        page: Page,
    ) -> Result<TransactionPage, BackendError> {
        self.reads
            .get(user_id, &Query::Transactions { range, page }, || {
                self.backend.transactions(user_id, range, page)
            })
            .await
    }

    pub async fn transactions_history(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<Vec<Transaction>, BackendError> {
        self.reads
            .get(user_id, &Query::TransactionsHistory { range }, || {
                self.backend.transactions_history(user_id, range)
            })
            .await
    }

    pub async fn history_data(
        &self,
        user_id: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<HistoryEntry>, BackendError> {
        self.reads
            .get(user_id, &Query::HistoryData { period }, || {
                self.backend.history_data(user_id, period)
            })
            .await
    }

    pub async fn history_periods(&self, user_id: &str) -> Result<Vec<i32>, BackendError> {
        self.reads
            .get(user_id, &Query::HistoryPeriods, || {
                self.backend.history_periods(user_id)
            })
            .await
    }

    pub async fn balance_stats(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<BalanceStats, BackendError> {
        self.reads
            .get(user_id, &Query::StatsBalance { range }, || {
                self.backend.balance_stats(user_id, range)
            })
            .await
    }

    pub async fn category_stats(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<Vec<CategoryStat>, BackendError> {
        self.reads
            .get(user_id, &Query::StatsCategories { range }, || {
                self.backend.category_stats(user_id, range)
            })
            .await
    }

    /// Record a transaction, then retire the user's transactions generation.
    pub async fn create_transaction(
        &self,
        user_id: &str,
        transaction: NewTransaction,
    ) -> Result<Transaction, BackendError> {
        let created = self.backend.create_transaction(user_id, transaction).await?;
        self.invalidation
            .invalidate(user_id, Domain::Transactions)
            .await;
        Ok(created)
    }

    pub async fn create_category(
        &self,
        user_id: &str,
        category: NewCategory,
    ) -> Result<Category, BackendError> {
        let created = self.backend.create_category(user_id, category).await?;
        self.invalidation.invalidate(user_id, Domain::Categories).await;
        Ok(created)
    }

    pub async fn update_category(
        &self,
        user_id: &str,
        id: &str,
        category: NewCategory,
    ) -> Result<Category, BackendError> {
        let updated = self.backend.update_category(user_id, id, category).await?;
        self.invalidation.invalidate(user_id, Domain::Categories).await;
        Ok(updated)
    }

    pub async fn delete_category(
        &self,
        user_id: &str,
        name: &str,
        kind: TransactionType,
    ) -> Result<Category, BackendError> {
        let deleted = self.backend.delete_category(user_id, name, kind).await?;
        self.invalidation.invalidate(user_id, Domain::Categories).await;
        Ok(deleted)
    }
}
