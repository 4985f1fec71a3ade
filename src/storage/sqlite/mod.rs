//! SQLite implementations of the storage interfaces.
//!
//! All multi-statement mutations run under `BEGIN IMMEDIATE`, which acquires
//! the write lock up front: concurrent settlements, withdrawals, and webhook
//! redeliveries serialize instead of racing to upgrade shared locks.

mod commissions;
mod helpers;
mod parties;
mod settings;
mod subscriptions;
mod wallets;
mod withdrawals;

pub use commissions::SqliteCommissionStore;
pub use parties::SqlitePartyStore;
pub use settings::SqliteSettingsStore;
pub use subscriptions::SqliteSubscriptionStore;
pub use wallets::SqliteWalletStore;
pub use withdrawals::SqliteWithdrawalStore;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::error::Result;
use crate::storage::{schema, Stores};

/// The full SQLite-backed store set over one connection pool.
pub struct SqliteStores {
    pool: SqlitePool,
}

impl SqliteStores {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they don't exist.
    pub async fn init(&self) -> Result<()> {
        for ddl in [
            schema::CREATE_SUBSCRIPTIONS_TABLES,
            schema::CREATE_WALLET_TABLES,
            schema::CREATE_COMMISSION_TABLES,
            schema::CREATE_WITHDRAWAL_TABLE,
            schema::CREATE_SETTINGS_TABLES,
            schema::CREATE_PARTY_TABLES,
        ] {
            sqlx::raw_sql(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Split into trait objects for the service layer.
    pub fn into_stores(self) -> Stores {
        Stores {
            subscriptions: Arc::new(SqliteSubscriptionStore::new(self.pool.clone())),
            wallets: Arc::new(SqliteWalletStore::new(self.pool.clone())),
            commissions: Arc::new(SqliteCommissionStore::new(self.pool.clone())),
            withdrawals: Arc::new(SqliteWithdrawalStore::new(self.pool.clone())),
            settings: Arc::new(SqliteSettingsStore::new(self.pool.clone())),
            parties: Arc::new(SqlitePartyStore::new(self.pool)),
        }
    }
}
