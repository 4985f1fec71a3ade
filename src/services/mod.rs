//! Settlement services.
//!
//! Each service composes validation and lookups around the storage traits;
//! the invariant-bearing transitions themselves live in the stores.

pub mod calculator;
mod ingestor;
mod ledger;
mod settings;
mod subscriptions;
mod withdrawal;

pub use ingestor::{ActivationOutcome, EventDisposition, SubscriptionIngestor};
pub use ledger::{BatchOutcome, CommissionLedger};
pub use settings::SettingsAdmin;
pub use subscriptions::SubscriptionOrigination;
pub use withdrawal::WithdrawalWorkflow;

#[cfg(test)]
mod tests;
