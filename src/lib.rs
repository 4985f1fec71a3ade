//! Payledger - commission settlement core
//!
//! Computes, records, and settles the monetary obligations created when a
//! vendor's paid subscription activates: referral commissions to the vendor
//! who referred them and employee commissions to the super-employee
//! responsible for the seller. Owns each party's wallet (an append-only
//! credit/debit ledger with a derived balance) and the admin-approved
//! withdrawal workflow.
//!
//! Transport, authentication, and payment-gateway cryptography live outside
//! this crate; the boundary layer hands in verified events and authenticated
//! approver identities.

pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod services;
pub mod storage;
pub mod validation;

pub use error::{LedgerError, Result};
